//! Encoding policies of the send path
//!
//! Rid assignment, merging caller encodings with the ones the engine put in
//! its offer, and the scalability mode forced on simulcast VP8/H264.

use rtcbridge_sdp_core::RtpEncodingParameters;

/// Scalability mode stamped on simulcast encodings of codecs without SVC
pub const SIMULCAST_SCALABILITY_MODE: &str = "S1T3";

/// Give every encoding a sequential rid (`r0`, `r1`, ...) when there are several
pub fn assign_rids(encodings: &mut [RtpEncodingParameters]) {
    if encodings.len() <= 1 {
        return;
    }
    for (index, encoding) in encodings.iter_mut().enumerate() {
        encoding.rid = Some(format!("r{}", index));
    }
}

/// Copy the fields a caller may set on an encoding onto `target`
///
/// `active` and the network priority are always written; the rest only when
/// the caller gave them.
pub fn overlay_encoding(target: &mut RtpEncodingParameters, caller: &RtpEncodingParameters) {
    target.active = Some(caller.active.unwrap_or(true));
    if let Some(rid) = caller.rid.as_ref().filter(|rid| !rid.is_empty()) {
        target.rid = Some(rid.clone());
    }
    if caller.max_bitrate.is_some() {
        target.max_bitrate = caller.max_bitrate;
    }
    if caller.max_framerate.is_some() {
        target.max_framerate = caller.max_framerate;
    }
    if caller.scale_resolution_down_by.is_some() {
        target.scale_resolution_down_by = caller.scale_resolution_down_by;
    }
    target.network_priority = Some(caller.network_priority.unwrap_or_default());
}

/// Final encodings of a sent track
///
/// `engine_encodings` is only evaluated when the caller gave at most one
/// encoding; several caller encodings are used as given.
pub fn merge_encodings<E>(
    caller: &[RtpEncodingParameters],
    engine_encodings: impl FnOnce() -> Result<Vec<RtpEncodingParameters>, E>,
) -> Result<Vec<RtpEncodingParameters>, E> {
    match caller {
        [] => engine_encodings(),
        [single] => {
            let mut encodings = engine_encodings()?;
            if let Some(first) = encodings.first_mut() {
                overlay_encoding(first, single);
            }
            Ok(encodings)
        }
        several => Ok(several
            .iter()
            .map(|encoding| {
                let mut filled = RtpEncodingParameters::default();
                overlay_encoding(&mut filled, encoding);
                filled
            })
            .collect()),
    }
}

/// Stamp [`SIMULCAST_SCALABILITY_MODE`] on simulcast VP8/H264 encodings
pub fn apply_simulcast_scalability(mime_type: &str, encodings: &mut [RtpEncodingParameters]) {
    if encodings.len() <= 1 {
        return;
    }
    let mime_type = mime_type.to_lowercase();
    if mime_type == "video/vp8" || mime_type == "video/h264" {
        for encoding in encodings.iter_mut() {
            encoding.scalability_mode = Some(SIMULCAST_SCALABILITY_MODE.to_string());
        }
    }
}
