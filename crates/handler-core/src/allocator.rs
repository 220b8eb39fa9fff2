//! Resource allocators
//!
//! SCTP stream ids are handed out sequentially and wrap at the configured
//! number of incoming streams. Ids are never recycled early when a channel
//! closes; a long-lived channel can therefore collide with a new one after a
//! full wrap.

use rtcbridge_sdp_core::RtpEncodingParameters;

/// Highest spatial layer the positional activation policy knows about
pub const MAX_SPATIAL_LAYERS: u8 = 3;

/// Sequential SCTP stream id source
#[derive(Debug, Clone)]
pub struct SctpStreamIdAllocator {
    next: u16,
    capacity: u16,
}

impl SctpStreamIdAllocator {
    /// Create an allocator wrapping at `capacity`; a zero capacity is treated as one
    pub fn new(capacity: u16) -> Self {
        Self {
            next: 0,
            capacity: capacity.max(1),
        }
    }

    /// The id the next channel gets
    pub fn peek(&self) -> u16 {
        self.next
    }

    /// Move past the current id
    pub fn advance(&mut self) {
        self.next = ((u32::from(self.next) + 1) % u32::from(self.capacity)) as u16;
    }
}

/// Activate the first `spatial_layer` encodings and deactivate the rest
///
/// Only the first [`MAX_SPATIAL_LAYERS`] encodings are touched; the order is
/// the rid order established when the track was sent.
pub fn apply_spatial_layer(encodings: &mut [RtpEncodingParameters], spatial_layer: u8) {
    for (index, encoding) in encodings
        .iter_mut()
        .take(usize::from(MAX_SPATIAL_LAYERS))
        .enumerate()
    {
        encoding.active = Some(index < usize::from(spatial_layer));
    }
}
