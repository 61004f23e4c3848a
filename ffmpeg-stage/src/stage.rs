//! Seams between the transcode loop and the codec contexts.
//!
//! Outputs are handed out as borrows of the stage that produced them, so a
//! caller cannot ask a context for its next output while still holding the
//! previous one.

use bytes::Bytes;

use crate::{error::StageError, packet::EncodedPacket, status::CodecStatus};

/// Geometry of a decoded picture, enough to report it.
pub trait PictureInfo {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn stride(&self, plane: usize) -> usize;
}

/// Stateful decoder: raw compressed units in, pictures out.
pub trait DecodeStage {
    type Picture: PictureInfo;

    /// Pushes one compressed unit. An empty slice is accepted and ignored.
    fn submit(&mut self, data: &[u8]) -> Result<(), StageError>;

    /// Pulls the next decoded picture, if one is ready.
    fn receive(&mut self) -> CodecStatus<&mut Self::Picture>;

    /// Switches the context to draining; later receives flush what it holds.
    fn send_eof(&mut self) -> Result<(), StageError>;
}

/// Stateful encoder: pictures in, packets out.
pub trait EncodeStage<P> {
    fn submit(&mut self, picture: &mut P) -> Result<(), StageError>;

    fn receive(&mut self) -> CodecStatus<EncodedPacket<'_>>;

    fn send_eof(&mut self) -> Result<(), StageError>;
}

/// Turns raw captured frames into decoder input units.
pub trait Framing {
    fn push(&mut self, raw: Bytes);

    fn next_unit(&mut self) -> Option<Bytes>;

    /// Releases anything still buffered as final units.
    fn flush(&mut self) {}
}

/// One captured frame is one decoder unit. Right for frame-oriented formats
/// such as motion-JPEG where every capture buffer holds a whole picture.
#[derive(Debug, Default)]
pub struct PerFrame {
    pending: Option<Bytes>,
}

impl Framing for PerFrame {
    fn push(&mut self, raw: Bytes) {
        if !raw.is_empty() {
            self.pending = Some(raw);
        }
    }

    fn next_unit(&mut self) -> Option<Bytes> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_frame_yields_each_frame_once() {
        let mut framing = PerFrame::default();
        framing.push(Bytes::from_static(b"jpeg-1"));
        assert_eq!(framing.next_unit(), Some(Bytes::from_static(b"jpeg-1")));
        assert_eq!(framing.next_unit(), None);

        framing.push(Bytes::from_static(b"jpeg-2"));
        framing.flush();
        assert_eq!(framing.next_unit(), Some(Bytes::from_static(b"jpeg-2")));
    }

    #[test]
    fn test_per_frame_ignores_empty_frames() {
        let mut framing = PerFrame::default();
        framing.push(Bytes::new());
        assert_eq!(framing.next_unit(), None);
    }
}
