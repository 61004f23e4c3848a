use std::{
    fmt::{Display, Formatter},
    io,
    time::Duration,
};

use bytes::Bytes;

mod polled;
#[cfg(target_os = "linux")]
mod v4l2;

pub use polled::{CaptureQueue, PolledSource};
#[cfg(target_os = "linux")]
pub use v4l2::V4l2Camera;

/// Result of a bounded wait for the next captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    Timeout,
}

/// Supplier of raw compressed frames.
///
/// An `Err` from either method is fatal for the transcode loop; a timeout is
/// reported as [`WaitOutcome::Timeout`] instead.
pub trait FrameSource {
    fn wait_for_frame(&mut self, timeout: Duration) -> io::Result<WaitOutcome>;

    /// Returns the frame made ready by the last wait. May be empty.
    fn read_frame(&mut self) -> io::Result<Bytes>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Display for FrameSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Orders sizes by pixel count, smallest first, dropping duplicates.
pub fn sort_by_area(sizes: &mut Vec<FrameSize>) {
    sizes.sort_by_key(|s| (s.area(), s.width));
    sizes.dedup();
}

/// Picks `preferred` when the device offers it, otherwise the largest size.
/// `sizes` must already be sorted with [`sort_by_area`].
pub fn select_frame_size(sizes: &[FrameSize], preferred: Option<FrameSize>) -> Option<FrameSize> {
    if let Some(preferred) = preferred {
        if sizes.contains(&preferred) {
            return Some(preferred);
        }
        log::warn!("preferred frame size {} not supported by device", preferred);
    }
    sizes.last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_area_smallest_first() {
        let mut sizes = vec![
            FrameSize::new(1920, 1080),
            FrameSize::new(320, 240),
            FrameSize::new(1280, 720),
            FrameSize::new(640, 480),
            FrameSize::new(320, 240),
        ];
        sort_by_area(&mut sizes);
        assert_eq!(
            sizes,
            vec![
                FrameSize::new(320, 240),
                FrameSize::new(640, 480),
                FrameSize::new(1280, 720),
                FrameSize::new(1920, 1080),
            ]
        );
    }

    #[test]
    fn test_select_defaults_to_largest() {
        let sizes = vec![FrameSize::new(640, 480), FrameSize::new(1280, 720)];
        assert_eq!(
            select_frame_size(&sizes, None),
            Some(FrameSize::new(1280, 720))
        );
    }

    #[test]
    fn test_select_preferred_when_supported() {
        let sizes = vec![FrameSize::new(640, 480), FrameSize::new(1280, 720)];
        let preferred = Some(FrameSize::new(640, 480));
        assert_eq!(select_frame_size(&sizes, preferred), preferred);

        let unsupported = Some(FrameSize::new(800, 600));
        assert_eq!(
            select_frame_size(&sizes, unsupported),
            Some(FrameSize::new(1280, 720))
        );
    }

    #[test]
    fn test_select_from_nothing() {
        assert_eq!(select_frame_size(&[], None), None);
    }

    #[test]
    fn test_frame_size_display() {
        assert_eq!(FrameSize::new(1280, 720).to_string(), "1280x720");
    }
}
