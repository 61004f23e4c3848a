use std::{path::PathBuf, time::Duration};

use ffmpeg_next::codec::Id;
use ffmpeg_stage::Settings;

use crate::capture::FrameSize;

/// How captured frames are cut into decoder input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFraming {
    /// Every capture buffer is one complete coded picture (motion-JPEG).
    PerFrame,
    /// Bytes are accumulated and split by the codec's bitstream parser.
    Parsed,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device_path: PathBuf,
    pub fourcc: [u8; 4],
    /// Matched against the driver's format description when the fourcc is absent.
    pub format_description: String,
    /// `None` picks the largest size the device offers.
    pub preferred_size: Option<FrameSize>,
    pub buffer_count: u32,
    pub wait_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/video0"),
            fourcc: *b"MJPG",
            format_description: "Motion-JPEG".to_string(),
            preferred_size: None,
            buffer_count: 4,
            wait_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    pub capture: CaptureConfig,
    pub input_codec: Id,
    pub framing: InputFraming,
    pub encoder: Settings,
    pub output_path: PathBuf,
}

impl TranscodeConfig {
    pub fn new(capture: CaptureConfig, encoder: Settings, output_path: &str) -> Self {
        Self {
            capture,
            encoder,
            output_path: PathBuf::from(output_path),
            ..Default::default()
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        self.capture.wait_timeout
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            input_codec: Id::MJPEG,
            framing: InputFraming::PerFrame,
            encoder: Settings::default(),
            output_path: PathBuf::from("save.h264"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TranscodeConfig::default();
        assert_eq!(config.capture.device_path, PathBuf::from("/dev/video0"));
        assert_eq!(&config.capture.fourcc, b"MJPG");
        assert_eq!(config.wait_timeout(), Duration::from_secs(5));
        assert_eq!(config.input_codec, Id::MJPEG);
        assert_eq!(config.framing, InputFraming::PerFrame);
        assert_eq!(config.encoder.codec, Id::H264);
        assert_eq!(config.output_path, PathBuf::from("save.h264"));
    }

    #[test]
    fn test_new_keeps_codec_defaults() {
        let capture = CaptureConfig {
            preferred_size: Some(FrameSize::new(640, 480)),
            ..Default::default()
        };
        let config = TranscodeConfig::new(capture, Settings::default(), "out.h264");
        assert_eq!(config.capture.preferred_size, Some(FrameSize::new(640, 480)));
        assert_eq!(config.output_path, PathBuf::from("out.h264"));
        assert_eq!(config.input_codec, Id::MJPEG);
    }
}
