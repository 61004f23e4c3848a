use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;

use crate::error::StageError;

/// Pixel format, width, height.
type Geometry = (Pixel, u32, u32);

/// Software converter from the decoder's output geometry to the encoder's.
pub struct Scaler {
    context: scaling::Context,
    source: Geometry,
}

impl Scaler {
    pub fn new(source: Geometry, target: Geometry) -> Result<Self, StageError> {
        let context = scaling::Context::get(
            source.0,
            source.1,
            source.2,
            target.0,
            target.1,
            target.2,
            scaling::Flags::BILINEAR,
        )?;
        log::debug!(
            "scaler created: {:?} {}x{} -> {:?} {}x{}",
            source.0,
            source.1,
            source.2,
            target.0,
            target.1,
            target.2
        );
        Ok(Self { context, source })
    }

    /// Whether `frame` has the geometry this scaler was built for.
    pub fn accepts(&self, frame: &ffmpeg_next::frame::Video) -> bool {
        self.source == (frame.format(), frame.width(), frame.height())
    }

    pub fn run(
        &mut self,
        frame: &ffmpeg_next::frame::Video,
        dst: &mut ffmpeg_next::frame::Video,
    ) -> Result<(), StageError> {
        self.context.run(frame, dst).map_err(|e| e.into())
    }
}
