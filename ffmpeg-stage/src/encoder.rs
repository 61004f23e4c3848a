use ffmpeg_next::{Dictionary, Rational, codec::Id, format::Pixel};

use crate::{
    error::StageError, frame::DecodedPicture, packet::EncodedPacket, scaler::Scaler,
    stage::EncodeStage, status::CodecStatus,
};

/// Fixed encoder parameters, applied once before the context is opened.
#[derive(Debug, Clone)]
pub struct Settings {
    pub codec: Id,
    pub width: u32,
    pub height: u32,
    pub time_base: Rational,
    pub frame_rate: Rational,
    /// `None` leaves the codec's default rate control alone.
    pub bit_rate: Option<usize>,
    pub global_header: bool,
    pub pixel_format: Pixel,
    pub gop: Option<u32>,
    /// Codec private options such as `preset`.
    pub options: Vec<(String, String)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            codec: Id::H264,
            width: 1280,
            height: 720,
            time_base: Rational::new(1, 30),
            frame_rate: Rational::new(30, 1),
            bit_rate: None,
            global_header: false,
            pixel_format: Pixel::YUV420P,
            gop: None,
            options: vec![
                ("preset".to_string(), "ultrafast".to_string()),
                ("tune".to_string(), "zerolatency".to_string()),
            ],
        }
    }
}

/// Video encoder opened once with [`Settings`].
///
/// Pictures whose format or size differ from the settings go through a
/// cached [`Scaler`] first. Timestamps are the submit index in the
/// configured time base.
pub struct Encoder {
    inner: ffmpeg_next::codec::encoder::Video,
    settings: Settings,
    frame_index: i64,
    scaler: Option<Scaler>,
    packet: ffmpeg_next::codec::packet::Packet,
}

impl Encoder {
    pub fn new(settings: Settings) -> Result<Self, StageError> {
        let codec = ffmpeg_next::encoder::find(settings.codec)
            .ok_or_else(|| StageError::CodecNotFound(format!("{:?} encoder", settings.codec)))?;
        let codec_name = codec.name().to_string();

        let encoder_ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = encoder_ctx.encoder().video()?;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(settings.pixel_format);
        encoder.set_time_base(settings.time_base);
        encoder.set_frame_rate(Some(settings.frame_rate));
        if let Some(bit_rate) = settings.bit_rate {
            encoder.set_bit_rate(bit_rate);
        }
        if let Some(gop) = settings.gop {
            encoder.set_gop(gop);
        }
        if settings.global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = Dictionary::new();
        for (key, value) in &settings.options {
            opts.set(key, value);
        }
        let inner = encoder.open_with(opts)?;
        log::info!(
            "encoder opened: {} {}x{} {:?}, time_base: {}, frame_rate: {}",
            codec_name,
            settings.width,
            settings.height,
            settings.pixel_format,
            settings.time_base,
            settings.frame_rate
        );

        Ok(Self {
            inner,
            settings,
            frame_index: 0,
            scaler: None,
            packet: ffmpeg_next::codec::packet::Packet::empty(),
        })
    }

    /// Number of pictures accepted so far.
    pub fn frame_index(&self) -> i64 {
        self.frame_index
    }

    fn target(&self) -> (Pixel, u32, u32) {
        (
            self.settings.pixel_format,
            self.settings.width,
            self.settings.height,
        )
    }

    fn needs_scaling(&self, frame: &ffmpeg_next::frame::Video) -> bool {
        (frame.format(), frame.width(), frame.height()) != self.target()
    }

    fn prepare_scaler(&mut self, frame: &ffmpeg_next::frame::Video) -> Result<(), StageError> {
        let reusable = self
            .scaler
            .as_ref()
            .is_some_and(|scaler| scaler.accepts(frame));
        if !reusable {
            let source = (frame.format(), frame.width(), frame.height());
            self.scaler = Some(Scaler::new(source, self.target())?);
        }
        Ok(())
    }
}

impl EncodeStage<DecodedPicture> for Encoder {
    fn submit(&mut self, picture: &mut DecodedPicture) -> Result<(), StageError> {
        let frame = picture.get_mut();
        if frame.width() == 0 || frame.height() == 0 {
            return Err(StageError::Rejected(format!(
                "picture has no pixels ({}x{})",
                frame.width(),
                frame.height()
            )));
        }

        if self.needs_scaling(frame) {
            self.prepare_scaler(frame)?;
            // The encoder may keep a reference to what it was sent, so every
            // scaled picture gets its own buffer.
            let mut scaled = ffmpeg_next::frame::Video::empty();
            if let Some(scaler) = self.scaler.as_mut() {
                scaler.run(frame, &mut scaled)?;
            }
            scaled.set_pts(Some(self.frame_index));
            self.inner.send_frame(&scaled)?;
        } else {
            frame.set_pts(Some(self.frame_index));
            self.inner.send_frame(frame)?;
        }
        self.frame_index += 1;
        Ok(())
    }

    fn receive(&mut self) -> CodecStatus<EncodedPacket<'_>> {
        // receive_packet unreferences whatever the packet held before.
        match self.inner.receive_packet(&mut self.packet) {
            Ok(()) => CodecStatus::Produced(EncodedPacket::from(&self.packet)),
            Err(err) => err.into(),
        }
    }

    fn send_eof(&mut self) -> Result<(), StageError> {
        self.inner.send_eof()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "encoder_test.rs"]
pub(crate) mod encoder_test;
