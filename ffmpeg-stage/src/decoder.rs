use ffmpeg_next::codec::Id;

use crate::{error::StageError, frame::DecodedPicture, stage::DecodeStage, status::CodecStatus};

/// Video decoder bound to one codec, opened once in [`Decoder::new`].
pub struct Decoder {
    inner: ffmpeg_next::codec::decoder::Video,
    picture: DecodedPicture,
}

impl Decoder {
    pub fn new(codec_id: Id) -> Result<Self, StageError> {
        let codec = ffmpeg_next::decoder::find(codec_id)
            .ok_or_else(|| StageError::CodecNotFound(format!("{:?} decoder", codec_id)))?;
        let codec_name = codec.name().to_string();
        let decoder_ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
        let inner = decoder_ctx.decoder().video()?;
        log::info!("decoder opened: {} ({:?})", codec_name, codec_id);

        Ok(Self {
            inner,
            picture: DecodedPicture::empty(),
        })
    }
}

impl DecodeStage for Decoder {
    type Picture = DecodedPicture;

    fn submit(&mut self, data: &[u8]) -> Result<(), StageError> {
        // An empty packet would put the context into draining mode.
        if data.is_empty() {
            return Ok(());
        }
        let packet = ffmpeg_next::codec::packet::Packet::copy(data);
        self.inner.send_packet(&packet)?;
        Ok(())
    }

    fn receive(&mut self) -> CodecStatus<&mut DecodedPicture> {
        match self.inner.receive_frame(self.picture.get_mut()) {
            Ok(()) => {
                log::trace!("{}", self.picture);
                CodecStatus::Produced(&mut self.picture)
            }
            Err(err) => err.into(),
        }
    }

    fn send_eof(&mut self) -> Result<(), StageError> {
        self.inner.send_eof()?;
        Ok(())
    }
}
