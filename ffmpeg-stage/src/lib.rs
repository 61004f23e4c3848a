/// Registers FFmpeg codecs and parsers. Call once at startup before opening
/// any decoder or encoder.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod packet;
pub mod parser;
pub mod scaler;
pub mod stage;
pub mod status;

pub use decoder::Decoder;
pub use encoder::{Encoder, Settings};
pub use error::StageError;
pub use frame::DecodedPicture;
pub use packet::EncodedPacket;
pub use parser::ParserFraming;
pub use stage::{DecodeStage, EncodeStage, Framing, PerFrame, PictureInfo};
pub use status::CodecStatus;
