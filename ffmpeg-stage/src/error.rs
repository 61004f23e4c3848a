use thiserror::Error;

/// Failure reported by a codec stage or by stage construction.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("codec not found: {0}")]
    CodecNotFound(String),

    #[error("no bitstream parser for codec {0}")]
    ParserUnavailable(String),

    #[error("ffmpeg: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    /// Input refused before it reaches the codec, e.g. a picture with no pixels.
    #[error("rejected: {0}")]
    Rejected(String),
}
