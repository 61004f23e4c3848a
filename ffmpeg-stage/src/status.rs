use crate::error::StageError;

/// Outcome of one receive call on a stateful codec context.
///
/// `NeedMoreInput` and `EndOfStream` are the normal ways a drain ends; only
/// `Failed` carries an error.
#[derive(Debug)]
pub enum CodecStatus<T> {
    Produced(T),
    NeedMoreInput,
    EndOfStream,
    Failed(StageError),
}

impl<T> CodecStatus<T> {
    pub fn is_produced(&self) -> bool {
        matches!(self, CodecStatus::Produced(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CodecStatus<U> {
        match self {
            CodecStatus::Produced(value) => CodecStatus::Produced(f(value)),
            CodecStatus::NeedMoreInput => CodecStatus::NeedMoreInput,
            CodecStatus::EndOfStream => CodecStatus::EndOfStream,
            CodecStatus::Failed(err) => CodecStatus::Failed(err),
        }
    }
}

impl<T> From<ffmpeg_next::Error> for CodecStatus<T> {
    fn from(err: ffmpeg_next::Error) -> Self {
        match err {
            ffmpeg_next::Error::Eof => CodecStatus::EndOfStream,
            ffmpeg_next::Error::Other { errno } if errno == ffmpeg_next::util::error::EAGAIN => {
                CodecStatus::NeedMoreInput
            }
            err => CodecStatus::Failed(err.into()),
        }
    }
}

impl<T> From<Result<T, ffmpeg_next::Error>> for CodecStatus<T> {
    fn from(result: Result<T, ffmpeg_next::Error>) -> Self {
        match result {
            Ok(value) => CodecStatus::Produced(value),
            Err(err) => err.into(),
        }
    }
}
