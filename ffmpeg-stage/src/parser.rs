use std::{collections::VecDeque, os::raw::c_int, ptr, ptr::NonNull, slice};

use bytes::{Buf, Bytes, BytesMut};
use ffmpeg_next::{codec::Id, ffi};

use crate::{error::StageError, stage::Framing};

/// Accumulates captured bytes and cuts them into codec units with
/// libavcodec's bitstream parser.
///
/// Needed when capture buffers do not line up with coded pictures, as with
/// stream-oriented bitstreams such as H.264 elementary streams.
pub struct ParserFraming {
    parser: NonNull<ffi::AVCodecParserContext>,
    context: ffmpeg_next::codec::Context,
    pending: BytesMut,
    units: VecDeque<Bytes>,
}

impl ParserFraming {
    pub fn new(codec_id: Id) -> Result<Self, StageError> {
        let raw_id: ffi::AVCodecID = codec_id.into();
        let parser = NonNull::new(unsafe { ffi::av_parser_init(raw_id as c_int) })
            .ok_or_else(|| StageError::ParserUnavailable(format!("{:?}", codec_id)))?;
        let context = match ffmpeg_next::decoder::find(codec_id) {
            Some(codec) => ffmpeg_next::codec::Context::new_with_codec(codec),
            None => ffmpeg_next::codec::Context::new(),
        };
        log::info!("bitstream parser initialised for {:?}", codec_id);

        Ok(Self {
            parser,
            context,
            pending: BytesMut::new(),
            units: VecDeque::new(),
        })
    }

    /// Bytes handed in but not yet taken by the parser.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// One parser call. An empty `input` asks the parser to flush.
    fn parse_once(&mut self, input: &[u8]) -> Result<(usize, Option<Bytes>), StageError> {
        let mut out_data: *mut u8 = ptr::null_mut();
        let mut out_size: c_int = 0;
        let (in_data, in_size) = if input.is_empty() {
            (ptr::null(), 0)
        } else {
            (input.as_ptr(), c_int::try_from(input.len()).unwrap_or(c_int::MAX))
        };

        let consumed = unsafe {
            ffi::av_parser_parse2(
                self.parser.as_ptr(),
                self.context.as_mut_ptr(),
                &mut out_data,
                &mut out_size,
                in_data,
                in_size,
                ffi::AV_NOPTS_VALUE,
                ffi::AV_NOPTS_VALUE,
                0,
            )
        };
        if consumed < 0 {
            return Err(ffmpeg_next::Error::from(consumed).into());
        }

        let unit = if out_size > 0 && !out_data.is_null() {
            // The parser owns out_data and reuses it on the next call.
            let data = unsafe { slice::from_raw_parts(out_data, out_size as usize) };
            Some(Bytes::copy_from_slice(data))
        } else {
            None
        };
        Ok((consumed as usize, unit))
    }

    fn parse_pending(&mut self) {
        let mut pending = std::mem::take(&mut self.pending);
        while !pending.is_empty() {
            match self.parse_once(&pending) {
                Ok((consumed, unit)) => {
                    pending.advance(consumed.min(pending.len()));
                    let stalled = consumed == 0 && unit.is_none();
                    if let Some(unit) = unit {
                        self.units.push_back(unit);
                    }
                    if stalled {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!(
                        "bitstream parser error, dropping {} buffered bytes: {}",
                        pending.len(),
                        e
                    );
                    pending.clear();
                }
            }
        }
        self.pending = pending;
    }
}

impl Framing for ParserFraming {
    fn push(&mut self, raw: Bytes) {
        self.pending.extend_from_slice(&raw);
        self.parse_pending();
    }

    fn next_unit(&mut self) -> Option<Bytes> {
        self.units.pop_front()
    }

    fn flush(&mut self) {
        self.parse_pending();
        loop {
            match self.parse_once(&[]) {
                Ok((_, Some(unit))) => self.units.push_back(unit),
                Ok((_, None)) => break,
                Err(e) => {
                    log::warn!("bitstream parser flush error: {}", e);
                    break;
                }
            }
        }
    }
}

impl Drop for ParserFraming {
    fn drop(&mut self) {
        unsafe { ffi::av_parser_close(self.parser.as_ptr()) };
    }
}
