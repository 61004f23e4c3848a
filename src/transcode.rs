//! Capture → decode → encode → write loop.
//!
//! One iteration takes one raw frame from the [`FrameSource`], cuts it into
//! decoder units with a [`Framing`], drains every picture the decoder has
//! ready, drains every packet the encoder has ready for each picture and
//! appends each packet to the [`PacketSink`] before asking for the next one.
//! Only a failing frame source ends the loop; codec and sink failures are
//! logged, counted and the rest of the frame is abandoned.

use std::{
    fmt::{Display, Formatter},
    io,
    time::Duration,
};

use ffmpeg_stage::{CodecStatus, DecodeStage, EncodeStage, EncodedPacket, Framing, PictureInfo};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    capture::{FrameSource, WaitOutcome},
    sink::PacketSink,
};

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("frame source failed: {0}")]
    Source(#[source] io::Error),

    #[error("flushing output failed: {0}")]
    Sink(#[source] io::Error),

    #[error("transcode loop already stopped")]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    WaitingForFrame,
    HaveRawFrame,
    Decoding,
    HaveDecodedPicture,
    Encoding,
    HaveEncodedPacket,
    WriteOut,
    Stopped,
}

/// What one call to [`TranscodeLoop::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    TimedOut,
    /// The source handed back a zero-length frame.
    Empty,
    Processed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    pub frames_captured: u64,
    pub frames_decoded: u64,
    pub packets_encoded: u64,
    pub bytes_written: u64,
    pub timeouts: u64,
    pub decode_errors: u64,
    pub encode_errors: u64,
    pub sink_errors: u64,
}

impl Display for TranscodeStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "captured: {}, decoded: {}, encoded: {}, bytes written: {}, timeouts: {}, errors (decode/encode/sink): {}/{}/{}",
            self.frames_captured,
            self.frames_decoded,
            self.packets_encoded,
            self.bytes_written,
            self.timeouts,
            self.decode_errors,
            self.encode_errors,
            self.sink_errors
        )
    }
}

pub struct TranscodeLoop<S, D, E, K, F> {
    source: S,
    decoder: D,
    encoder: E,
    sink: K,
    framing: F,
    wait_timeout: Duration,
    stats: TranscodeStats,
    state: LoopState,
}

impl<S, D, E, K, F> TranscodeLoop<S, D, E, K, F>
where
    S: FrameSource,
    D: DecodeStage,
    E: EncodeStage<D::Picture>,
    K: PacketSink,
    F: Framing,
{
    pub fn new(
        source: S,
        decoder: D,
        encoder: E,
        sink: K,
        framing: F,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            source,
            decoder,
            encoder,
            sink,
            framing,
            wait_timeout,
            stats: TranscodeStats::default(),
            state: LoopState::WaitingForFrame,
        }
    }

    pub fn stats(&self) -> TranscodeStats {
        self.stats
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Iterates until the frame source fails or `cancel` fires. On
    /// cancellation both codecs are flushed into the sink before returning.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<TranscodeStats, TranscodeError> {
        loop {
            if cancel.is_cancelled() {
                log::info!("transcode cancelled, flushing codecs");
                return self.finish();
            }
            self.step()?;
        }
    }

    /// One wait on the source and, if a frame arrived, all the work it causes.
    pub fn step(&mut self) -> Result<Step, TranscodeError> {
        if self.state == LoopState::Stopped {
            return Err(TranscodeError::Stopped);
        }

        self.state = LoopState::WaitingForFrame;
        match self.source.wait_for_frame(self.wait_timeout) {
            Ok(WaitOutcome::Ready) => {}
            Ok(WaitOutcome::Timeout) => {
                self.stats.timeouts += 1;
                log::warn!(
                    "timed out waiting for frame after {:?} ({} timeouts)",
                    self.wait_timeout,
                    self.stats.timeouts
                );
                return Ok(Step::TimedOut);
            }
            Err(e) => return Err(self.stop_on_source_error(e)),
        }

        let frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) => return Err(self.stop_on_source_error(e)),
        };
        if frame.is_empty() {
            return Ok(Step::Empty);
        }

        self.state = LoopState::HaveRawFrame;
        self.stats.frames_captured += 1;
        log::debug!(
            "frame {} captured, {} bytes",
            self.stats.frames_captured,
            frame.len()
        );

        self.framing.push(frame);
        self.decode_pending_units();
        self.state = LoopState::WaitingForFrame;
        Ok(Step::Processed)
    }

    /// Flushes framing, decoder and encoder into the sink and stops the loop.
    /// Calling it again after the loop stopped is a no-op.
    pub fn finish(&mut self) -> Result<TranscodeStats, TranscodeError> {
        if self.state == LoopState::Stopped {
            return Ok(self.stats);
        }

        self.framing.flush();
        self.decode_pending_units();

        match self.decoder.send_eof() {
            Ok(()) => self.drain_decoder(),
            Err(e) => log::warn!("decoder flush failed: {}", e),
        }

        match self.encoder.send_eof() {
            Ok(()) => {
                let Self {
                    encoder,
                    sink,
                    stats,
                    state,
                    ..
                } = self;
                drain_encoder::<D::Picture, _, _>(encoder, sink, stats, state);
            }
            Err(e) => log::warn!("encoder flush failed: {}", e),
        }

        self.state = LoopState::Stopped;
        self.sink.flush().map_err(TranscodeError::Sink)?;
        log::info!("transcode finished: {}", self.stats);
        Ok(self.stats)
    }

    /// Work in flight is dropped, not drained: only what was already written
    /// reaches the sink.
    fn stop_on_source_error(&mut self, err: io::Error) -> TranscodeError {
        log::error!("frame source failed, stopping: {}", err);
        self.state = LoopState::Stopped;
        if let Err(e) = self.sink.flush() {
            log::error!("flushing output after source failure: {}", e);
        }
        TranscodeError::Source(err)
    }

    fn decode_pending_units(&mut self) {
        while let Some(unit) = self.framing.next_unit() {
            self.decode_unit(&unit);
        }
    }

    fn decode_unit(&mut self, unit: &[u8]) {
        self.state = LoopState::Decoding;
        if let Err(e) = self.decoder.submit(unit) {
            self.stats.decode_errors += 1;
            log::warn!("error while sending a packet to the decoder: {}", e);
            return;
        }
        self.drain_decoder();
    }

    fn drain_decoder(&mut self) {
        let Self {
            decoder,
            encoder,
            sink,
            stats,
            state,
            ..
        } = self;
        loop {
            match decoder.receive() {
                CodecStatus::Produced(picture) => {
                    *state = LoopState::HaveDecodedPicture;
                    stats.frames_decoded += 1;
                    log::debug!(
                        "decoded picture {}: {}x{}, stride {}",
                        stats.frames_decoded,
                        picture.width(),
                        picture.height(),
                        picture.stride(0)
                    );
                    encode_picture(encoder, sink, stats, state, picture);
                }
                CodecStatus::NeedMoreInput | CodecStatus::EndOfStream => break,
                CodecStatus::Failed(e) => {
                    stats.decode_errors += 1;
                    log::warn!("error while receiving a picture from the decoder: {}", e);
                    break;
                }
            }
        }
    }
}

fn encode_picture<P, E, K>(
    encoder: &mut E,
    sink: &mut K,
    stats: &mut TranscodeStats,
    state: &mut LoopState,
    picture: &mut P,
) where
    E: EncodeStage<P>,
    K: PacketSink,
{
    *state = LoopState::Encoding;
    if let Err(e) = encoder.submit(picture) {
        stats.encode_errors += 1;
        log::warn!("error sending a picture for encoding: {}", e);
        return;
    }
    drain_encoder::<P, _, _>(encoder, sink, stats, state);
}

fn drain_encoder<P, E, K>(
    encoder: &mut E,
    sink: &mut K,
    stats: &mut TranscodeStats,
    state: &mut LoopState,
) where
    E: EncodeStage<P>,
    K: PacketSink,
{
    loop {
        match encoder.receive() {
            CodecStatus::Produced(packet) => {
                *state = LoopState::HaveEncodedPacket;
                write_out(sink, stats, state, &packet);
            }
            CodecStatus::NeedMoreInput | CodecStatus::EndOfStream => break,
            CodecStatus::Failed(e) => {
                stats.encode_errors += 1;
                log::warn!("error receiving a packet from the encoder: {}", e);
                break;
            }
        }
    }
}

fn write_out<K: PacketSink>(
    sink: &mut K,
    stats: &mut TranscodeStats,
    state: &mut LoopState,
    packet: &EncodedPacket<'_>,
) {
    *state = LoopState::WriteOut;
    stats.packets_encoded += 1;
    match sink.append(packet.data()) {
        Ok(()) => stats.bytes_written += packet.size() as u64,
        Err(e) => {
            stats.sink_errors += 1;
            log::error!("failed to write packet {}: {}", stats.packets_encoded, e);
        }
    }
    log::debug!(
        "encoded packet {}: {} bytes, pts: {:?}, dts: {:?}, key: {}",
        stats.packets_encoded,
        packet.size(),
        packet.pts(),
        packet.dts(),
        packet.is_key()
    );
}

#[cfg(test)]
#[path = "transcode_test.rs"]
mod transcode_test;
