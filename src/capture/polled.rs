use std::{io, time::Duration};

use bytes::Bytes;

use super::{FrameSource, WaitOutcome};

/// Driver-side buffer queue of a streaming capture device.
pub trait CaptureQueue {
    /// Hands the previously dequeued buffer back to the driver (or queues
    /// every buffer and starts streaming on first use), then dequeues the
    /// next filled buffer and copies it out.
    ///
    /// A timeout here leaves the handed-back buffer queued, so it must only be
    /// called on a running stream once [`CaptureQueue::poll`] reported data.
    fn next(&mut self, timeout: Duration) -> io::Result<Bytes>;

    /// Waits up to `timeout` for a filled buffer without touching the queue.
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Releases all buffers and maps a fresh, stopped set.
    fn remap(&mut self) -> io::Result<()>;
}

/// [`FrameSource`] over a [`CaptureQueue`].
///
/// Once streaming, every wait polls the device first and only dequeues when a
/// buffer is ready, so a timed-out wait changes nothing on the queue. A
/// timeout while starting the stream remaps the buffers and starts over on
/// the next wait.
pub struct PolledSource<Q> {
    queue: Q,
    streaming: bool,
    pending: Option<Bytes>,
}

fn is_wait_expired(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted)
}

impl<Q: CaptureQueue> PolledSource<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            streaming: false,
            pending: None,
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }
}

impl<Q: CaptureQueue> FrameSource for PolledSource<Q> {
    fn wait_for_frame(&mut self, timeout: Duration) -> io::Result<WaitOutcome> {
        if self.pending.is_some() {
            return Ok(WaitOutcome::Ready);
        }

        if self.streaming {
            match self.queue.poll(timeout) {
                Ok(true) => {}
                Ok(false) => return Ok(WaitOutcome::Timeout),
                // poll() interrupted by a signal, e.g. Ctrl-C.
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    return Ok(WaitOutcome::Timeout);
                }
                Err(e) => return Err(e),
            }
        }

        match self.queue.next(timeout) {
            Ok(frame) => {
                self.streaming = true;
                self.pending = Some(frame);
                Ok(WaitOutcome::Ready)
            }
            Err(e) if !self.streaming && is_wait_expired(&e) => {
                log::debug!("no frame while starting the stream, remapping buffers");
                self.queue.remap()?;
                Ok(WaitOutcome::Timeout)
            }
            Err(e) => Err(e),
        }
    }

    fn read_frame(&mut self) -> io::Result<Bytes> {
        Ok(self.pending.take().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Behaves like a vb2 mmap queue: queueing a buffer the driver already
    /// owns fails with `EINVAL`, and `next` re-queues before it waits.
    struct FakeQueue {
        queued: Vec<bool>,
        order: VecDeque<usize>,
        last: usize,
        active: bool,
        /// `true` = a filled buffer arrives during that wait.
        arrivals: VecDeque<bool>,
        ready: bool,
        remaps: usize,
    }

    impl FakeQueue {
        fn new(buffers: usize, arrivals: &[bool]) -> Self {
            Self {
                queued: vec![false; buffers],
                order: VecDeque::new(),
                last: 0,
                active: false,
                arrivals: arrivals.iter().copied().collect(),
                ready: false,
                remaps: 0,
            }
        }

        fn queue(&mut self, index: usize) -> io::Result<()> {
            if self.queued[index] {
                return Err(io::Error::from(io::ErrorKind::InvalidInput));
            }
            self.queued[index] = true;
            self.order.push_back(index);
            Ok(())
        }

        fn wait(&mut self) -> bool {
            self.ready = self.ready || self.arrivals.pop_front().unwrap_or(false);
            self.ready
        }
    }

    impl CaptureQueue for FakeQueue {
        fn next(&mut self, _timeout: Duration) -> io::Result<Bytes> {
            if !self.active {
                for index in 0..self.queued.len() {
                    self.queue(index)?;
                }
                self.active = true;
            } else {
                self.queue(self.last)?;
            }
            if !self.wait() {
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            self.ready = false;
            let index = self.order.pop_front().unwrap();
            self.queued[index] = false;
            self.last = index;
            Ok(Bytes::from(format!("buf{}", index)))
        }

        fn poll(&mut self, _timeout: Duration) -> io::Result<bool> {
            Ok(self.wait())
        }

        fn remap(&mut self) -> io::Result<()> {
            self.remaps += 1;
            self.queued.iter_mut().for_each(|q| *q = false);
            self.order.clear();
            self.active = false;
            self.last = 0;
            Ok(())
        }
    }

    const WAIT: Duration = Duration::from_millis(10);

    fn outcomes(source: &mut PolledSource<FakeQueue>, waits: usize) -> Vec<WaitOutcome> {
        (0..waits)
            .map(|_| {
                let outcome = source.wait_for_frame(WAIT).unwrap();
                if outcome == WaitOutcome::Ready {
                    assert!(!source.read_frame().unwrap().is_empty());
                }
                outcome
            })
            .collect()
    }

    #[test]
    fn test_timeouts_while_streaming_leave_queue_alone() {
        let mut source = PolledSource::new(FakeQueue::new(4, &[true, false, false, false, true]));
        assert_eq!(
            outcomes(&mut source, 5),
            vec![
                WaitOutcome::Ready,
                WaitOutcome::Timeout,
                WaitOutcome::Timeout,
                WaitOutcome::Timeout,
                WaitOutcome::Ready,
            ]
        );
        assert!(source.is_streaming());
        assert_eq!(source.queue().remaps, 0);
    }

    #[test]
    fn test_slow_start_remaps_and_retries() {
        let mut source = PolledSource::new(FakeQueue::new(4, &[false, false, true, true]));
        assert_eq!(
            outcomes(&mut source, 4),
            vec![
                WaitOutcome::Timeout,
                WaitOutcome::Timeout,
                WaitOutcome::Ready,
                WaitOutcome::Ready,
            ]
        );
        assert_eq!(source.queue().remaps, 2);
    }

    #[test]
    fn test_buffers_cycle_through_the_queue() {
        let mut source = PolledSource::new(FakeQueue::new(2, &[true; 4]));
        let frames: Vec<Bytes> = (0..4)
            .map(|_| {
                source.wait_for_frame(WAIT).unwrap();
                source.read_frame().unwrap()
            })
            .collect();
        assert_eq!(frames, vec!["buf0", "buf1", "buf0", "buf1"]);
    }

    #[test]
    fn test_ready_frame_is_read_once() {
        let mut source = PolledSource::new(FakeQueue::new(2, &[true]));
        assert_eq!(source.wait_for_frame(WAIT).unwrap(), WaitOutcome::Ready);
        assert_eq!(source.wait_for_frame(WAIT).unwrap(), WaitOutcome::Ready);
        assert_eq!(source.read_frame().unwrap(), "buf0");
        assert!(source.read_frame().unwrap().is_empty());
    }
}
