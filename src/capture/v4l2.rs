use std::{io, time::Duration};

use anyhow::Context as _;
use bytes::Bytes;
use v4l::{
    Device, FourCC,
    buffer::Type,
    framesize::FrameSizeEnum,
    io::{mmap::Stream as MmapStream, traits::CaptureStream},
    video::Capture,
};

use super::{CaptureQueue, FrameSize, select_frame_size, sort_by_area};
use crate::config::CaptureConfig;

/// Memory-mapped V4L2 capture from one device.
///
/// Streaming starts with the first dequeue and stops when the buffers are
/// released. Wrap it in a [`super::PolledSource`] to read frames.
pub struct V4l2Camera {
    stream: Option<MmapStream<'static>>,
    device: Device,
    buffer_count: u32,
    timeout: Duration,
    size: FrameSize,
    fourcc: FourCC,
}

fn map_buffers(
    device: &mut Device,
    count: u32,
    timeout: Duration,
) -> io::Result<MmapStream<'static>> {
    let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, count)?;
    stream.set_timeout(timeout);
    Ok(stream)
}

/// `/dev/videoN (name)` for every node the v4l context knows about.
fn describe_devices() -> String {
    v4l::context::enum_devices()
        .iter()
        .map(|node| match node.name() {
            Some(name) => format!("{} ({})", node.path().display(), name),
            None => node.path().display().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl V4l2Camera {
    pub fn open(config: &CaptureConfig) -> anyhow::Result<Self> {
        let path = config.device_path.display().to_string();
        let mut device = Device::with_path(&config.device_path).with_context(|| {
            format!(
                "open cam {} failed, video devices present: [{}]",
                path,
                describe_devices()
            )
        })?;

        let formats = device
            .enum_formats()
            .with_context(|| format!("enumerate formats of {}", path))?;
        log::info!("available formats:");
        for format in &formats {
            log::info!("  {} ({})", format.description, format.fourcc);
        }

        let wanted = FourCC::new(&config.fourcc);
        let format = formats
            .iter()
            .find(|f| f.fourcc == wanted)
            .or_else(|| {
                formats
                    .iter()
                    .find(|f| f.description == config.format_description)
            })
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no {} ({}) format on {}",
                    config.format_description,
                    wanted,
                    path
                )
            })?;
        let fourcc = format.fourcc;

        let mut sizes: Vec<FrameSize> = device
            .enum_framesizes(fourcc)
            .with_context(|| format!("enumerate frame sizes of {}", path))?
            .into_iter()
            .map(|s| match s.size {
                FrameSizeEnum::Discrete(d) => FrameSize::new(d.width, d.height),
                FrameSizeEnum::Stepwise(s) => FrameSize::new(s.max_width, s.max_height),
            })
            .collect();
        sort_by_area(&mut sizes);
        log::info!("supported frame sizes for format {}:", format.description);
        for size in &sizes {
            log::info!("  {}", size);
        }
        let size = select_frame_size(&sizes, config.preferred_size)
            .ok_or_else(|| anyhow::anyhow!("no matching frame size on {}", path))?;

        log::info!("requesting {} {}", format.description, size);
        let mut requested = device.format()?;
        requested.width = size.width;
        requested.height = size.height;
        requested.fourcc = fourcc;
        let actual = device
            .set_format(&requested)
            .with_context(|| format!("set format {} {} on {}", fourcc, size, path))?;
        log::info!(
            "resulting image format: {} {}x{}",
            actual.fourcc,
            actual.width,
            actual.height
        );
        if actual.fourcc != fourcc {
            anyhow::bail!("device switched format to {}", actual.fourcc);
        }

        let stream = map_buffers(&mut device, config.buffer_count, config.wait_timeout)
            .with_context(|| format!("map capture buffers of {}", path))?;

        Ok(Self {
            stream: Some(stream),
            device,
            buffer_count: config.buffer_count,
            timeout: config.wait_timeout,
            size: FrameSize::new(actual.width, actual.height),
            fourcc: actual.fourcc,
        })
    }

    /// Negotiated capture size.
    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn fourcc(&self) -> FourCC {
        self.fourcc
    }
}

impl CaptureQueue for V4l2Camera {
    fn next(&mut self, timeout: Duration) -> io::Result<Bytes> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => map_buffers(&mut self.device, self.buffer_count, timeout)?,
        };
        let stream = self.stream.insert(stream);
        if timeout != self.timeout {
            stream.set_timeout(timeout);
            self.timeout = timeout;
        }

        let (buf, meta) = CaptureStream::next(stream)?;
        let used = (meta.bytesused as usize).min(buf.len());
        Ok(Bytes::copy_from_slice(&buf[..used]))
    }

    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        Ok(self.device.handle().poll(libc::POLLIN, millis)? > 0)
    }

    fn remap(&mut self) -> io::Result<()> {
        // Buffers must be unmapped before new ones can be requested.
        self.stream = None;
        self.stream = Some(map_buffers(
            &mut self.device,
            self.buffer_count,
            self.timeout,
        )?);
        Ok(())
    }
}
