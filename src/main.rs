use anyhow::Context as _;
use tokio_util::sync::CancellationToken;
use v4l2_h264::{config::TranscodeConfig, transcode::TranscodeStats};

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("v4l2_h264", log::LevelFilter::Debug)
        .filter_module("ffmpeg_stage", log::LevelFilter::Debug)
        .parse_default_env()
        .init();
}

#[cfg(target_os = "linux")]
fn transcode(
    config: TranscodeConfig,
    cancel: CancellationToken,
) -> anyhow::Result<TranscodeStats> {
    use ffmpeg_stage::{Decoder, Encoder, ParserFraming, PerFrame};
    use v4l2_h264::{
        capture::{PolledSource, V4l2Camera},
        config::InputFraming,
        sink::FileSink,
        transcode::TranscodeLoop,
    };

    let camera = V4l2Camera::open(&config.capture)?;
    log::info!("capturing {} at {}", camera.fourcc(), camera.size());
    let camera = PolledSource::new(camera);

    let decoder = Decoder::new(config.input_codec)
        .with_context(|| format!("open {:?} decoder", config.input_codec))?;
    let encoder = Encoder::new(config.encoder.clone())
        .with_context(|| format!("open {:?} encoder", config.encoder.codec))?;
    let sink = FileSink::create(&config.output_path)?;

    let stats = match config.framing {
        InputFraming::PerFrame => TranscodeLoop::new(
            camera,
            decoder,
            encoder,
            sink,
            PerFrame::default(),
            config.wait_timeout(),
        )
        .run(&cancel)?,
        InputFraming::Parsed => TranscodeLoop::new(
            camera,
            decoder,
            encoder,
            sink,
            ParserFraming::new(config.input_codec)?,
            config.wait_timeout(),
        )
        .run(&cancel)?,
    };
    Ok(stats)
}

#[cfg(not(target_os = "linux"))]
fn transcode(
    _config: TranscodeConfig,
    _cancel: CancellationToken,
) -> anyhow::Result<TranscodeStats> {
    anyhow::bail!("V4L2 capture is only available on Linux")
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(e) = ffmpeg_stage::init() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }

    let config = TranscodeConfig::default();
    let cancel = CancellationToken::new();

    let worker_cancel = cancel.clone();
    let mut worker = tokio::task::spawn_blocking(move || transcode(config, worker_cancel));

    let result = loop {
        tokio::select! {
            result = &mut worker => break result,
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                log::info!("ctrl-c received, stopping capture");
                cancel.cancel();
            },
        }
    };

    match result {
        Ok(Ok(stats)) => log::info!("done: {}", stats),
        Ok(Err(e)) => {
            log::error!("transcode failed: {:#}", e);
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("transcode task panicked: {}", e);
            std::process::exit(1);
        }
    }
}
