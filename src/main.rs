//! CLI for greenroom
//!
//! Subcommands:
//! - `server`: run the ingestion and streaming server
//! - `listen`: subscribe to the stream and drive a logging avatar session
//! - `send`: submit narration to a running server
//! - `key`: chroma-key an image, or a directory of frames, against a background

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use greenroom::broker::DeliveryQueue;
use greenroom::client::{Producer, StreamClient};
use greenroom::compositor::still::composite_still;
use greenroom::compositor::{
    BackgroundHandle, Compositor, ImageSequence, PngSequenceSink, UrlLoader,
};
use greenroom::config::{Settings, load_config};
use greenroom::presenter::{LoggingSession, SessionConfig, SessionPresenter};
use greenroom::transport::{AppState, start_http_server};
use greenroom::utils::logging;

#[derive(Parser)]
#[command(name = "greenroom", version)]
enum Command {
    /// Start the HTTP server
    Server,
    /// Subscribe to the text stream and present each message
    Listen {
        /// Server base URL (default: client.server_url from config)
        #[arg(long)]
        url: Option<String>,
        /// Directory of avatar frames to composite while listening
        #[arg(long)]
        frames: Option<PathBuf>,
        /// Where composited frames are written (default: <frames>/keyed)
        #[arg(long, requires = "frames")]
        output: Option<PathBuf>,
    },
    /// Submit one message per TEXT argument
    Send {
        #[arg(long)]
        url: Option<String>,
        /// Image shown next to the avatar
        #[arg(long)]
        image: Option<String>,
        /// Background replacing the green screen
        #[arg(long)]
        background: Option<String>,
        /// Pause between two messages
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Replace the green screen of an image or a directory of frames
    Key {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        background: String,
        /// Output file, or output directory when the input is a directory
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging.level);

    let cmd = Command::parse();
    let (name, result) = match cmd {
        Command::Server => ("Server", run_server(&settings).await),
        Command::Listen {
            url,
            frames,
            output,
        } => ("Listener", run_listen(&settings, url, frames, output).await),
        Command::Send {
            url,
            image,
            background,
            interval_ms,
            text,
        } => (
            "Producer",
            run_send(&settings, url, image, background, interval_ms, text).await,
        ),
        Command::Key {
            input,
            background,
            output,
        } => ("Compositor", run_key(&settings, input, background, output).await),
    };

    if let Err(e) = result {
        error!("{} failed: {}", name, e);
        std::process::exit(1);
    }
}

async fn run_server(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let poll_interval = Duration::from_millis(settings.notifier.poll_interval_ms);
    let state = AppState::new(DeliveryQueue::new(), poll_interval);

    start_http_server(addr, state, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received. Exiting gracefully.");
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

async fn run_listen(
    settings: &Settings,
    url: Option<String>,
    frames: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = url.unwrap_or_else(|| settings.client.server_url.clone());
    let background = BackgroundHandle::default();
    let mut presenter = SessionPresenter::new(
        LoggingSession::new(),
        background.clone(),
        settings.compositor.default_background.clone(),
    );
    presenter.start(&SessionConfig::default()).await?;

    let cancel = cancel_on_ctrl_c();

    let frame_loop = match frames {
        Some(dir) => {
            let mut source = ImageSequence::open(&dir)?;
            let mut sink = PngSequenceSink::create(&output.unwrap_or_else(|| dir.join("keyed")))?;
            let mut compositor = Compositor::new(background.clone());
            let frame_rate = settings.compositor.frame_rate;
            let cancel = cancel.clone();
            Some(tokio::spawn(async move {
                let stats = compositor
                    .run(&mut source, &mut sink, frame_rate, cancel)
                    .await;
                (stats, sink.finish().await)
            }))
        }
        None => None,
    };

    let messages = StreamClient::new(url)
        .connect()
        .await?
        .filter_map(|item| async move {
            match item {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("Dropping event: {}", e);
                    None
                }
            }
        });

    let closed = tokio::select! {
        _ = presenter.run(messages) => true,
        _ = cancel.cancelled() => false,
    };

    if closed {
        info!("Text stream closed, finishing speech");
        tokio::select! {
            _ = presenter.wait_for_speech() => {}
            _ = cancel.cancelled() => {}
        }
    } else {
        info!("Interrupted");
    }

    presenter.stop().await;
    cancel.cancel();

    if let Some(frame_loop) = frame_loop {
        let (stats, written) = frame_loop.await?;
        info!(
            presented = stats.presented,
            composited = stats.composited,
            written,
            "Frame loop finished"
        );
    }
    Ok(())
}

async fn run_send(
    settings: &Settings,
    url: Option<String>,
    image: Option<String>,
    background: Option<String>,
    interval_ms: u64,
    text: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = url.unwrap_or_else(|| settings.client.server_url.clone());
    let producer = Producer::new(url);

    for (i, line) in text.iter().enumerate() {
        if i > 0 && interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
        producer
            .submit(line, image.as_deref(), background.as_deref())
            .await?;
        info!("Sent: {}", line);
    }
    Ok(())
}

async fn run_key(
    settings: &Settings,
    input: PathBuf,
    background: String,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let loader = Arc::new(UrlLoader::new());

    if !input.is_dir() {
        let outcome = composite_still(&input, &background, &output, loader).await?;
        info!("Composite finished: {:?}", outcome);
        return Ok(());
    }

    let handle = BackgroundHandle::new(loader);
    handle.load(background).await?;

    let mut source = ImageSequence::open(&input)?;
    let mut sink = PngSequenceSink::create(&output)?;
    let stats = Compositor::new(handle)
        .run(
            &mut source,
            &mut sink,
            settings.compositor.frame_rate,
            cancel_on_ctrl_c(),
        )
        .await;

    let written = sink.finish().await;

    info!(
        presented = stats.presented,
        composited = stats.composited,
        skipped = stats.skipped,
        "Wrote {} frames to {}",
        written,
        output.display()
    );
    Ok(())
}
