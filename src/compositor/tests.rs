use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tokio_util::sync::CancellationToken;

use super::chroma::{apply_chroma_key, destination_over, is_chroma_key};
use super::sequence::{ImageSequence, PngSequenceSink};
use super::still::composite_still;
use super::{
    BackgroundHandle, BackgroundLoader, BackgroundStatus, Compositor, FrameBuffer, FrameOutcome,
    FrameSink, FrameSource, UrlLoader, VideoFrame,
};
use crate::utils::error::CompositorError;

const GREEN: [u8; 4] = [0, 255, 0, 255];
const SKIN: [u8; 4] = [200, 150, 120, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

#[derive(Default)]
struct StaticLoader {
    images: HashMap<String, RgbaImage>,
    delays: HashMap<String, Duration>,
}

impl StaticLoader {
    fn with(mut self, url: &str, color: [u8; 4]) -> Self {
        self.images
            .insert(url.to_string(), RgbaImage::from_pixel(1, 1, Rgba(color)));
        self
    }

    fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    fn handle(self) -> BackgroundHandle {
        BackgroundHandle::new(Arc::new(self))
    }
}

#[async_trait]
impl BackgroundLoader for StaticLoader {
    async fn load(&self, url: &str) -> Result<RgbaImage, CompositorError> {
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| CompositorError::Fetch(format!("no such background: {url}")))
    }
}

struct ScriptedSource {
    frames: Vec<VideoFrame>,
    ready: bool,
    repeat: bool,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.repeat {
            return self.frames.first().cloned();
        }
        if self.frames.is_empty() {
            None
        } else {
            Some(self.frames.remove(0))
        }
    }
}

#[derive(Default)]
struct CollectingSink {
    frames: Vec<FrameBuffer>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FrameSink for CollectingSink {
    fn present(&mut self, frame: &FrameBuffer) {
        self.frames.push(frame.clone());
        if let Some((limit, token)) = &self.cancel_after {
            if self.frames.len() >= *limit {
                token.cancel();
            }
        }
    }
}

/// 2x1 frame: avatar pixel on the left, green screen on the right.
fn avatar_frame() -> VideoFrame {
    VideoFrame::new(2, 1, [SKIN, GREEN].concat()).unwrap()
}

#[test]
fn test_pure_green_is_keyed() {
    assert!(is_chroma_key(0, 255, 0));

    let mut pixels = GREEN.to_vec();
    assert_eq!(apply_chroma_key(&mut pixels), 1);
    assert_eq!(pixels, vec![0, 255, 0, 0]);
}

#[test]
fn test_threshold_and_dominance_are_strict() {
    // green must exceed 100
    assert!(!is_chroma_key(0, 100, 0));
    assert!(is_chroma_key(0, 101, 0));
    // and exceed 1.5x red and blue
    assert!(!is_chroma_key(100, 150, 0));
    assert!(is_chroma_key(99, 150, 0));
    assert!(!is_chroma_key(0, 150, 100));
    assert!(is_chroma_key(0, 150, 99));
}

#[test]
fn test_non_key_pixels_are_untouched() {
    let samples: [[u8; 4]; 6] = [
        SKIN,
        RED,
        BLUE,
        [60, 100, 20, 255],   // g at threshold
        [120, 180, 40, 128],  // g == 1.5 * r, half transparent
        [255, 255, 255, 0],   // white, already transparent
    ];
    let mut pixels = samples.concat();
    let before = pixels.clone();

    assert_eq!(apply_chroma_key(&mut pixels), 0);
    assert_eq!(pixels, before);
}

#[test]
fn test_destination_over_fills_only_transparent_pixels() {
    let mut foreground = [SKIN, [0, 255, 0, 0]].concat();
    let background = [RED, RED].concat();

    destination_over(&mut foreground, &background);
    assert_eq!(&foreground[..4], &SKIN);
    assert_eq!(&foreground[4..], &RED);
}

#[test]
fn test_destination_over_blends_partial_alpha() {
    let mut foreground = vec![255, 255, 255, 128];
    destination_over(&mut foreground, &[0, 0, 0, 255]);

    assert_eq!(foreground[3], 255);
    assert!((127..=129).contains(&foreground[0]));
    assert_eq!(foreground[0], foreground[1]);
    assert_eq!(foreground[1], foreground[2]);
}

#[test]
fn test_frame_buffer_tracks_source_dimensions() {
    let mut buffer = FrameBuffer::new();
    buffer.load(&VideoFrame::filled(2, 2, SKIN)).unwrap();
    assert_eq!((buffer.width(), buffer.height()), (2, 2));

    buffer.load(&VideoFrame::filled(4, 1, RED)).unwrap();
    assert_eq!((buffer.width(), buffer.height()), (4, 1));
    assert_eq!(buffer.pixel(3, 0), Some(RED));
    assert_eq!(buffer.pixel(0, 1), None);

    buffer.load(&VideoFrame::filled(3, 3, BLUE)).unwrap();
    assert_eq!(buffer.pixels().len(), 36);
    assert_eq!(buffer.pixel(2, 2), Some(BLUE));
}

#[test]
fn test_malformed_frame_is_rejected() {
    assert!(matches!(
        VideoFrame::new(2, 2, vec![0; 15]),
        Err(CompositorError::InvalidFrame {
            expected: 16,
            len: 15,
            ..
        })
    ));

    let mut buffer = FrameBuffer::new();
    let broken = VideoFrame {
        width: 1,
        height: 1,
        pixels: vec![1, 2, 3],
    };
    assert!(buffer.load(&broken).is_err());
}

#[tokio::test]
async fn test_without_background_frames_pass_through() {
    let mut compositor = Compositor::new(StaticLoader::default().handle());

    let outcome = compositor.process_frame(&avatar_frame()).unwrap();
    assert_eq!(outcome, FrameOutcome::PassThrough);
    assert_eq!(compositor.buffer().pixel(1, 0), Some(GREEN));
}

#[tokio::test]
async fn test_green_screen_replaced_by_background() {
    let handle = StaticLoader::default().with("bg1.png", RED).handle();
    handle.load("bg1.png").await.unwrap();
    let mut compositor = Compositor::new(handle);

    let outcome = compositor.process_frame(&avatar_frame()).unwrap();
    assert_eq!(outcome, FrameOutcome::Composited);
    assert_eq!(compositor.buffer().pixel(0, 0), Some(SKIN));
    assert_eq!(compositor.buffer().pixel(1, 0), Some(RED));
}

#[tokio::test(start_paused = true)]
async fn test_background_still_loading_leaves_keyed_holes() {
    let handle = StaticLoader::default()
        .with("bg1.png", RED)
        .slow("bg1.png", Duration::from_secs(2))
        .handle();
    let loading = handle.set("bg1.png").unwrap();
    let mut compositor = Compositor::new(handle.clone());

    assert_eq!(handle.status(), BackgroundStatus::Loading);
    let outcome = compositor.process_frame(&avatar_frame()).unwrap();
    assert_eq!(outcome, FrameOutcome::Keyed);
    assert_eq!(compositor.buffer().pixel(1, 0), Some([0, 255, 0, 0]));

    loading.await.unwrap();
    assert_eq!(handle.status(), BackgroundStatus::Ready);
    let outcome = compositor.process_frame(&avatar_frame()).unwrap();
    assert_eq!(outcome, FrameOutcome::Composited);
    assert_eq!(compositor.buffer().pixel(1, 0), Some(RED));
}

#[tokio::test]
async fn test_failed_background_keeps_keying() {
    let handle = StaticLoader::default().handle();
    assert!(handle.load("missing.png").await.is_err());
    assert_eq!(handle.status(), BackgroundStatus::Failed);

    let mut compositor = Compositor::new(handle);
    let outcome = compositor.process_frame(&avatar_frame()).unwrap();
    assert_eq!(outcome, FrameOutcome::Keyed);
}

#[tokio::test(start_paused = true)]
async fn test_stale_background_load_is_discarded() {
    let handle = StaticLoader::default()
        .with("slow.png", RED)
        .slow("slow.png", Duration::from_secs(5))
        .with("fast.png", BLUE)
        .handle();

    let slow = handle.set("slow.png").unwrap();
    let fast = handle.set("fast.png").unwrap();
    fast.await.unwrap();
    slow.await.unwrap();

    assert_eq!(handle.url().as_deref(), Some("fast.png"));
    let mut compositor = Compositor::new(handle);
    compositor.process_frame(&avatar_frame()).unwrap();
    assert_eq!(compositor.buffer().pixel(1, 0), Some(BLUE));
}

#[tokio::test]
async fn test_setting_current_background_is_a_no_op() {
    let handle = StaticLoader::default().with("bg1.png", RED).handle();
    handle.load("bg1.png").await.unwrap();
    assert!(handle.set("bg1.png").is_none());

    handle.clear();
    assert_eq!(handle.status(), BackgroundStatus::Unset);
    assert!(handle.url().is_none());
}

#[tokio::test]
async fn test_background_is_rescaled_when_frame_size_changes() {
    let handle = StaticLoader::default().with("bg1.png", RED).handle();
    handle.load("bg1.png").await.unwrap();
    let mut compositor = Compositor::new(handle);

    compositor
        .process_frame(&VideoFrame::filled(4, 4, GREEN))
        .unwrap();
    assert_eq!(compositor.buffer().pixel(3, 3), Some(RED));

    compositor
        .process_frame(&VideoFrame::filled(8, 2, GREEN))
        .unwrap();
    assert_eq!(compositor.buffer().pixel(7, 1), Some(RED));
}

#[tokio::test(start_paused = true)]
async fn test_frame_loop_stops_when_source_ends() {
    let handle = StaticLoader::default().with("bg1.png", RED).handle();
    handle.load("bg1.png").await.unwrap();
    let mut compositor = Compositor::new(handle);
    let mut source = ScriptedSource {
        frames: vec![avatar_frame(), avatar_frame(), avatar_frame()],
        ready: true,
        repeat: false,
    };
    let mut sink = CollectingSink::default();

    let stats = compositor
        .run(&mut source, &mut sink, 30, CancellationToken::new())
        .await;

    assert_eq!(stats.presented, 3);
    assert_eq!(stats.composited, 3);
    assert_eq!(sink.frames.len(), 3);
    assert!(sink.frames.iter().all(|f| f.pixel(1, 0) == Some(RED)));
}

#[tokio::test(start_paused = true)]
async fn test_frame_loop_honours_cancellation() {
    let mut compositor = Compositor::new(StaticLoader::default().handle());
    let mut source = ScriptedSource {
        frames: vec![avatar_frame()],
        ready: true,
        repeat: true,
    };
    let cancel = CancellationToken::new();
    let mut sink = CollectingSink {
        frames: Vec::new(),
        cancel_after: Some((2, cancel.clone())),
    };

    let stats = compositor.run(&mut source, &mut sink, 60, cancel).await;
    assert_eq!(stats.presented, 2);
    assert_eq!(stats.composited, 0);
}

#[tokio::test(start_paused = true)]
async fn test_frame_loop_skips_until_source_ready() {
    let mut compositor = Compositor::new(StaticLoader::default().handle());
    let mut source = ScriptedSource {
        frames: vec![avatar_frame()],
        ready: false,
        repeat: true,
    };
    let mut sink = CollectingSink::default();
    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stopper.cancel();
    });

    let stats = compositor.run(&mut source, &mut sink, 30, cancel).await;
    assert_eq!(stats.presented, 0);
    assert!(stats.skipped > 0);
    assert!(sink.frames.is_empty());
}

#[tokio::test]
async fn test_composite_still_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("avatar.png");
    let background = dir.path().join("studio.png");
    let output = dir.path().join("out.png");

    let mut avatar = RgbaImage::from_pixel(4, 4, Rgba(GREEN));
    avatar.put_pixel(1, 1, Rgba(SKIN));
    avatar.save(&input).unwrap();
    RgbaImage::from_pixel(2, 2, Rgba(BLUE))
        .save(&background)
        .unwrap();

    let outcome = composite_still(
        &input,
        background.to_str().unwrap(),
        &output,
        Arc::new(UrlLoader::new()),
    )
    .await
    .unwrap();
    assert_eq!(outcome, FrameOutcome::Composited);

    let written = image::open(&output).unwrap().to_rgba8();
    assert_eq!(written.get_pixel(1, 1).0, SKIN);
    assert_eq!(written.get_pixel(0, 0).0, BLUE);
    assert_eq!(written.get_pixel(3, 3).0, BLUE);
}

#[tokio::test]
async fn test_image_sequence_through_frame_loop() {
    let frames = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    for name in ["b.png", "a.png"] {
        let mut still = RgbaImage::from_pixel(2, 2, Rgba(GREEN));
        still.put_pixel(0, 0, Rgba(SKIN));
        still.save(frames.path().join(name)).unwrap();
    }
    std::fs::write(frames.path().join("notes.txt"), "not a frame").unwrap();
    std::fs::write(frames.path().join("broken.png"), "not a png either").unwrap();

    let mut source = ImageSequence::open(frames.path()).unwrap();
    assert_eq!(source.remaining(), 3);

    let background = StaticLoader::default().with("studio", RED).handle();
    background.load("studio").await.unwrap();

    let mut sink = PngSequenceSink::create(&output.path().join("keyed")).unwrap();
    let mut compositor = Compositor::new(background);
    let stats = compositor
        .run(&mut source, &mut sink, 30, CancellationToken::new())
        .await;

    assert_eq!(stats.presented, 2);
    assert_eq!(stats.composited, 2);
    assert_eq!(sink.finish().await, 2);
    assert_eq!(sink.written(), 2);

    let first = image::open(output.path().join("keyed").join("frame_00000.png"))
        .unwrap()
        .to_rgba8();
    assert_eq!(first.get_pixel(0, 0).0, SKIN);
    assert_eq!(first.get_pixel(1, 1).0, RED);
}

#[tokio::test]
async fn test_png_sink_numbers_frames_in_presentation_order() {
    let output = tempfile::tempdir().unwrap();
    let mut sink = PngSequenceSink::create(output.path()).unwrap();

    let mut buffer = FrameBuffer::new();
    buffer.load(&VideoFrame::filled(2, 1, BLUE)).unwrap();
    sink.present(&buffer);
    buffer.load(&VideoFrame::filled(2, 1, RED)).unwrap();
    sink.present(&buffer);

    assert_eq!(sink.finish().await, 2);
    assert!(output.path().join("frame_00000.png").exists());
    assert!(!output.path().join("frame_00002.png").exists());

    let second = image::open(output.path().join("frame_00001.png")).unwrap().to_rgba8();
    assert_eq!(second.get_pixel(1, 0).0, RED);
}
