//! Image sequences as frame source and sink, so the frame loop can run
//! headless over a directory of stills.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::compositor::frame::{FrameBuffer, VideoFrame};
use crate::compositor::pipeline::{FrameSink, FrameSource};
use crate::utils::error::CompositorError;

type WriteResult = Result<(), (PathBuf, image::ImageError)>;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Frames read, in file-name order, from the images in one directory.
#[derive(Debug)]
pub struct ImageSequence {
    pending: VecDeque<PathBuf>,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self, CompositorError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_frame {
                paths.push(path);
            }
        }
        paths.sort();

        debug!("Found {} frames in {}", paths.len(), dir.display());
        Ok(Self {
            pending: paths.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl FrameSource for ImageSequence {
    fn is_ready(&self) -> bool {
        true
    }

    /// Decodes on the blocking pool. Undecodable files are logged and
    /// skipped.
    async fn next_frame(&mut self) -> Option<VideoFrame> {
        while let Some(path) = self.pending.pop_front() {
            let decode = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || image::open(&path).map(|i| i.to_rgba8()))
            };
            match decode.await {
                Ok(Ok(image)) => return Some(VideoFrame::from_image(image)),
                Ok(Err(e)) => warn!("Skipping {}: {}", path.display(), e),
                Err(e) => warn!("Decoding {} did not finish: {}", path.display(), e),
            }
        }
        None
    }
}

/// Writes every presented raster as `frame_NNNNN.png` into a directory.
///
/// Encoding runs on the blocking pool; call [`PngSequenceSink::finish`] to
/// wait for outstanding writes.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    next_index: u64,
    written: u64,
    writes: JoinSet<WriteResult>,
}

impl PngSequenceSink {
    pub fn create(dir: &Path) -> Result<Self, CompositorError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            next_index: 0,
            written: 0,
            writes: JoinSet::new(),
        })
    }

    /// Frames confirmed on disk so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Waits for every pending write and returns the number of frames on disk.
    pub async fn finish(&mut self) -> u64 {
        while let Some(result) = self.writes.join_next().await {
            self.record(result);
        }
        self.written
    }

    fn record(&mut self, result: Result<WriteResult, JoinError>) {
        match result {
            Ok(Ok(())) => self.written += 1,
            Ok(Err((path, e))) => warn!("Failed to write {}: {}", path.display(), e),
            Err(e) => warn!("Frame write did not finish: {}", e),
        }
    }
}

impl FrameSink for PngSequenceSink {
    /// Must be called from within a tokio runtime.
    fn present(&mut self, frame: &FrameBuffer) {
        while let Some(result) = self.writes.try_join_next() {
            self.record(result);
        }

        let Some(image) = frame.to_image() else {
            warn!("Dropping raster with inconsistent dimensions");
            return;
        };

        let path = self.dir.join(format!("frame_{:05}.png", self.next_index));
        self.next_index += 1;
        self.writes.spawn_blocking(move || image.save(&path).map_err(|e| (path, e)));
    }
}
