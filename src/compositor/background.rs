//! Background layer
//!
//! The background that replaces the green screen is referenced by URL. Setting
//! a new URL starts an asynchronous load; until it completes the compositor
//! keeps keying frames but has nothing to draw beneath them. A load that
//! finishes after the URL has changed again is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use image::RgbaImage;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::utils::error::CompositorError;

/// Fetches and decodes a background image.
#[async_trait]
pub trait BackgroundLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<RgbaImage, CompositorError>;
}

/// Loads `http(s)://` URLs with reqwest and everything else from disk.
#[derive(Debug, Clone, Default)]
pub struct UrlLoader {
    http: reqwest::Client,
}

impl UrlLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackgroundLoader for UrlLoader {
    async fn load(&self, url: &str) -> Result<RgbaImage, CompositorError> {
        let bytes = if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| CompositorError::Fetch(e.to_string()))?;
            response
                .bytes()
                .await
                .map_err(|e| CompositorError::Fetch(e.to_string()))?
                .to_vec()
        } else {
            tokio::fs::read(url.strip_prefix("file://").unwrap_or(url)).await?
        };

        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundStatus {
    /// No background: frames pass through unmodified.
    Unset,
    Loading,
    Ready,
    Failed,
}

/// What the frame loop should draw beneath the keyed raster this tick.
#[derive(Debug, Clone)]
pub enum BackgroundLayer {
    None,
    Pending,
    Ready(Arc<RgbaImage>),
}

#[derive(Debug, Default)]
struct BackgroundState {
    url: Option<String>,
    image: Option<Arc<RgbaImage>>,
    failed: bool,
    generation: u64,
}

/// Shared reference to the current background.
///
/// The presenter sets it, the compositor's frame loop reads it. Cloning
/// yields another handle to the same state.
#[derive(Clone)]
pub struct BackgroundHandle {
    state: Arc<Mutex<BackgroundState>>,
    loader: Arc<dyn BackgroundLoader>,
}

impl std::fmt::Debug for BackgroundHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundHandle")
            .field("url", &self.url())
            .field("status", &self.status())
            .finish()
    }
}

impl Default for BackgroundHandle {
    fn default() -> Self {
        Self::new(Arc::new(UrlLoader::new()))
    }
}

impl BackgroundHandle {
    pub fn new(loader: Arc<dyn BackgroundLoader>) -> Self {
        Self {
            state: Arc::new(Mutex::new(BackgroundState::default())),
            loader,
        }
    }

    /// Points the background at `url` and loads it in the background.
    ///
    /// Setting the URL that is already current is a no-op and returns `None`.
    /// Must be called from within a tokio runtime.
    pub fn set(&self, url: impl Into<String>) -> Option<JoinHandle<()>> {
        let url = url.into();
        let generation = self.begin(&url)?;
        let this = self.clone();
        Some(tokio::spawn(async move {
            let _ = this.finish(generation, &url).await;
        }))
    }

    /// Like [`set`](Self::set), but waits for the load and reports its failure.
    pub async fn load(&self, url: impl Into<String>) -> Result<(), CompositorError> {
        let url = url.into();
        match self.begin(&url) {
            Some(generation) => self.finish(generation, &url).await,
            None => Ok(()),
        }
    }

    /// Drops the background; frames pass through again.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.url = None;
        state.image = None;
        state.failed = false;
    }

    pub fn url(&self) -> Option<String> {
        self.lock().url.clone()
    }

    pub fn status(&self) -> BackgroundStatus {
        let state = self.lock();
        match (&state.url, &state.image, state.failed) {
            (None, _, _) => BackgroundStatus::Unset,
            (Some(_), Some(_), _) => BackgroundStatus::Ready,
            (Some(_), None, true) => BackgroundStatus::Failed,
            (Some(_), None, false) => BackgroundStatus::Loading,
        }
    }

    pub fn layer(&self) -> BackgroundLayer {
        let state = self.lock();
        match (&state.url, &state.image) {
            (None, _) => BackgroundLayer::None,
            (Some(_), Some(image)) => BackgroundLayer::Ready(image.clone()),
            (Some(_), None) => BackgroundLayer::Pending,
        }
    }

    // Returns the generation to load under, or None if `url` is already current.
    fn begin(&self, url: &str) -> Option<u64> {
        let mut state = self.lock();
        if state.url.as_deref() == Some(url) && !state.failed {
            return None;
        }
        state.generation += 1;
        state.url = Some(url.to_string());
        state.image = None;
        state.failed = false;
        info!("Background set to {url}");
        Some(state.generation)
    }

    async fn finish(&self, generation: u64, url: &str) -> Result<(), CompositorError> {
        let result = self.loader.load(url).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!("Discarding stale background load for {url}");
            return Ok(());
        }
        match result {
            Ok(image) => {
                debug!(
                    width = image.width(),
                    height = image.height(),
                    "Background {url} loaded"
                );
                state.image = Some(Arc::new(image));
                Ok(())
            }
            Err(err) => {
                warn!("Failed to load background {url}: {err}");
                state.failed = true;
                Err(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackgroundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
