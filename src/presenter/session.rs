//! Boundary with the external streaming-avatar service.
//!
//! The service itself is out of scope; only the calls the presenter makes and
//! the notifications it reacts to are modelled here.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::utils::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarQuality {
    Low,
    Medium,
    High,
}

/// Parameters for starting an avatar session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub avatar_name: String,
    pub knowledge_id: Option<String>,
    pub language: String,
    pub quality: AvatarQuality,
    /// Speech rate, 0.5 to 1.5.
    pub voice_rate: f32,
    pub disable_idle_timeout: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            avatar_name: String::new(),
            knowledge_id: None,
            language: "en".to_string(),
            quality: AvatarQuality::Low,
            voice_rate: 1.0,
            disable_idle_timeout: true,
        }
    }
}

/// Handle to the media stream of a started session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Text,
    Voice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Let the avatar answer the text.
    Talk,
    /// Speak the text verbatim.
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    /// The call completes once the avatar has finished speaking.
    Sync,
    Async,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeakRequest {
    pub text: String,
    pub task_type: TaskType,
    pub task_mode: TaskMode,
}

impl SpeakRequest {
    /// Verbatim narration that completes when speech ends.
    pub fn repeat(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            task_type: TaskType::Repeat,
            task_mode: TaskMode::Sync,
        }
    }
}

/// Lifecycle notifications raised by the avatar service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    StreamReady,
    AvatarStartTalking,
    AvatarStopTalking,
    StreamDisconnected,
    UserStartTalking,
    UserStopTalking,
}

/// Operations consumed from the avatar service.
///
/// Calls take `&self` so that `interrupt` can reach the service while a
/// `speak` is still in flight.
#[async_trait]
pub trait AvatarSession: Send + Sync {
    async fn create_session(&self, config: &SessionConfig) -> Result<StreamHandle, SessionError>;

    async fn start_voice_or_text_mode(&self, mode: ChatMode) -> Result<(), SessionError>;

    async fn speak(&self, request: SpeakRequest) -> Result<(), SessionError>;

    async fn interrupt(&self) -> Result<(), SessionError>;

    async fn stop_session(&self) -> Result<(), SessionError>;
}

/// An avatar session that only logs what it is asked to do.
///
/// Lets the presenter run headless, e.g. from `greenroom listen`.
#[derive(Debug, Default)]
pub struct LoggingSession {
    session_id: Mutex<Option<String>>,
}

impl LoggingSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn session_id(&self) -> MutexGuard<'_, Option<String>> {
        self.session_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_session(&self) -> Result<String, SessionError> {
        self.session_id().clone().ok_or(SessionError::NotStarted)
    }
}

#[async_trait]
impl AvatarSession for LoggingSession {
    async fn create_session(&self, config: &SessionConfig) -> Result<StreamHandle, SessionError> {
        let session_id = Uuid::new_v4().to_string();
        info!(
            avatar = %config.avatar_name,
            language = %config.language,
            "Session {session_id} created"
        );
        *self.session_id() = Some(session_id.clone());
        Ok(StreamHandle { session_id })
    }

    async fn start_voice_or_text_mode(&self, mode: ChatMode) -> Result<(), SessionError> {
        let id = self.require_session()?;
        info!("Session {id} switched to {mode:?} mode");
        Ok(())
    }

    async fn speak(&self, request: SpeakRequest) -> Result<(), SessionError> {
        let id = self.require_session()?;
        info!(
            task_type = ?request.task_type,
            task_mode = ?request.task_mode,
            "Session {id} speaks: {}",
            request.text
        );
        Ok(())
    }

    async fn interrupt(&self) -> Result<(), SessionError> {
        let id = self.require_session()?;
        info!("Session {id} interrupted");
        Ok(())
    }

    async fn stop_session(&self) -> Result<(), SessionError> {
        let stopped = self.session_id().take();
        if let Some(id) = stopped {
            info!("Session {id} stopped");
        }
        Ok(())
    }
}
