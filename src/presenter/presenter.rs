use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::broker::Message;
use crate::compositor::BackgroundHandle;
use crate::presenter::session::{
    AvatarSession, ChatMode, SessionConfig, SessionEvent, SpeakRequest, StreamHandle,
};
use crate::utils::error::SessionError;

type SharedStatus = Arc<Mutex<String>>;

fn set_status(status: &SharedStatus, text: impl Into<String>) {
    *status.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
}

enum SpeechTask {
    Speak(SpeakRequest),
    Flush(oneshot::Sender<()>),
}

/// Turns delivered messages into avatar actions.
///
/// Purely reactive: every message is spoken once, in arrival order, with no
/// retry of its own. Speech is handed to a worker task and never awaited by
/// `on_message`, so the next delivery is presented while the avatar is still
/// talking. The status text mirrors the latest message, speech failure or
/// session event, which is the only feedback a producer ever gets.
pub struct SessionPresenter<S> {
    session: Arc<S>,
    speech: mpsc::UnboundedSender<SpeechTask>,
    background: BackgroundHandle,
    overlay: Option<String>,
    status: SharedStatus,
    user_talking: bool,
}

impl<S: AvatarSession + 'static> SessionPresenter<S> {
    /// Creates a presenter driving `session` and the compositor behind
    /// `background`.
    ///
    /// A `default_background` is applied right away and stays until a message
    /// carries its own. Spawns the speech worker, so it must be called from
    /// within a tokio runtime.
    pub fn new(
        session: S,
        background: BackgroundHandle,
        default_background: Option<String>,
    ) -> Self {
        if let Some(url) = default_background {
            background.set(url);
        }

        let session = Arc::new(session);
        let status = Arc::new(Mutex::new("Idle".to_string()));
        let (speech, tasks) = mpsc::unbounded_channel();
        tokio::spawn(speech_worker(session.clone(), status.clone(), tasks));

        Self {
            session,
            speech,
            background,
            overlay: None,
            status,
            user_talking: false,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Image currently shown next to the avatar.
    pub fn overlay(&self) -> Option<&str> {
        self.overlay.as_deref()
    }

    pub fn status(&self) -> String {
        self.status_guard().clone()
    }

    fn status_guard(&self) -> MutexGuard<'_, String> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn background(&self) -> &BackgroundHandle {
        &self.background
    }

    pub fn is_user_talking(&self) -> bool {
        self.user_talking
    }

    /// Starts the avatar session in text mode.
    pub async fn start(&mut self, config: &SessionConfig) -> Result<StreamHandle, SessionError> {
        let stream = match self.session.create_session(config).await {
            Ok(stream) => stream,
            Err(err) => {
                set_status(&self.status, format!("Error: {err}"));
                return Err(err);
            }
        };
        self.session.start_voice_or_text_mode(ChatMode::Text).await?;
        set_status(&self.status, "Connected to text stream - waiting for content");
        Ok(stream)
    }

    /// Shows the message's image, switches the background when it names one
    /// and queues the text for the avatar to speak.
    pub fn on_message(&mut self, message: &Message) {
        info!("Received text: {}", message.text());

        self.overlay = message.image_url().map(str::to_string);
        if let Some(url) = &self.overlay {
            info!("Showing image {url}");
        }

        // No background in the message keeps the current one.
        if let Some(url) = message.background_image() {
            self.background.set(url);
        }

        let request = SpeakRequest::repeat(message.text());
        if self.speech.send(SpeechTask::Speak(request)).is_err() {
            warn!("Speech worker stopped, dropping: {}", message.text());
        }
    }

    /// Resolves once every speak request queued so far has completed.
    pub async fn wait_for_speech(&self) {
        let (done, finished) = oneshot::channel();
        if self.speech.send(SpeechTask::Flush(done)).is_ok() {
            let _ = finished.await;
        }
    }

    pub async fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StreamReady => set_status(&self.status, "Stream ready"),
            SessionEvent::AvatarStartTalking => set_status(&self.status, "Avatar speaking"),
            SessionEvent::AvatarStopTalking => set_status(&self.status, "Avatar ready"),
            SessionEvent::StreamDisconnected => {
                warn!("Avatar stream disconnected");
                self.stop().await;
                set_status(&self.status, "Stream disconnected");
            }
            SessionEvent::UserStartTalking => {
                self.user_talking = true;
            }
            SessionEvent::UserStopTalking => {
                self.user_talking = false;
            }
        }
    }

    /// Reaches the service directly, without waiting for queued speech.
    pub async fn interrupt(&mut self) {
        if let Err(err) = self.session.interrupt().await {
            set_status(&self.status, err.to_string());
        }
    }

    pub async fn stop(&mut self) {
        if let Err(err) = self.session.stop_session().await {
            warn!("Failed to stop session: {err}");
        }
        self.overlay = None;
        set_status(&self.status, "Session ended");
    }

    /// Presents every message of `messages` until the stream ends.
    pub async fn run<M>(&mut self, messages: M)
    where
        M: Stream<Item = Message>,
    {
        let mut messages = std::pin::pin!(messages);
        while let Some(message) = messages.next().await {
            self.on_message(&message);
        }
        info!("Text stream ended");
    }
}

/// Speaks queued requests one after another. Ends when the presenter is
/// dropped.
async fn speech_worker<S: AvatarSession>(
    session: Arc<S>,
    status: SharedStatus,
    mut tasks: mpsc::UnboundedReceiver<SpeechTask>,
) {
    while let Some(task) = tasks.recv().await {
        match task {
            SpeechTask::Speak(request) => {
                if let Err(err) = session.speak(request).await {
                    warn!("Speech error: {err}");
                    set_status(&status, format!("Speech error: {err}"));
                }
            }
            SpeechTask::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
