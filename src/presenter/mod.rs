//! The `presenter` module is the glue between delivered messages and the
//! avatar service: it speaks the text, shows the image and swaps the
//! compositor's background.

pub mod presenter;
pub mod session;

pub use presenter::SessionPresenter;
pub use session::{
    AvatarQuality, AvatarSession, ChatMode, LoggingSession, SessionConfig, SessionEvent,
    SpeakRequest, StreamHandle, TaskMode, TaskType,
};
