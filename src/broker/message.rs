use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::error::IngestError;

/// A unit of narration moved from the ingestion endpoint to the presenter.
///
/// A message consists of the text the avatar speaks, an optional image shown
/// next to the avatar and an optional background that replaces the green
/// screen. Fields are private: a message is immutable once built.
///
/// On the wire it is serialized as
/// `{"text": "...", "imageUrl": "..." | null, "backgroundImage": "..." | null}`.
///
/// # Example
///
/// ```rust
/// use greenroom::broker::Message;
///
/// let msg = Message::new("Breaking news", Some("img.png".to_string()), None).unwrap();
/// assert_eq!(msg.text(), "Breaking news");
/// assert_eq!(msg.image_url(), Some("img.png"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "MessagePayload")]
pub struct Message {
    text: String,
    image_url: Option<String>,
    background_image: Option<String>,
    #[serde(skip)]
    queued_at: DateTime<Utc>,
}

impl Message {
    /// Builds a message, rejecting empty text.
    ///
    /// Empty image or background references are treated as absent.
    pub fn new(
        text: impl Into<String>,
        image_url: Option<String>,
        background_image: Option<String>,
    ) -> Result<Self, IngestError> {
        let text = text.into();
        if text.is_empty() {
            return Err(IngestError::Validation);
        }

        Ok(Self {
            text,
            image_url: image_url.filter(|url| !url.is_empty()),
            background_image: background_image.filter(|url| !url.is_empty()),
            queued_at: Utc::now(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn background_image(&self) -> Option<&str> {
        self.background_image.as_deref()
    }

    /// When the message was accepted. Not part of the wire format.
    pub fn queued_at(&self) -> DateTime<Utc> {
        self.queued_at
    }

    /// Serializes the message as one server-sent event: `data: <json>\n\n`.
    pub fn to_event_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// The JSON body accepted by the ingestion endpoint, before validation.
///
/// `text` is optional here so that a missing or `null` text is reported as a
/// validation failure rather than a malformed body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub background_image: Option<String>,
}

impl TryFrom<MessagePayload> for Message {
    type Error = IngestError;

    fn try_from(payload: MessagePayload) -> Result<Self, Self::Error> {
        let text = payload.text.ok_or(IngestError::Validation)?;
        Message::new(text, payload.image_url, payload.background_image)
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
            && self.image_url == other.image_url
            && self.background_image == other.background_image
    }
}

impl Eq for Message {}
