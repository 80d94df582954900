use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::utils::error::ClientError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Submission<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    background_image: Option<&'a str>,
}

/// Posts narration to `POST /api/receive-text`.
#[derive(Debug, Clone)]
pub struct Producer {
    http: reqwest::Client,
    base_url: String,
}

impl Producer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submits one message. Anything but `200 OK` is returned as
    /// [`ClientError::Rejected`] with the response body.
    pub async fn submit(
        &self,
        text: &str,
        image_url: Option<&str>,
        background_image: Option<&str>,
    ) -> Result<(), ClientError> {
        let response = self
            .http
            .post(format!("{}/api/receive-text", self.base_url))
            .json(&Submission {
                text,
                image_url,
                background_image,
            })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Submitted: {}", text);
        Ok(())
    }
}
