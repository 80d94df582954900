use futures_util::{Stream, StreamExt, stream};
use reqwest::header::ACCEPT;
use tracing::info;

use crate::broker::Message;
use crate::client::parser::EventStreamParser;
use crate::utils::error::ClientError;

/// Subscriber side of `GET /api/text-stream`.
#[derive(Debug, Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl StreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Opens the event stream and yields each delivered message.
    ///
    /// A payload that is not a valid message yields `ClientError::Decode`
    /// and the stream carries on. The stream ends when the server closes the
    /// connection. Dropping it disconnects the subscriber.
    pub async fn connect(
        &self,
    ) -> Result<impl Stream<Item = Result<Message, ClientError>> + Send + 'static, ClientError>
    {
        let url = format!("{}/api/text-stream", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("Connected to {}", url);

        let mut parser = EventStreamParser::new();
        let messages = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => parser
                    .feed(&bytes)
                    .into_iter()
                    .map(|data| serde_json::from_str::<Message>(&data).map_err(ClientError::from))
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(ClientError::from(e))],
            })
            .flat_map(stream::iter);

        Ok(messages)
    }
}
