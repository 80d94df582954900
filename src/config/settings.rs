use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub notifier: NotifierSettings,
    pub compositor: CompositorSettings,
    pub logging: LoggingSettings,
    pub client: ClientSettings,
}

/// Configuration settings for the HTTP server.
///
/// Defines the host and port the ingestion and streaming endpoints bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the streaming notifier.
#[derive(Debug, Deserialize, Clone)]
pub struct NotifierSettings {
    /// Interval between two queue polls. One message is pushed per poll.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompositorSettings {
    pub frame_rate: u32,
    /// Background shown until a message carries its own.
    pub default_background: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Where `listen` and `send` find the server.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub server_url: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub notifier: Option<PartialNotifierSettings>,
    pub compositor: Option<PartialCompositorSettings>,
    pub logging: Option<PartialLoggingSettings>,
    pub client: Option<PartialClientSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialNotifierSettings {
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialCompositorSettings {
    pub frame_rate: Option<u32>,
    pub default_background: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub server_url: Option<String>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            notifier: NotifierSettings {
                poll_interval_ms: 1000,
            },
            compositor: CompositorSettings {
                frame_rate: 30,
                default_background: None,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
            client: ClientSettings {
                server_url: "http://127.0.0.1:3000".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();

        Settings {
            server: ServerSettings {
                host: self
                    .server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: self
                    .server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            notifier: NotifierSettings {
                poll_interval_ms: self
                    .notifier
                    .as_ref()
                    .and_then(|n| n.poll_interval_ms)
                    .unwrap_or(default.notifier.poll_interval_ms),
            },
            compositor: CompositorSettings {
                frame_rate: self
                    .compositor
                    .as_ref()
                    .and_then(|c| c.frame_rate)
                    .unwrap_or(default.compositor.frame_rate),
                default_background: self
                    .compositor
                    .as_ref()
                    .and_then(|c| c.default_background.clone())
                    .filter(|bg| !bg.is_empty())
                    .or(default.compositor.default_background),
            },
            logging: LoggingSettings {
                level: self
                    .logging
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.logging.level),
            },
            client: ClientSettings {
                server_url: self
                    .client
                    .as_ref()
                    .and_then(|c| c.server_url.clone())
                    .unwrap_or(default.client.server_url),
            },
        }
    }
}
