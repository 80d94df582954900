mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    ClientSettings, CompositorSettings, LoggingSettings, NotifierSettings, PartialSettings,
    ServerSettings, Settings,
};

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
///
/// Environment variables use the `GREENROOM` prefix and `__` as the section
/// separator, e.g. `GREENROOM__SERVER__PORT=9000`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("GREENROOM")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}
