use eyre::Result;
use serde::Deserialize;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    prelude::*,
};

pub use self::fmt::Style;

/// Configure a `tracing_subscriber::fmt` Layer outputting to stdout
pub mod fmt;

/// Logging level. A "higher level" means more will be logged.
#[derive(Default, Debug, Clone, Copy, Deserialize, PartialOrd, Ord, PartialEq, Eq)]
#[serde(from = "String")]
pub enum Level {
    /// Off
    Off = 0,
    /// Error
    Error = 1,
    /// Warn
    Warn = 2,
    /// Info
    #[default]
    Info = 3,
    /// Debug
    Debug = 4,
    /// Trace
    Trace = 5,
}

impl From<String> for Level {
    /// Unknown names map to the default level.
    fn from(level: String) -> Self {
        match level.to_lowercase().as_str() {
            "off" => Level::Off,
            "error" => Level::Error,
            "warn" => Level::Warn,
            "debug" => Level::Debug,
            "trace" => Level::Trace,
            _ => Level::Info,
        }
    }
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> LevelFilter {
        match level {
            Level::Off => LevelFilter::OFF,
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
            Level::Info => LevelFilter::INFO,
        }
    }
}

/// Configuration for the tracing subscribers used by relay binaries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracingConfig {
    /// The logging style. json | pretty | compact | full
    #[serde(default)]
    pub fmt: Style,
    /// The logging level. Defaults to info
    #[serde(default)]
    pub level: Level,
}

impl TracingConfig {
    /// Attempt to instantiate and register a tracing subscriber setup from
    /// settings.
    pub fn start_tracing(&self) -> Result<()> {
        let mut target_layer = Targets::new().with_default(self.level);
        if self.level < Level::Trace {
            // config source resolution is only interesting at trace level
            target_layer = target_layer.with_target("config", Level::Warn);
        }
        let err_layer = tracing_error::ErrorLayer::default();

        let subscriber = tracing_subscriber::Registry::default()
            .with(target_layer)
            .with(self.fmt.layer())
            .with(err_layer);

        subscriber.try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn levels_are_ordered_by_verbosity() {
        assert!(Level::Off < Level::Error);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
        assert_eq!(LevelFilter::from(Level::default()), LevelFilter::INFO);
    }

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let cfg: TracingConfig = from_json(r#"{"fmt": "json", "level": "loud"}"#);
        assert_eq!(cfg.fmt, Style::Json);
        assert_eq!(cfg.level, Level::Info);

        let cfg: TracingConfig = from_json(r#"{"fmt": "fancy"}"#);
        assert_eq!(cfg.fmt, Style::Full);

        let cfg: TracingConfig = from_json(r#"{"fmt": "Compact", "level": "TRACE"}"#);
        assert_eq!(cfg.fmt, Style::Compact);
        assert_eq!(cfg.level, Level::Trace);
    }

    fn from_json(json: &str) -> TracingConfig {
        config::Config::builder()
            .add_source(config::File::from_str(json, config::FileFormat::Json))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
