//! # Logger
//!
//! Installs the process-wide `tracing` subscriber for ApexHire services.
//!
//! Output goes to the console (compact, ANSI), to a rolling file (plain or JSON), or
//! both. Filtering starts from a default level and honours `RUST_LOG`, or an explicit
//! directive string such as `"apex_placement=debug,tower_http=info"`.
//!
//! ## Example
//!
//! ```rust
//! use apex_logger::{LevelFilter, Logger};
//!
//! let _logger = Logger::builder()
//!     .name("apex-server")
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 7;
const LOG_FILE_SUFFIX: &str = "log";

#[derive(Debug, Clone)]
struct FileSink {
    directory: PathBuf,
    rotation: Rotation,
    max_files: usize,
    json: bool,
}

/// Builder for the global subscriber. Obtain one through [`Logger::builder`].
#[derive(Debug, Clone)]
pub struct LoggerBuilder {
    name: String,
    console: bool,
    level: LevelFilter,
    directives: Option<String>,
    file: Option<FileSink>,
}

impl LoggerBuilder {
    /// Prefix of rolled log files; also identifies the service in startup logs.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Explicit filter directives; when absent `RUST_LOG` is consulted.
    #[must_use]
    pub fn directives(mut self, directives: impl Into<String>) -> Self {
        let directives = directives.into();
        self.directives = (!directives.trim().is_empty()).then_some(directives);
        self
    }

    #[must_use]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Enables file output into `directory`, rotated daily by default.
    #[must_use]
    pub fn file(mut self, directory: impl Into<PathBuf>) -> Self {
        self.file = Some(FileSink {
            directory: directory.into(),
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
        });
        self
    }

    /// No-op unless [`Self::file`] was called first.
    #[must_use]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        if let Some(sink) = self.file.as_mut() {
            sink.rotation = rotation;
        }
        self
    }

    /// No-op unless [`Self::file`] was called first.
    #[must_use]
    pub fn max_files(mut self, max_files: usize) -> Self {
        if let Some(sink) = self.file.as_mut() {
            sink.max_files = max_files;
        }
        self
    }

    /// Writes file output as JSON lines. No-op unless [`Self::file`] was called first.
    #[must_use]
    pub fn json(mut self, enabled: bool) -> Self {
        if let Some(sink) = self.file.as_mut() {
            sink.json = enabled;
        }
        self
    }

    /// Installs the subscriber.
    ///
    /// # Errors
    /// Returns [`LoggerError::InvalidConfiguration`] for an empty name, zero retained files,
    /// malformed directives or when no sink is enabled; [`LoggerError::Subscriber`] if a
    /// global subscriber already exists.
    pub fn init(self) -> Result<Logger, LoggerError> {
        self.validate()?;
        let filter = self.env_filter()?;

        let mut layers = Vec::new();
        if self.console {
            layers.push(layer().compact().with_ansi(true).with_target(true).boxed());
        }

        let guard = match &self.file {
            Some(sink) => {
                fs::create_dir_all(&sink.directory).context(format!(
                    "Failed to create log directory {}",
                    sink.directory.display()
                ))?;

                let appender = RollingFileAppender::builder()
                    .rotation(sink.rotation.clone())
                    .filename_prefix(&self.name)
                    .filename_suffix(LOG_FILE_SUFFIX)
                    .max_log_files(sink.max_files)
                    .build(&sink.directory)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);

                let file_layer = layer().with_writer(writer).with_ansi(false);
                layers.push(if sink.json { file_layer.json().boxed() } else { file_layer.boxed() });
                Some(guard)
            },
            None => None,
        };

        tracing_subscriber::registry().with(filter).with(layers).try_init()?;
        tracing::debug!(service = %self.name, file = self.file.is_some(), "Logger installed");

        Ok(Logger { guard })
    }

    fn validate(&self) -> Result<(), LoggerError> {
        let invalid = |message: &'static str| LoggerError::InvalidConfiguration {
            message: message.into(),
            context: None,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("Logger name cannot be empty"));
        }
        if self.file.as_ref().is_some_and(|sink| sink.max_files == 0) {
            return Err(invalid("max_files must be greater than zero"));
        }
        if !self.console && self.file.is_none() {
            return Err(invalid("No logging sink enabled; enable console or file output"));
        }
        Ok(())
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggerError> {
        let builder = EnvFilter::builder().with_default_directive(self.level.into());
        match &self.directives {
            Some(directives) => {
                builder.parse(directives).map_err(|e| LoggerError::InvalidConfiguration {
                    message: format!("Invalid filter '{directives}': {e}").into(),
                    context: None,
                })
            },
            None => Ok(builder.from_env_lossy()),
        }
    }
}

/// Handle keeping the background file writer alive.
#[must_use = "Dropping this handle stops the background log writer."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder {
            name: String::new(),
            console: true,
            level: LevelFilter::INFO,
            directives: None,
            file: None,
        }
    }

    #[must_use]
    pub const fn has_file_sink(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging shutting down, flushing file buffers");
        }
    }
}

/// Parses a level name (`trace`, `debug`, `info`, `warn`, `error`, `off`).
///
/// # Errors
/// Returns [`LoggerError::InvalidConfiguration`] for unknown names.
pub fn parse_level(raw: &str) -> Result<LevelFilter, LoggerError> {
    raw.trim().parse::<LevelFilter>().map_err(|_| LoggerError::InvalidConfiguration {
        message: format!("Unknown log level '{raw}'").into(),
        context: None,
    })
}

/// Parses a rotation name (`minutely`, `hourly`, `daily`, `weekly`, `never`).
///
/// # Errors
/// Returns [`LoggerError::InvalidConfiguration`] for unknown names.
pub fn parse_rotation(raw: &str) -> Result<Rotation, LoggerError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "minutely" => Ok(Rotation::MINUTELY),
        "hourly" => Ok(Rotation::HOURLY),
        "daily" => Ok(Rotation::DAILY),
        "weekly" => Ok(Rotation::WEEKLY),
        "never" => Ok(Rotation::NEVER),
        _ => Err(LoggerError::InvalidConfiguration {
            message: format!("Unknown log rotation '{raw}'").into(),
            context: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_console_info() {
        let builder = Logger::builder().name("apex-test");
        assert!(builder.console);
        assert_eq!(builder.level, LevelFilter::INFO);
        assert!(builder.file.is_none());
    }

    #[test]
    fn file_options_apply_only_after_file() {
        let builder = Logger::builder().name("apex-test").max_files(3).json(true);
        assert!(builder.file.is_none());

        let builder = builder.file("logs").max_files(3).json(true).rotation(Rotation::HOURLY);
        let sink = builder.file.as_ref().map(|s| (s.max_files, s.json));
        assert_eq!(sink, Some((3, true)));
    }

    #[test]
    fn blank_directives_fall_back_to_env() {
        let builder = Logger::builder().name("apex-test").directives("   ");
        assert!(builder.directives.is_none());
    }

    #[test]
    fn validation_rejects_unusable_configs() {
        let no_name = Logger::builder().validate();
        assert!(matches!(no_name, Err(LoggerError::InvalidConfiguration { .. })));

        let no_sink = Logger::builder().name("apex-test").console(false).validate();
        assert!(matches!(no_sink, Err(LoggerError::InvalidConfiguration { .. })));

        let zero_files = Logger::builder().name("apex-test").file("logs").max_files(0).validate();
        assert!(matches!(zero_files, Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn malformed_directives_are_rejected() {
        let builder = Logger::builder().name("apex-test").directives("apex=[[");
        assert!(matches!(builder.env_filter(), Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn level_and_rotation_names_parse() -> Result<(), LoggerError> {
        assert_eq!(parse_level("DEBUG")?, LevelFilter::DEBUG);
        assert_eq!(parse_level(" warn ")?, LevelFilter::WARN);
        assert!(parse_level("loud").is_err());

        assert_eq!(parse_rotation("Hourly")?, Rotation::HOURLY);
        assert!(parse_rotation("yearly").is_err());
        Ok(())
    }
}
