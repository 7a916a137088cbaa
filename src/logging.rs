//! Logging setup for dependency-resolver
//!
//! Every event the resolver emits uses the `dependency_resolver` target:
//! registrations and member binding at `DEBUG`, cache hits, override
//! selection and build-lock traffic at `TRACE`.
//!
//! # Features
//!
//! - `logging` - emit events through `tracing` (default)
//! - `logging-json` - install a JSON subscriber
//! - `logging-pretty` - install a human-readable subscriber
//!
//! # Example
//!
//! ```rust,ignore
//! use dependency_resolver::logging;
//!
//! // Format picked from the enabled feature
//! logging::init();
//!
//! // Resolver events only, including build-lock traffic
//! logging::builder()
//!     .trace()
//!     .resolver_only()
//!     .with_thread_ids()
//!     .compact()
//!     .init();
//! ```

#[cfg(feature = "logging")]
use tracing::Level;

/// Target used by every resolver event
pub const LOG_TARGET: &str = "dependency_resolver";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line colored output
    Pretty,
    /// Single-line output
    Compact,
}

/// Subscriber configuration
#[cfg(feature = "logging")]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_thread_ids: bool,
    with_thread_names: bool,
    with_location: bool,
}

#[cfg(feature = "logging")]
impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::default(),
            target: None,
            with_thread_ids: false,
            with_thread_names: false,
            with_location: false,
        }
    }
}

#[cfg(feature = "logging")]
impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Include cache hits, override selection and lock traffic
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    /// Only show events from `target`
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show resolver events
    pub fn resolver_only(self) -> Self {
        self.with_target_filter(LOG_TARGET)
    }

    /// Thread ids make concurrent builds of one singleton easy to follow
    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    /// Include file and line of each event
    pub fn with_location(mut self) -> Self {
        self.with_location = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Directive handed to the env filter, e.g. `dependency_resolver=trace`.
    pub fn directive(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        match self.target {
            Some(target) => format!("{target}={level}"),
            None => level,
        }
    }

    /// Install the subscriber globally.
    ///
    /// Returns `false` when a global subscriber was already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> bool {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = EnvFilter::new(self.directive());
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_thread_ids(self.with_thread_ids)
                        .with_thread_names(self.with_thread_names)
                        .with_file(self.with_location)
                        .with_line_number(self.with_location),
                )
                .try_init(),
            // Without the json feature fall back to the default text layer
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .with_thread_ids(self.with_thread_ids)
                        .with_thread_names(self.with_thread_names)
                        .with_file(self.with_location)
                        .with_line_number(self.with_location),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(self.with_thread_ids)
                        .with_thread_names(self.with_thread_names)
                        .with_file(self.with_location)
                        .with_line_number(self.with_location),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_thread_ids(self.with_thread_ids)
                        .with_thread_names(self.with_thread_names)
                        .with_file(self.with_location)
                        .with_line_number(self.with_location),
                )
                .try_init(),
        };

        installed.is_ok()
    }

    /// No subscriber feature enabled; nothing is installed.
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> bool {
        false
    }
}

#[cfg(feature = "logging")]
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install a subscriber in the format of the enabled feature, JSON first.
#[cfg(feature = "logging")]
pub fn init() -> bool {
    #[cfg(feature = "logging-json")]
    {
        builder().json().init()
    }
    #[cfg(not(feature = "logging-json"))]
    {
        builder().pretty().init()
    }
}

/// Resolver events only, at `TRACE`.
#[cfg(feature = "logging")]
pub fn init_resolver_trace() -> bool {
    builder().resolver_only().trace().with_thread_ids().init()
}

#[cfg(all(test, feature = "logging"))]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Json);
        assert!(builder.target.is_none());
        assert_eq!(builder.directive(), "debug");
    }

    #[test]
    fn test_resolver_only_directive() {
        let builder = builder().trace().compact().with_thread_ids().resolver_only();

        assert_eq!(builder.format, LogFormat::Compact);
        assert!(builder.with_thread_ids);
        assert_eq!(builder.directive(), "dependency_resolver=trace");
    }
}
