use std::fmt::Display;
use std::str::FromStr;

/// Severity of a message; `Display` yields the matching tracing filter directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let directive = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(directive)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Emit a message through the tracing subscriber installed by the binary
pub fn log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Trace => tracing::trace!(target: "acustack", "{}", message),
        LogLevel::Debug => tracing::debug!(target: "acustack", "{}", message),
        LogLevel::Info => tracing::info!(target: "acustack", "{}", message),
        LogLevel::Warning => tracing::warn!(target: "acustack", "{}", message),
        LogLevel::Error => tracing::error!(target: "acustack", "{}", message),
    }
}

/// Log debug level message
pub fn debug(message: &str) {
    log(LogLevel::Debug, message);
}

/// Log info level message
pub fn info(message: &str) {
    log(LogLevel::Info, message);
}

/// Log warning level message
pub fn warn(message: &str) {
    log(LogLevel::Warning, message);
}

/// Log error level message
pub fn error(message: &str) {
    log(LogLevel::Error, message);
}

/// Map a level name from the environment to a filter directive, defaulting to info
pub fn filter_directive(level: &str) -> String {
    level.parse::<LogLevel>().unwrap_or(LogLevel::Info).to_string()
}
