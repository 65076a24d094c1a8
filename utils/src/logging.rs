// Category-based logging infrastructure
//
// This will be used from multiple threads, so it needs
// to be stateless. The only shared state is the level limit,
// which is read once from the environment.
//
// Austin Shafer - 2020
use std::env;

#[allow(dead_code, non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    // in order of highest priority
    critical, // Urgent and must always be displayed
    error,
    debug,     // debugging related, not verbose
    info,      // more verbose
    profiling, // profiling related timing
}

/// The environment variable holding the log level limit
pub const LOG_LEVEL_ENV: &str = "CASTLE_LOG";

lazy_static! {
    static ref LEVEL_LIMIT: u32 = env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|val| LogLevel::from_name(&val))
        .unwrap_or(LogLevel::debug)
        .get_level();
}

impl LogLevel {
    pub fn get_name(&self) -> &'static str {
        match self {
            LogLevel::critical => "critical",
            LogLevel::error => "error",
            LogLevel::debug => "debug",
            LogLevel::info => "info",
            LogLevel::profiling => "profiling",
        }
    }

    pub fn get_level(&self) -> u32 {
        match self {
            LogLevel::critical => 0,
            LogLevel::error => 1,
            LogLevel::debug => 2,
            LogLevel::info => 3,
            LogLevel::profiling => 4,
        }
    }

    /// Parse a level from either its name or its numeric level
    pub fn from_name(name: &str) -> Option<LogLevel> {
        let name = name.trim();
        let level = match name.to_ascii_lowercase().as_str() {
            "critical" | "0" => LogLevel::critical,
            "error" | "1" => LogLevel::error,
            "debug" | "2" => LogLevel::debug,
            "info" | "3" => LogLevel::info,
            "profiling" | "4" => LogLevel::profiling,
            _ => return None,
        };
        Some(level)
    }

    /// Should messages of this level be printed
    pub fn is_enabled(&self) -> bool {
        self.get_level() <= *LEVEL_LIMIT
    }
}

#[macro_export]
macro_rules! log_internal {
    ($loglevel:expr, $($format_args:tt)+) => ({
        let level: $crate::logging::LogLevel = $loglevel;
        if level.is_enabled() {
            println!("[{:?}]<{}> {}:{} - {}",
                     $crate::timing::get_current_millis(),
                     level.get_name(),
                     file!(),
                     line!(),
                     format!($($format_args)+)
            );
        }
    })
}

#[macro_export]
macro_rules! critical {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::critical, $($format_args)+)
    })
}

#[macro_export]
macro_rules! error {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::error, $($format_args)+)
    })
}

#[macro_export]
macro_rules! debug {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::debug, $($format_args)+)
    })
}

#[macro_export]
macro_rules! info {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::info, $($format_args)+)
    })
}

#[macro_export]
macro_rules! profiling {
    ($($format_args:tt)+) => ({
        $crate::log_internal!($crate::logging::LogLevel::profiling, $($format_args)+)
    })
}
