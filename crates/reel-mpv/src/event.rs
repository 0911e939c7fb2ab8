//! Engine event vocabulary.

use std::fmt;

/// Value carried by a property change.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Property is unavailable (e.g. `duration` before a file is open).
    None,
    Flag(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(v) => Some(*v),
            PropertyValue::Text(s) => match s.as_str() {
                "yes" => Some(true),
                "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            PropertyValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::None => f.write_str("<none>"),
            PropertyValue::Flag(v) => f.write_str(if *v { "yes" } else { "no" }),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

/// Native representation a property is observed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyFormat {
    Flag,
    Int,
    Double,
    Text,
}

impl PropertyFormat {
    /// Format used for the properties the player observes by default;
    /// anything else is observed as text.
    pub fn for_property(name: &str) -> Self {
        match name {
            "pause" | "paused-for-cache" | "eof-reached" | "idle-active" | "seeking" | "mute" => {
                PropertyFormat::Flag
            }
            "time-pos" | "duration" | "percent-pos" | "speed" | "volume" | "demuxer-cache-duration" => {
                PropertyFormat::Double
            }
            "width" | "height" | "playlist-pos" => PropertyFormat::Int,
            _ => PropertyFormat::Text,
        }
    }
}

/// Why a file stopped playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Eof,
    Stop,
    Quit,
    Error,
    Redirect,
    Unknown(i32),
}

impl EndReason {
    pub fn from_raw(reason: i32) -> Self {
        match reason {
            0 => EndReason::Eof,
            2 => EndReason::Stop,
            3 => EndReason::Quit,
            4 => EndReason::Error,
            5 => EndReason::Redirect,
            other => EndReason::Unknown(other),
        }
    }
}

/// Severity of a forwarded engine log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_raw(level: i32) -> Self {
        match level {
            ..=10 => LogLevel::Fatal,
            11..=20 => LogLevel::Error,
            21..=30 => LogLevel::Warn,
            31..=40 => LogLevel::Info,
            41..=50 => LogLevel::Verbose,
            51..=60 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn to_log(self) -> log::Level {
        match self {
            LogLevel::Fatal | LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Verbose | LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// An event drained from the engine's event queue.
///
/// `error` fields carry the engine's human-readable message for negative
/// status codes and are `None` on success.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Shutdown,
    Log {
        prefix: String,
        level: LogLevel,
        text: String,
    },
    CommandReply {
        id: u64,
        error: Option<String>,
    },
    SetPropertyReply {
        id: u64,
        error: Option<String>,
    },
    StartFile,
    FileLoaded,
    EndFile {
        reason: EndReason,
        error: Option<String>,
    },
    VideoReconfig,
    AudioReconfig,
    Seek,
    PlaybackRestart,
    PropertyChange {
        id: u64,
        name: String,
        value: PropertyValue,
    },
    QueueOverflow,
}
