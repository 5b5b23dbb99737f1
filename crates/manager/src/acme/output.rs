//! Classification of ACME client output
//!
//! The client reports progress as `LEVEL: message` lines. Output is parsed
//! once into a typed event sequence and retry decisions dispatch on that.

use once_cell::sync::Lazy;
use regex::Regex;

/// Error text the CA returns when a request raced a stale nonce
pub const NONCE_ERROR: &str = "invalid anti-replay nonce";

static MESSAGE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?P<level>[A-Za-z]+):(?:[ \t]+(?P<msg>[^\r\n]*?))?[ \t]*\r?$")
        .expect("message line pattern is valid")
});

/// One classified line of client output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Info(String),
    Debug(String),
    Error { message: String },
    Unknown { level: String, raw: String },
}

impl ClientEvent {
    fn classify(level: &str, message: &str, raw: &str) -> Self {
        match level.to_ascii_lowercase().as_str() {
            "info" => Self::Info(message.to_string()),
            "debug" => Self::Debug(message.to_string()),
            "error" => Self::Error {
                message: message.to_string(),
            },
            _ => Self::Unknown {
                level: level.to_string(),
                raw: raw.trim().to_string(),
            },
        }
    }

    /// Whether this is an error reporting a stale anti-replay nonce
    pub fn is_nonce_error(&self) -> bool {
        matches!(self, Self::Error { message } if message.contains(NONCE_ERROR))
    }
}

/// Classify every `LEVEL: message` line of `stdout` followed by `stderr`
pub fn classify_output(stdout: &str, stderr: &str) -> Vec<ClientEvent> {
    [stdout, stderr]
        .into_iter()
        .flat_map(|text| MESSAGE_LINE.captures_iter(text))
        .map(|caps| {
            let level = caps.name("level").map_or("", |m| m.as_str());
            let message = caps.name("msg").map_or("", |m| m.as_str());
            let raw = caps.get(0).map_or("", |m| m.as_str());
            ClientEvent::classify(level, message, raw)
        })
        .collect()
}
