//! Error Taxonomy & Messaging. Classification operates on message *text*,
//! not on local error enum variants, the same substring-matching idiom
//! used elsewhere in this crate for error-reason parsing rather than on
//! the typed `OrchestratorError`.

use crate::platform::Platform;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Fatal,
    Transient,
    Unknown,
}

const FATAL_MARKERS: [&str; 6] = [
    "unauthorized",
    "forbidden",
    "invalid token",
    "authentication failed",
    "permission denied",
    "401",
];
const FATAL_MARKER_FORBIDDEN_CODE: &str = "403";

const TRANSIENT_MARKERS: [&str; 10] = [
    "timeout",
    "econnrefused",
    "econnreset",
    "etimedout",
    "rate limit",
    "too many requests",
    "429",
    "503",
    "502",
    "network error",
];
const TRANSIENT_MARKER_SOCKET: &str = "socket hang up";

pub fn classify(message: &str) -> ErrorClass {
    let lowered = message.to_lowercase();
    if FATAL_MARKERS.iter().any(|marker| lowered.contains(marker))
        || lowered.contains(FATAL_MARKER_FORBIDDEN_CODE)
    {
        return ErrorClass::Fatal;
    }
    if TRANSIENT_MARKERS.iter().any(|marker| lowered.contains(marker))
        || lowered.contains(TRANSIENT_MARKER_SOCKET)
    {
        return ErrorClass::Transient;
    }
    ErrorClass::Unknown
}

/// A short user-visible remediation hint derived from the classification.
pub fn failure_hint(message: &str) -> Option<&'static str> {
    let lowered = message.to_lowercase();
    if lowered.contains("rate limit") || lowered.contains("429") || lowered.contains("too many requests") {
        return Some("wait and retry");
    }
    if lowered.contains("401") || lowered.contains("authentication failed") || lowered.contains("invalid token") {
        return Some("check API key");
    }
    if lowered.contains("403") || lowered.contains("forbidden") {
        return Some("check API access");
    }
    if lowered.contains("timeout")
        || lowered.contains("network error")
        || lowered.contains("econnrefused")
        || lowered.contains("econnreset")
        || lowered.contains("etimedout")
        || lowered.contains("socket hang up")
    {
        return Some("try again");
    }
    None
}

#[derive(Debug, thiserror::Error)]
#[error("fatal delivery failure ({context}): {message}")]
pub struct FatalDeliveryError {
    pub context: String,
    pub message: String,
}

/// Best-effort delivery: one attempt, suppresses transient/unknown
/// failures (caller counts the drop), rethrows on FATAL.
pub fn safe_send_message(
    platform: &dyn Platform,
    conversation_id: &str,
    text: &str,
    context: &str,
) -> Result<bool, FatalDeliveryError> {
    match platform.send_message(conversation_id, text) {
        Ok(()) => Ok(true),
        Err(err) => {
            let message = err.to_string();
            let class = classify(&message);
            tracing::warn!(conversation_id, context, error = %message, "best-effort message delivery failed");
            if class == ErrorClass::Fatal {
                return Err(FatalDeliveryError {
                    context: context.to_string(),
                    message: format!("authentication/permission problem: {message}"),
                });
            }
            Ok(false)
        }
    }
}

/// At-most-`max_retries` delivery with `1s * attempt` linear backoff;
/// aborts early on FATAL; never throws — logs a CRITICAL record and
/// returns false if every attempt fails.
pub fn send_critical_message(
    platform: &dyn Platform,
    conversation_id: &str,
    text: &str,
    context: &str,
    max_retries: u32,
) -> bool {
    send_critical_message_with_sleeper(platform, conversation_id, text, context, max_retries, |d| {
        std::thread::sleep(d)
    })
}

pub fn send_critical_message_with_sleeper(
    platform: &dyn Platform,
    conversation_id: &str,
    text: &str,
    context: &str,
    max_retries: u32,
    sleep: impl Fn(Duration),
) -> bool {
    for attempt in 1..=max_retries.max(1) {
        match platform.send_message(conversation_id, text) {
            Ok(()) => return true,
            Err(err) => {
                let message = err.to_string();
                let class = classify(&message);
                tracing::warn!(conversation_id, context, attempt, error = %message, "critical message delivery attempt failed");
                if class == ErrorClass::Fatal {
                    break;
                }
                if attempt < max_retries {
                    sleep(Duration::from_secs(attempt as u64));
                }
            }
        }
    }
    tracing::error!(conversation_id, context, text, "CRITICAL: undelivered message after exhausting retries");
    false
}
