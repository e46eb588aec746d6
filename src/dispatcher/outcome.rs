//! Classified result of one submission attempt.

/// Body excerpts longer than this many characters are truncated.
pub const EXCERPT_CHARS: usize = 120;
/// Appended to a truncated excerpt.
pub const TRUNCATION_MARKER: char = '…';

/// What happened to one identifier.
///
/// Outcomes are logged and dropped; nothing retains them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx response; `message` holds the reply's `message` field when the
    /// body was JSON carrying one.
    Delivered { message: Option<String> },
    /// Non-2xx response with a body excerpt or the reason phrase.
    Rejected { status: u16, excerpt: String },
    /// No response within the request timeout.
    NetworkTimeout { detail: String },
    /// The endpoint refused or dropped the connection, or could not be resolved.
    NetworkUnreachable { detail: String },
    /// The serial link failed while waiting for a line.
    SerialFailure { detail: String },
    UnknownFailure { detail: String },
}

impl Outcome {
    /// Stable tag identifying the outcome category in log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Rejected { .. } => "rejected",
            Self::NetworkTimeout { .. } => "network-timeout",
            Self::NetworkUnreachable { .. } => "network-unreachable",
            Self::SerialFailure { .. } => "serial-failure",
            Self::UnknownFailure { .. } => "unknown-failure",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// First [`EXCERPT_CHARS`] characters of `body`, or `reason` when the body
/// is empty.
pub fn body_excerpt(body: &str, reason: &str) -> String {
    if body.is_empty() {
        return reason.to_owned();
    }
    match body.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &body[..cut]),
        None => body.to_owned(),
    }
}
