//! Command result envelope
//!
//! Every session command resolves to a `CommandResult` instead of an
//! error: the HTTP layer serializes it as-is and only picks a status
//! code. A failed command always carries `error`; `data` is flattened
//! into the envelope so the wire shape stays `{success, messages: [..]}`
//! rather than nesting under a `data` key.

use serde::Serialize;

use crate::Error;

/// Outcome of a session command
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult<T = ()> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> CommandResult<T> {
    /// Successful result carrying a payload
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            error: None,
            data: Some(data),
        }
    }

    /// Successful result with an operator-facing message and no payload
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            data: None,
        }
    }

    /// Failed result; `error` is always set
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            data: None,
        }
    }

    /// Failed result from a core error
    pub fn from_error(error: &Error) -> Self {
        Self::fail(error.to_string())
    }
}

/// Authentication status report
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
}

/// One message shaped for an API response.
///
/// `from` is present for single-contact queries ("Me" or the peer id) and
/// omitted in per-contact breakdowns, matching the two response shapes.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedMessage {
    /// 1-based position within the returned window
    pub id: usize,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub body: String,
}

/// Day messages of a single contact
#[derive(Debug, Clone, Serialize)]
pub struct MessagesPayload {
    pub messages: Vec<FormattedMessage>,
}

/// Unique senders seen since the day boundary
#[derive(Debug, Clone, Serialize)]
pub struct SendersPayload {
    pub senders: Vec<String>,
}

/// Day messages grouped per contact
#[derive(Debug, Clone, Serialize)]
pub struct ContactsPayload {
    pub contacts: Vec<ContactHistory>,
}

/// Messages exchanged with one contact
#[derive(Debug, Clone, Serialize)]
pub struct ContactHistory {
    pub from: String,
    pub messages: Vec<FormattedMessage>,
}

/// Payload of a day query, one variant per scope
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryPayload {
    Messages(MessagesPayload),
    Senders(SendersPayload),
    Contacts(ContactsPayload),
}
