//! # Replies
//!
//! A reply settles a forwarded command or query. At most one reply is ever
//! accepted per originating id; later replies for an already-settled id are
//! discarded as stale.

use crate::id::MessageId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal outcome of a command or query.
///
/// On the wire this is `{status: "success", value}` or
/// `{status: "failure", error}`. Failure descriptions are human-readable and
/// deliberately indistinguishable in shape whether the failure originated
/// locally or remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// The handler completed. `value` is `Null` for void commands.
    Success {
        /// The handler's result.
        value: Value,
    },
    /// The handler, the dispatch, or the bridge itself failed.
    Failure {
        /// Human-readable error description.
        error: String,
    },
}

impl Outcome {
    /// A success carrying a value.
    #[must_use]
    pub fn success(value: Value) -> Self {
        Self::Success { value }
    }

    /// A success carrying no value (void command).
    #[must_use]
    pub fn void() -> Self {
        Self::Success { value: Value::Null }
    }

    /// A failure with a human-readable description.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Whether this outcome is a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The failure description, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure { error } => Some(error),
            Self::Success { .. } => None,
        }
    }
}

/// Reply correlated to a request by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// The originating request's id.
    pub in_reply_to: MessageId,
    /// How the request ended.
    pub outcome: Outcome,
}

impl Reply {
    /// A success reply for `id`.
    #[must_use]
    pub fn success(id: MessageId, value: Value) -> Self {
        Self {
            in_reply_to: id,
            outcome: Outcome::success(value),
        }
    }

    /// A failure reply for `id`.
    pub fn failure(id: MessageId, error: impl Into<String>) -> Self {
        Self {
            in_reply_to: id,
            outcome: Outcome::failure(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_wire_shape() {
        let outcome = Outcome::success(json!({"orderId": "o1"}));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["value"]["orderId"], "o1");
    }

    #[test]
    fn test_failure_wire_shape() {
        let outcome = Outcome::failure("handler not found for GetOrder");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["error"], "handler not found for GetOrder");
    }

    #[test]
    fn test_void_is_null_success() {
        let outcome = Outcome::void();
        assert!(outcome.is_success());
        assert_eq!(serde_json::to_value(&outcome).unwrap()["value"], json!(null));
    }

    #[test]
    fn test_reply_wire_field_names() {
        let reply = Reply::success(MessageId::new(), json!(1));
        let value = serde_json::to_value(&reply).unwrap();
        assert!(value["inReplyTo"].is_string());
        assert_eq!(value["outcome"]["status"], "success");
    }
}
