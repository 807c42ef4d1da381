//! Resolution errors.
//!
//! An absent key is not an error: it resolves to `Ok(None)` and the field is simply null.
use displaydoc::Display;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::graphql;
use crate::graphql::Object;
use crate::graphql::Path;
use crate::model::KeySpace;

/// Errors delivered to the waiters of a key.
///
/// Every waiter of a failed batch window receives a clone of the same error, so errors must
/// stay cheap to clone and comparable.
#[derive(Error, Display, Debug, Clone, Serialize, Eq, PartialEq)]
#[serde(untagged)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum FetchError {
    /// backend call for '{key_space}' failed: {reason}
    ///
    /// note that this covers transport failures, timeouts and non-success statuses
    BackendFailure {
        /// The key-space whose round trip failed.
        key_space: KeySpace,

        /// The HTTP status returned by the backend, if any.
        status_code: Option<u16>,

        /// The reason the call failed.
        reason: String,
    },

    /// backend response for '{key_space}' was malformed: {reason}
    MalformedResponse {
        /// The key-space whose response could not be decoded.
        key_space: KeySpace,

        /// The reason decoding failed.
        reason: String,
    },

    /// request was cancelled before '{key_space}' could be resolved
    Cancelled {
        /// The key-space the abandoned lookup belonged to.
        key_space: KeySpace,
    },
}

impl FetchError {
    pub(crate) fn backend(key_space: KeySpace, reason: impl ToString) -> Self {
        FetchError::BackendFailure {
            key_space,
            status_code: None,
            reason: reason.to_string(),
        }
    }

    pub fn key_space(&self) -> KeySpace {
        match self {
            FetchError::BackendFailure { key_space, .. }
            | FetchError::MalformedResponse { key_space, .. }
            | FetchError::Cancelled { key_space } => *key_space,
        }
    }

    /// Whether the request was abandoned rather than the backend misbehaving.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }

    pub fn extension_code(&self) -> &'static str {
        match self {
            FetchError::BackendFailure { .. } => "BACKEND_FAILURE",
            FetchError::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            FetchError::Cancelled { .. } => "REQUEST_CANCELLED",
        }
    }

    /// Convert the fetch error to the GraphQL error reported next to the nulled field.
    pub fn to_graphql_error(&self, path: Option<Path>) -> graphql::Error {
        let mut extensions = Object::new();
        extensions.insert("code".to_string(), self.extension_code().into());
        if let FetchError::BackendFailure {
            status_code: Some(status_code),
            ..
        } = self
        {
            extensions.insert("http".to_string(), json!({ "status": status_code }));
        }
        extensions.insert("keySpace".to_string(), self.key_space().as_str().into());

        graphql::Error {
            message: self.to_string(),
            path,
            extensions,
        }
    }
}
