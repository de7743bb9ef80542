//! Reply envelope handed to the remote-call layer.
//!
//! Every service outcome becomes a [`Reply`]: expected conditions such as a
//! duplicate or a missing record carry their own [`ErrorCode`] rather than a
//! generic failure.

use devmgr_core::{ErrorCode, ManagerResult};
use serde::{Deserialize, Serialize};

fn default_message(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Ok => "ok",
        ErrorCode::DuplicateEntity => "Entity already exists",
        ErrorCode::NotFound => "Entity not found",
        ErrorCode::AmbiguousResult => "Lookup matched more than one entity",
        ErrorCode::StoreUnavailable => "Record store unavailable",
        ErrorCode::CacheUnavailable => "Cache unavailable",
        ErrorCode::WriteUnconfirmed => "Write committed but could not be confirmed",
        ErrorCode::Internal => "Internal error",
    }
}

/// Success flag, failure code, message and optional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply<T> {
    pub ok: bool,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            code: ErrorCode::Ok,
            message: default_message(ErrorCode::Ok).to_string(),
            data: Some(data),
        }
    }

    pub fn fail(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Failure with the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::fail(code, default_message(code))
    }

    /// Wrap a service result; errors keep their code and message.
    pub fn from_result(result: ManagerResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(error = %e, "retryable failure");
                }
                Self::fail(e.code(), e.to_string())
            }
        }
    }

    /// Wrap a lookup or mutation result; an absent value is `NotFound`.
    pub fn from_option(result: ManagerResult<Option<T>>) -> Self {
        match result {
            Ok(Some(data)) => Self::ok(data),
            Ok(None) => Self::from_code(ErrorCode::NotFound),
            Err(e) => Self::from_result(Err(e)),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }
}

impl Reply<bool> {
    /// Wrap a rows-affected flag; `false` means nothing matched.
    pub fn from_flag(result: ManagerResult<bool>) -> Self {
        match result {
            Ok(true) => Self::ok(true),
            Ok(false) => Self::from_code(ErrorCode::NotFound),
            Err(e) => Self::from_result(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devmgr_core::{ManagerError, NaturalKey, StoreError};

    #[test]
    fn test_absent_value_is_not_found() {
        let reply: Reply<u32> = Reply::from_option(Ok(None));
        assert!(!reply.is_ok());
        assert_eq!(reply.code, ErrorCode::NotFound);
        assert_eq!(reply.data, None);
    }

    #[test]
    fn test_errors_keep_their_code() {
        let reply: Reply<u32> = Reply::from_option(Err(ManagerError::DuplicateEntity {
            key: NaturalKey::new("temp", 5),
        }));
        assert_eq!(reply.code, ErrorCode::DuplicateEntity);
        assert!(reply.message.contains("5:temp"));

        let reply = Reply::from_flag(Err(ManagerError::Store(StoreError::Unavailable {
            reason: "timeout".to_string(),
        })));
        assert_eq!(reply.code, ErrorCode::StoreUnavailable);
    }

    #[test]
    fn test_flag_replies() {
        assert_eq!(Reply::from_flag(Ok(true)), Reply::ok(true));
        assert_eq!(Reply::from_flag(Ok(false)).code, ErrorCode::NotFound);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(Reply::ok(3)).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["code"], "OK");
        assert_eq!(json["data"], 3);

        let json = serde_json::to_value(Reply::<u32>::from_code(ErrorCode::NotFound)).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert!(json.get("data").is_none());
    }
}
