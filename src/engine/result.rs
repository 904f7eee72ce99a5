//! Outcome of a single transfer.

/// Stable numeric engine error codes.
///
/// The numbering mirrors the taxonomy of the underlying transfer library so
/// long-time callers can keep matching on the codes they already know.
pub mod code {
    pub const UNSUPPORTED_PROTOCOL: i32 = 1;
    pub const URL_MALFORMAT: i32 = 3;
    pub const COULDNT_RESOLVE_PROXY: i32 = 5;
    pub const COULDNT_RESOLVE_HOST: i32 = 6;
    pub const COULDNT_CONNECT: i32 = 7;
    pub const HTTP_RETURNED_ERROR: i32 = 22;
    pub const WRITE_ERROR: i32 = 23;
    pub const READ_ERROR: i32 = 26;
    pub const OPERATION_TIMEDOUT: i32 = 28;
    pub const SSL_CONNECT_ERROR: i32 = 35;
    pub const INTERFACE_FAILED: i32 = 45;
    pub const TOO_MANY_REDIRECTS: i32 = 47;
    pub const RECV_ERROR: i32 = 56;
}

/// Error descriptor reported by the engine for a failed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub code: i32,
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transfer error #{}: {}", self.code, self.message)
    }
}

impl std::error::Error for EngineError {}

/// Everything one synchronous transfer produced.
///
/// `error` is populated only on failure; `header_text` only when header
/// inclusion was requested; `body` only when the transfer buffered a body
/// (a streamed download leaves it empty).
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult {
    pub body: Option<Vec<u8>>,
    pub header_text: Option<String>,
    pub status: u16,
    pub effective_url: String,
    pub error: Option<EngineError>,
}

impl TransferResult {
    /// Result of a transfer that failed before any response arrived.
    pub fn failure(effective_url: String, error: EngineError) -> Self {
        Self {
            body: None,
            header_text: None,
            status: 0,
            effective_url,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let error = EngineError::new(code::COULDNT_CONNECT, "connection refused");
        assert_eq!(error.to_string(), "transfer error #7: connection refused");
    }

    #[test]
    fn test_failure_result_has_no_body_or_status() {
        let result = TransferResult::failure(
            "http://example.test/".to_string(),
            EngineError::new(code::OPERATION_TIMEDOUT, "timed out"),
        );
        assert_eq!(result.status, 0);
        assert!(result.body.is_none());
        assert_eq!(result.error.as_ref().map(|e| e.code), Some(28));
    }
}
