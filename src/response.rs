//! Read-only outcome of one builder-driven transfer.

use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::io::Write;

use crate::engine::{EngineError, TransferEngine, TransferOptions, TransferResult};
use crate::error::Error;

/// Value object produced by a [`Request`](crate::request::Request) action.
///
/// The transfer happens exactly once, while the response is produced; from
/// then on the response is read-only. Transport failures never panic and are
/// never raised at the action boundary; inspect [`Response::error`] or
/// [`Response::is_success`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    result: TransferResult,
}

impl Response {
    pub(crate) fn perform<E: TransferEngine + ?Sized>(
        engine: &E,
        options: &TransferOptions,
    ) -> Self {
        Self::from_result(engine.perform(options))
    }

    pub(crate) fn perform_into<E: TransferEngine + ?Sized>(
        engine: &E,
        options: &TransferOptions,
        sink: &mut dyn Write,
    ) -> Self {
        Self::from_result(engine.perform_into(options, sink))
    }

    fn from_result(result: TransferResult) -> Self {
        Self { result }
    }

    /// HTTP status code of the transfer, `0` when no response arrived.
    pub fn status(&self) -> u16 {
        self.result.status
    }

    /// Final URL reached after following any redirects.
    pub fn effective_url(&self) -> &str {
        &self.result.effective_url
    }

    /// Raw response body, when one was buffered.
    pub fn body(&self) -> Option<&[u8]> {
        self.result.body.as_deref()
    }

    /// Lossy UTF-8 view of the body.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        self.result.body.as_deref().map(String::from_utf8_lossy)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self
            .result
            .body
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("response captured no body".to_string()))?;
        serde_json::from_slice(body).map_err(Error::Decode)
    }

    /// Raw response header text, when header inclusion was requested.
    pub fn raw_headers(&self) -> Option<&str> {
        self.result.header_text.as_deref()
    }

    /// Engine error descriptor of a failed transfer.
    pub fn error(&self) -> Option<&EngineError> {
        self.result.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.result.error.is_none()
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{code, EngineError};
    use crate::test_utils::ok_result;

    #[test]
    fn test_accessors_reflect_the_result() {
        let response = Response::from_result(ok_result("OK", 200, "http://example.test/done"));
        assert_eq!(response.status(), 200);
        assert_eq!(response.effective_url(), "http://example.test/done");
        assert_eq!(response.body(), Some(b"OK".as_ref()));
        assert_eq!(response.text().as_deref(), Some("OK"));
        assert!(response.is_success());
        assert!(response.error().is_none());
        assert_eq!(response.to_string(), "OK");
    }

    #[test]
    fn test_failed_transfer_is_inspectable_not_fatal() {
        let response = Response::from_result(TransferResult::failure(
            "http://example.test/".to_string(),
            EngineError::new(code::COULDNT_CONNECT, "connection refused"),
        ));
        assert!(!response.is_success());
        assert_eq!(response.error().map(|e| e.code), Some(code::COULDNT_CONNECT));
        assert!(response.body().is_none());
        assert_eq!(response.to_string(), "");
    }

    #[test]
    fn test_json_deserializes_the_body() {
        #[derive(serde::Deserialize)]
        struct Login {
            user: String,
            admin: bool,
        }

        let response = Response::from_result(ok_result(
            r#"{"user": "pera", "admin": false}"#,
            200,
            "http://example.test/",
        ));
        let login: Login = response.json().unwrap();
        assert_eq!(login.user, "pera");
        assert!(!login.admin);
    }

    #[test]
    fn test_json_on_malformed_body_is_a_decode_error() {
        let response = Response::from_result(ok_result("not json", 200, "http://example.test/"));
        let error = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(error, Error::Decode(_)));
    }

    #[test]
    fn test_json_without_body_is_an_argument_error() {
        let mut result = ok_result("", 200, "http://example.test/");
        result.body = None;
        let response = Response::from_result(result);
        let error = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }
}
