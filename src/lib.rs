pub mod client;
pub mod download;
pub mod engine;
pub mod error;
pub mod request;
pub mod response;

pub use client::TransferClient;
pub use download::FileMode;
pub use engine::{HttpEngine, TransferEngine};
pub use error::Error;
pub use request::{PostData, PostField, Request};
pub use response::Response;

/// Scripted transfer outcomes shared by the unit tests.
#[cfg(test)]
pub mod test_utils {
    use crate::engine::{EngineError, TransferResult};

    /// Successful transfer with a buffered body.
    pub fn ok_result(body: &str, status: u16, effective_url: &str) -> TransferResult {
        TransferResult {
            body: Some(body.as_bytes().to_vec()),
            header_text: None,
            status,
            effective_url: effective_url.to_string(),
            error: None,
        }
    }

    /// Successful transfer whose body went to a sink instead of a buffer.
    pub fn streamed_result(status: u16, effective_url: &str) -> TransferResult {
        TransferResult {
            body: None,
            header_text: None,
            status,
            effective_url: effective_url.to_string(),
            error: None,
        }
    }

    /// Transfer that failed before any response arrived.
    pub fn failed_result(code: i32, message: &str) -> TransferResult {
        TransferResult::failure(String::new(), EngineError::new(code, message))
    }
}
