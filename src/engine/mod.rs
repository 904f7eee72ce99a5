//! The transfer engine seam.
//!
//! Everything that actually touches the network sits behind the
//! [`TransferEngine`] trait: the wrappers assemble an option table, the engine
//! performs exactly one synchronous transfer and reports a [`TransferResult`].
//! The shipped implementation is [`HttpEngine`]; tests substitute a mock to
//! exercise option assembly and payload handling without network access.
//!
//! # Structure
//!
//! - `options` - option table, keys, and the engine-facing payload model
//! - `result` - transfer outcome and error codes
//! - `http` - the shipped engine on top of a blocking HTTP client
//! - `cookies` - plain-text cookie jar persistence

mod cookies;
mod http;
mod options;
mod result;

pub use http::HttpEngine;
pub use options::{FieldValue, Method, OptionKey, OptionValue, PostPayload, TransferOptions};
pub use result::{code, EngineError, TransferResult};

use std::io::Write;

/// Capability interface of the external transfer engine.
///
/// Both methods block the calling thread for the duration of the transfer and
/// never panic on transport failure; the outcome, including any error, is
/// carried in the returned [`TransferResult`].
#[cfg_attr(test, mockall::automock)]
pub trait TransferEngine: Send + Sync {
    /// Performs one transfer, buffering the body when the options ask for it.
    fn perform(&self, options: &TransferOptions) -> TransferResult;

    /// Performs one transfer, streaming the response body into `sink` instead
    /// of buffering it. The sink is never closed by the engine.
    fn perform_into(&self, options: &TransferOptions, sink: &mut dyn Write) -> TransferResult;
}
