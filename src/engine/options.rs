//! Transfer option table and payload model.
//!
//! Engine options are identified by a closed [`OptionKey`] enumeration rather
//! than raw numeric constants, so the public contract stays independent of any
//! concrete transfer library. Writing a key twice overwrites the earlier
//! value; no key ever holds two option meanings at once.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifier of a single engine-level transfer option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    /// Target URL of the transfer.
    Url,
    /// HTTP method selector.
    Method,
    /// POST field payload.
    PostFields,
    /// Return the response body to the caller's buffer.
    ReturnBody,
    /// Treat an HTTP status of 300 or above as a transfer failure.
    FailOnStatus,
    /// Follow redirect responses to their target.
    FollowRedirects,
    /// Content encodings to request (and transparently decode).
    AcceptEncoding,
    /// Verify the TLS peer certificate.
    VerifyTlsPeer,
    /// Basic-auth credentials in `user:pass` form.
    Credentials,
    /// Referer string sent with the request.
    Referer,
    /// User-agent string sent with the request.
    UserAgent,
    /// Include the raw response header text in the result.
    IncludeHeaders,
    /// Custom request headers as raw `Name: value` lines.
    HeaderList,
    /// Proxy URL to route the transfer through.
    Proxy,
    /// File the cookie state is written to after the transfer.
    CookieJar,
    /// File cookies are read from before the transfer.
    CookieFile,
    /// Raw cookie string sent with the request.
    Cookie,
    /// Local IP address to bind the outgoing connection to.
    Interface,
    /// Overall transfer timeout in seconds.
    TimeoutSecs,
}

/// Value stored under an [`OptionKey`].
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag(bool),
    Number(u64),
    Text(String),
    TextList(Vec<String>),
    Method(Method),
    Payload(PostPayload),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::TextList(value)
    }
}

impl From<Method> for OptionValue {
    fn from(value: Method) -> Self {
        OptionValue::Method(value)
    }
}

impl From<PostPayload> for OptionValue {
    fn from(value: PostPayload) -> Self {
        OptionValue::Payload(value)
    }
}

/// HTTP method selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Payload of a POST transfer as the engine sees it.
///
/// Nested structures never reach the engine; the builders flatten them into a
/// single URL-encoded string first. Discrete fields may carry file-upload
/// markers, which the engine streams as multipart attachments.
#[derive(Debug, Clone, PartialEq)]
pub enum PostPayload {
    /// A pre-serialized body, sent URL-encoded.
    Raw(String),
    /// Discrete named fields, submitted field-wise.
    Fields(Vec<(String, FieldValue)>),
}

/// One discrete POST field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// File-upload marker: the local file to stream as an attachment.
    File(PathBuf),
}

/// Ordered option table configuring one transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferOptions {
    entries: BTreeMap<OptionKey, OptionValue>,
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The hardening defaults both client styles apply before their own
    /// configuration: fail on an error status, follow redirects, request
    /// compressed encodings, skip TLS peer verification.
    pub fn hardened() -> Self {
        let mut options = Self::new();
        options.set(OptionKey::FailOnStatus, true);
        options.set(OptionKey::FollowRedirects, true);
        options.set(OptionKey::AcceptEncoding, "gzip, deflate");
        options.set(OptionKey::VerifyTlsPeer, false);
        options
    }

    /// Sets `key` to `value`, overwriting any earlier value for that key.
    pub fn set(&mut self, key: OptionKey, value: impl Into<OptionValue>) {
        self.entries.insert(key, value.into());
    }

    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.entries.get(&key)
    }

    pub fn remove(&mut self, key: OptionKey) -> Option<OptionValue> {
        self.entries.remove(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &OptionValue)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn text(&self, key: OptionKey) -> Option<&str> {
        match self.entries.get(&key) {
            Some(OptionValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn text_list(&self, key: OptionKey) -> Option<&[String]> {
        match self.entries.get(&key) {
            Some(OptionValue::TextList(values)) => Some(values),
            _ => None,
        }
    }

    pub fn flag(&self, key: OptionKey) -> Option<bool> {
        match self.entries.get(&key) {
            Some(OptionValue::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    /// True when `key` is present and set to a true flag.
    pub fn is_on(&self, key: OptionKey) -> bool {
        self.flag(key).unwrap_or(false)
    }

    pub fn number(&self, key: OptionKey) -> Option<u64> {
        match self.entries.get(&key) {
            Some(OptionValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<Method> {
        match self.entries.get(&OptionKey::Method) {
            Some(OptionValue::Method(method)) => Some(*method),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&PostPayload> {
        match self.entries.get(&OptionKey::PostFields) {
            Some(OptionValue::Payload(payload)) => Some(payload),
            _ => None,
        }
    }
}
