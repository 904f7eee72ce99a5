//! Fluent request builder.
//!
//! A [`Request`] accumulates an option table and a header collection without
//! touching any live transfer state. Each action method finalizes a private
//! copy of the options, performs exactly one transfer on the engine, and
//! returns a [`Response`]; the builder itself stays reusable and is never
//! partially mutated by an action.

mod headers;
pub(crate) mod payload;

pub use headers::HeaderBag;
pub use payload::{PostData, PostField};

use log::debug;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::download::{self, FileMode};
use crate::engine::{
    FieldValue, HttpEngine, Method, OptionKey, OptionValue, PostPayload, TransferEngine,
    TransferOptions,
};
use crate::error::Error;
use crate::response::Response;

/// Default transfer timeout applied to every new builder.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Chainable transfer configuration that defers execution.
///
/// ```no_run
/// use fetchio::{PostData, Request};
///
/// # fn main() -> Result<(), fetchio::Error> {
/// let response = Request::new()
///     .set_useragent("Mozilla/4.0 (compatible)")
///     .set_cookie_storage(std::path::Path::new("/tmp/cookies.txt"))
///     .post(
///         "http://www.foo.com/login.php",
///         PostData::fields([("login", "pera"), ("pass", "secret")]),
///         &[],
///     )?;
/// assert!(response.is_success());
/// # Ok(())
/// # }
/// ```
pub struct Request<E: TransferEngine = HttpEngine> {
    engine: E,
    options: TransferOptions,
    headers: HeaderBag,
}

impl Request<HttpEngine> {
    /// Builder with the default sensible options for most transfers.
    pub fn new() -> Self {
        Self::with_engine(HttpEngine::new())
    }

    /// Builder seeded with `options` laid over the defaults.
    pub fn with_options(options: TransferOptions) -> Self {
        let mut request = Self::new();
        for (key, value) in options.iter() {
            request.options.set(*key, value.clone());
        }
        request
    }
}

impl Default for Request<HttpEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TransferEngine> Request<E> {
    /// Builder running its transfers on the given engine.
    pub fn with_engine(engine: E) -> Self {
        let mut options = TransferOptions::hardened();
        options.set(OptionKey::ReturnBody, true);
        options.set(OptionKey::TimeoutSecs, DEFAULT_TIMEOUT.as_secs());
        Self {
            engine,
            options,
            headers: HeaderBag::new(),
        }
    }

    /// Basic-auth credentials for each transfer.
    pub fn set_credentials(self, username: &str, password: &str) -> Self {
        self.set_option(OptionKey::Credentials, format!("{username}:{password}"))
    }

    pub fn set_referer(self, referer: &str) -> Self {
        self.set_option(OptionKey::Referer, referer)
    }

    pub fn set_useragent(self, agent: &str) -> Self {
        self.set_option(OptionKey::UserAgent, agent)
    }

    /// Include the raw response header text with the outcome.
    pub fn set_headers_used(self, used: bool) -> Self {
        self.set_option(OptionKey::IncludeHeaders, used)
    }

    /// Return the response body to the caller's buffer.
    pub fn set_body_used(self, used: bool) -> Self {
        self.set_option(OptionKey::ReturnBody, used)
    }

    pub fn set_proxy(self, proxy: &str) -> Self {
        self.set_option(OptionKey::Proxy, proxy)
    }

    /// File where cookie data is stored and sent from on each transfer.
    pub fn set_cookie_storage(mut self, path: &Path) -> Self {
        let location = path.to_string_lossy().into_owned();
        self.options.set(OptionKey::CookieJar, location.clone());
        self.options.set(OptionKey::CookieFile, location);
        self
    }

    pub fn set_timeout(self, timeout: Duration) -> Self {
        self.set_option(OptionKey::TimeoutSecs, timeout.as_secs())
    }

    /// Local IP address to bind each transfer to.
    pub fn set_interface(self, interface: &str) -> Self {
        self.set_option(OptionKey::Interface, interface)
    }

    /// Sets one engine option, overwriting any earlier value for the key.
    pub fn set_option(mut self, key: OptionKey, value: impl Into<OptionValue>) -> Self {
        self.options.set(key, value);
        self
    }

    pub fn option(&self, key: OptionKey) -> Option<&OptionValue> {
        self.options.get(key)
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Appends a header value; a repeated name accumulates a list.
    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Replaces every value held under `name`.
    pub fn set_header(mut self, name: &str, value: &str) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Replaces the whole header collection.
    pub fn set_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.replace_all(headers);
        self
    }

    /// Snapshot of the header collection, list values `"; "`-joined.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.headers.flattened()
    }

    /// Sends `data` (and any `files` as multipart attachments) to `url`.
    ///
    /// A `Raw` payload cannot be combined with file uploads; nested fields
    /// cannot either, since the whole payload would degrade to one string.
    #[tracing::instrument(skip(self, data, files))]
    pub fn post(
        &self,
        url: &str,
        data: PostData,
        files: &[(&str, &Path)],
    ) -> Result<Response, Error> {
        let payload = if files.is_empty() {
            payload::prepare_post(data)
        } else {
            let fields = match data {
                PostData::Raw(_) => {
                    return Err(Error::InvalidInput(
                        "cannot combine a raw payload string with file uploads".to_string(),
                    ));
                }
                PostData::Fields(fields) => fields,
            };
            let mut merged: Vec<(String, FieldValue)> =
                Vec::with_capacity(fields.len() + files.len());
            for (name, field) in fields {
                match field {
                    PostField::Scalar(value) => merged.push((name, FieldValue::Text(value))),
                    PostField::Nested(_) => {
                        return Err(Error::InvalidInput(
                            "nested fields cannot be combined with file uploads".to_string(),
                        ));
                    }
                }
            }
            merged.extend(payload::prepare_files(files)?);
            PostPayload::Fields(merged)
        };

        let mut options = self.finalized();
        options.set(OptionKey::Url, url);
        options.set(OptionKey::Method, Method::Post);
        options.set(OptionKey::PostFields, payload);
        Ok(Response::perform(&self.engine, &options))
    }

    /// Fetches `url`.
    #[tracing::instrument(skip(self))]
    pub fn get(&self, url: &str) -> Response {
        let mut options = self.finalized();
        options.set(OptionKey::Url, url);
        options.set(OptionKey::Method, Method::Get);
        Response::perform(&self.engine, &options)
    }

    /// Fetches `url` straight into the file at `target`.
    ///
    /// The file is opened under `mode` before the transfer and closed when
    /// the call returns, whatever the outcome.
    #[tracing::instrument(skip(self))]
    pub fn download_to(&self, url: &str, target: &Path, mode: FileMode) -> Result<Response, Error> {
        let mut file = download::open_target(target, mode)?;
        Ok(self.download_into(url, &mut file))
    }

    /// Fetches `url` into a caller-supplied writer, which is never closed
    /// by the library.
    #[tracing::instrument(skip(self, sink))]
    pub fn download_into<W: Write>(&self, url: &str, sink: &mut W) -> Response {
        let mut options = self.finalized();
        options.set(OptionKey::Url, url);
        options.set(OptionKey::Method, Method::Get);
        Response::perform_into(&self.engine, &options, sink)
    }

    #[deprecated(note = "use `post` directly")]
    pub fn upload_to(
        &self,
        url: &str,
        data: PostData,
        files: &[(&str, &Path)],
    ) -> Result<Response, Error> {
        self.post(url, data, files)
    }

    /// Private finalized copy of the options for one action call.
    fn finalized(&self) -> TransferOptions {
        let mut options = self.options.clone();
        if !self.headers.is_empty() {
            let lines = self.headers.to_header_lines();
            debug!("materializing {} request header(s)", lines.len());
            options.set(OptionKey::HeaderList, lines);
        }
        options
    }
}
