//! Imperative, reusable transfer session.

use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::download::{self, FileMode};
use crate::engine::{
    FieldValue, HttpEngine, Method, OptionKey, PostPayload, TransferEngine, TransferOptions,
    TransferResult,
};
use crate::error::Error;
use crate::request::payload;
use crate::request::{PostData, PostField};

/// Default timeout for plain fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for POST submissions.
pub const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for multipart uploads.
pub const DEFAULT_MULTIPART_TIMEOUT: Duration = Duration::from_secs(30);

/// Stateful transfer client holding one reusable session.
///
/// The session is created at construction (or [`init`](Self::init)) with the
/// default hardening options and reused across action calls until
/// [`close`](Self::close); option setters mutate it immediately. After
/// `close()` every setter and action fails with [`Error::SessionClosed`]
/// until `init()` is called again.
///
/// ```no_run
/// use fetchio::{PostData, TransferClient};
///
/// # fn main() -> Result<(), fetchio::Error> {
/// let mut client = TransferClient::new();
/// client.set_user_agent("Mozilla/4.0 (compatible)")?;
/// client.store_cookies(std::path::Path::new("/tmp/cookies.txt"))?;
/// let body = client.send_post(
///     "http://www.foo.com/login.php",
///     PostData::fields([("login", "pera"), ("password", "joe")]),
///     None,
///     None,
/// )?;
/// # let _ = body;
/// # Ok(())
/// # }
/// ```
pub struct TransferClient<E: TransferEngine = HttpEngine> {
    engine: E,
    session: Option<Session>,
}

struct Session {
    options: TransferOptions,
    last: Option<TransferResult>,
}

impl Session {
    /// Stores the outcome for later introspection and splits it into the
    /// caller-facing success/failure shape.
    fn record(&mut self, result: TransferResult) -> Result<Option<Vec<u8>>, Error> {
        let error = result.error.clone();
        let body = result.body.clone();
        self.last = Some(result);
        match error {
            Some(error) => Err(Error::Transport(error)),
            None => Ok(body),
        }
    }
}

impl TransferClient<HttpEngine> {
    pub fn new() -> Self {
        Self::with_engine(HttpEngine::new())
    }
}

impl Default for TransferClient<HttpEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TransferEngine> TransferClient<E> {
    /// Client running its transfers on the given engine.
    pub fn with_engine(engine: E) -> Self {
        let mut client = Self {
            engine,
            session: None,
        };
        client.init();
        client
    }

    /// (Re)creates the session with the default hardening options: fail on
    /// an error status, follow redirects, request gzip/deflate encoding,
    /// skip TLS peer verification.
    pub fn init(&mut self) {
        self.session = Some(Session {
            options: TransferOptions::hardened(),
            last: None,
        });
    }

    /// Releases the session. Call [`init`](Self::init) before further use.
    pub fn close(&mut self) {
        self.session = None;
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn session_mut(&mut self) -> Result<&mut Session, Error> {
        self.session.as_mut().ok_or(Error::SessionClosed)
    }

    /// Basic-auth credentials for subsequent transfers.
    pub fn set_credentials(&mut self, username: &str, password: &str) -> Result<(), Error> {
        self.session_mut()?
            .options
            .set(OptionKey::Credentials, format!("{username}:{password}"));
        Ok(())
    }

    pub fn set_referrer(&mut self, referrer: &str) -> Result<(), Error> {
        self.session_mut()?.options.set(OptionKey::Referer, referrer);
        Ok(())
    }

    pub fn set_user_agent(&mut self, agent: &str) -> Result<(), Error> {
        self.session_mut()?.options.set(OptionKey::UserAgent, agent);
        Ok(())
    }

    /// Include the raw response header text with subsequent outcomes.
    pub fn include_response_headers(&mut self, value: bool) -> Result<(), Error> {
        self.session_mut()?
            .options
            .set(OptionKey::IncludeHeaders, value);
        Ok(())
    }

    /// Replaces the session header list with raw `Name: value` lines.
    pub fn set_headers(&mut self, headers: Vec<String>) -> Result<(), Error> {
        self.session_mut()?.options.set(OptionKey::HeaderList, headers);
        Ok(())
    }

    pub fn set_proxy(&mut self, proxy: &str) -> Result<(), Error> {
        self.session_mut()?.options.set(OptionKey::Proxy, proxy);
        Ok(())
    }

    /// File where cookie data is stored and sent from on each request.
    pub fn store_cookies(&mut self, path: &Path) -> Result<(), Error> {
        let location = path.to_string_lossy().into_owned();
        let session = self.session_mut()?;
        session.options.set(OptionKey::CookieJar, location.clone());
        session.options.set(OptionKey::CookieFile, location);
        Ok(())
    }

    /// Sets a single raw cookie string.
    pub fn set_cookie(&mut self, cookie: &str) -> Result<(), Error> {
        self.session_mut()?.options.set(OptionKey::Cookie, cookie);
        Ok(())
    }

    /// Sends `data` to `url` as a POST and returns the response body.
    ///
    /// A `Fields` payload is serialized via standard URL encoding; a `Raw`
    /// payload passes through unchanged.
    #[tracing::instrument(skip(self, data))]
    pub fn send_post(
        &mut self,
        url: &str,
        data: PostData,
        bind_ip: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, Error> {
        let payload = match data {
            PostData::Fields(fields) => {
                let query = payload::build_query(&fields);
                debug!("url: {url} post string: {query}");
                PostPayload::Raw(query)
            }
            PostData::Raw(body) => PostPayload::Raw(body),
        };

        let session = self.session.as_mut().ok_or(Error::SessionClosed)?;
        session.options.set(OptionKey::Url, url);
        session.options.set(OptionKey::ReturnBody, true);
        apply_per_call(
            &mut session.options,
            bind_ip,
            timeout.unwrap_or(DEFAULT_POST_TIMEOUT),
        );
        session.options.set(OptionKey::Method, Method::Post);
        session.options.set(OptionKey::PostFields, payload);

        let result = self.engine.perform(&session.options);
        Ok(session.record(result)?.unwrap_or_default())
    }

    /// Fetches `url` and returns the response body.
    #[tracing::instrument(skip(self))]
    pub fn fetch_url(
        &mut self,
        url: &str,
        bind_ip: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, Error> {
        let session = self.session.as_mut().ok_or(Error::SessionClosed)?;
        session.options.set(OptionKey::Url, url);
        session.options.set(OptionKey::Method, Method::Get);
        session.options.set(OptionKey::ReturnBody, true);
        apply_per_call(
            &mut session.options,
            bind_ip,
            timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
        );

        let result = self.engine.perform(&session.options);
        Ok(session.record(result)?.unwrap_or_default())
    }

    /// Fetches `url` and streams the body into an already-open writer.
    #[tracing::instrument(skip(self, sink))]
    pub fn fetch_into_file<W: Write>(
        &mut self,
        url: &str,
        sink: &mut W,
        bind_ip: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        let session = self.session.as_mut().ok_or(Error::SessionClosed)?;
        session.options.set(OptionKey::Url, url);
        session.options.set(OptionKey::Method, Method::Get);
        apply_per_call(
            &mut session.options,
            bind_ip,
            timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
        );

        let result = self.engine.perform_into(&session.options, sink);
        session.record(result).map(|_| ())
    }

    /// Sends `data` and `files` to `url` as one multipart POST.
    ///
    /// `data` must be a field mapping, and its fields flat scalars; file
    /// contents are streamed as attachments under their field names.
    #[tracing::instrument(skip(self, data, files))]
    pub fn send_multipart(
        &mut self,
        url: &str,
        data: PostData,
        files: &[(&str, &Path)],
        bind_ip: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, Error> {
        let fields = match data {
            PostData::Raw(_) => {
                return Err(Error::InvalidInput(
                    "multipart payload must be a field mapping".to_string(),
                ));
            }
            PostData::Fields(fields) => fields,
        };

        let mut merged: Vec<(String, FieldValue)> =
            Vec::with_capacity(fields.len() + files.len());
        let mut echo: Vec<String> = Vec::with_capacity(fields.len());
        for (name, field) in fields {
            match field {
                PostField::Scalar(value) => {
                    echo.push(payload::encode_pair(&name, &value));
                    merged.push((name, FieldValue::Text(value)));
                }
                PostField::Nested(_) => {
                    return Err(Error::InvalidInput(
                        "nested fields cannot be sent as multipart".to_string(),
                    ));
                }
            }
        }
        debug!("post string: {}", echo.join("&"));

        for (name, path) in files {
            merged.push((name.to_string(), FieldValue::File(normalize_upload_path(path))));
        }

        let session = self.session.as_mut().ok_or(Error::SessionClosed)?;
        session.options.set(OptionKey::Url, url);
        session.options.set(OptionKey::ReturnBody, true);
        apply_per_call(
            &mut session.options,
            bind_ip,
            timeout.unwrap_or(DEFAULT_MULTIPART_TIMEOUT),
        );
        session.options.set(OptionKey::Method, Method::Post);
        // The Expect header stalls multipart submissions on some servers;
        // replace the session header list to keep it disabled.
        session
            .options
            .set(OptionKey::HeaderList, vec!["Expect:".to_string()]);
        session
            .options
            .set(OptionKey::PostFields, PostPayload::Fields(merged));

        let result = self.engine.perform(&session.options);
        Ok(session.record(result)?.unwrap_or_default())
    }

    /// Downloads `url` into the file at `filepath`.
    ///
    /// Empty inputs are rejected before any file is touched. Returns `Ok(())`
    /// once the target file could be opened, whether or not the fetch itself
    /// succeeded; callers have long relied on exactly that, so the transfer
    /// outcome is reported through [`Self::has_error`] / [`Self::error_msg`]
    /// instead of the return value.
    #[tracing::instrument(skip(self))]
    pub fn download(
        &mut self,
        url: &str,
        filepath: &Path,
        mode: FileMode,
        bind_ip: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<(), Error> {
        if url.is_empty() {
            return Err(Error::InvalidInput(
                "download requires a non-empty url".to_string(),
            ));
        }
        if filepath.as_os_str().is_empty() {
            return Err(Error::InvalidInput(
                "download requires a non-empty file path".to_string(),
            ));
        }
        if self.session.is_none() {
            return Err(Error::SessionClosed);
        }

        let mut file = download::open_target(filepath, mode)?;
        match self.fetch_into_file(url, &mut file, bind_ip, timeout) {
            Ok(()) | Err(Error::Transport(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Final URL of the last transfer, after any redirects.
    pub fn effective_url(&self) -> Option<&str> {
        self.last().map(|result| result.effective_url.as_str())
    }

    /// HTTP status code of the last transfer.
    pub fn http_response_code(&self) -> Option<u16> {
        self.last().map(|result| result.status)
    }

    /// Formatted error of the last transfer, if it failed.
    pub fn error_msg(&self) -> Option<String> {
        self.last()
            .and_then(|result| result.error.as_ref())
            .map(|error| error.to_string())
    }

    /// True when the last transfer on this session failed.
    pub fn has_error(&self) -> bool {
        self.last().is_some_and(|result| result.error.is_some())
    }

    fn last(&self) -> Option<&TransferResult> {
        self.session.as_ref().and_then(|session| session.last.as_ref())
    }
}

fn apply_per_call(options: &mut TransferOptions, bind_ip: Option<&str>, timeout: Duration) {
    if let Some(ip) = bind_ip {
        debug!("binding to ip {ip}");
        options.set(OptionKey::Interface, ip);
    }
    options.set(OptionKey::TimeoutSecs, timeout.as_secs());
}

#[cfg(windows)]
fn normalize_upload_path(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace('/', "\\"))
}

#[cfg(not(windows))]
fn normalize_upload_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockTransferEngine;
    use crate::test_utils::{failed_result, ok_result, streamed_result};
    use crate::engine::code;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn capturing_engine(
        body: &'static str,
    ) -> (MockTransferEngine, Arc<Mutex<Vec<TransferOptions>>>) {
        let captured: Arc<Mutex<Vec<TransferOptions>>> = Arc::new(Mutex::new(Vec::new()));
        let mut engine = MockTransferEngine::new();
        let sink = Arc::clone(&captured);
        engine.expect_perform().returning(move |options| {
            sink.lock().unwrap().push(options.clone());
            ok_result(body, 200, "http://server.test/done")
        });
        (engine, captured)
    }

    #[test]
    fn test_fetch_url_returns_body_and_records_outcome() {
        let (engine, captured) = capturing_engine("payload");
        let mut client = TransferClient::with_engine(engine);

        let body = client
            .fetch_url("http://server.test/page", None, None)
            .unwrap();

        assert_eq!(body, b"payload");
        assert_eq!(client.http_response_code(), Some(200));
        assert_eq!(client.effective_url(), Some("http://server.test/done"));
        assert!(!client.has_error());
        assert!(client.error_msg().is_none());

        let captured = captured.lock().unwrap();
        let options = &captured[0];
        assert_eq!(options.method(), Some(Method::Get));
        assert_eq!(options.number(OptionKey::TimeoutSecs), Some(5));
        assert!(options.is_on(OptionKey::ReturnBody));
    }

    #[test]
    fn test_send_post_serializes_a_mapping_to_one_query_string() {
        let (engine, captured) = capturing_engine("OK");
        let mut client = TransferClient::with_engine(engine);

        client
            .send_post(
                "http://server.test/login",
                PostData::fields([("login", "pera"), ("pass", "joe")]),
                None,
                None,
            )
            .unwrap();

        let captured = captured.lock().unwrap();
        let options = &captured[0];
        assert_eq!(options.method(), Some(Method::Post));
        assert_eq!(options.number(OptionKey::TimeoutSecs), Some(15));
        assert_eq!(
            options.payload(),
            Some(&PostPayload::Raw("login=pera&pass=joe".to_string()))
        );
    }

    #[test]
    fn test_send_post_passes_raw_payload_through() {
        let (engine, captured) = capturing_engine("OK");
        let mut client = TransferClient::with_engine(engine);

        client
            .send_post(
                "http://server.test/login",
                PostData::raw("already=encoded"),
                None,
                None,
            )
            .unwrap();

        assert_eq!(
            captured.lock().unwrap()[0].payload(),
            Some(&PostPayload::Raw("already=encoded".to_string()))
        );
    }

    #[test]
    fn test_transport_failure_is_an_error_and_stays_inspectable() {
        let mut engine = MockTransferEngine::new();
        engine
            .expect_perform()
            .returning(|_| failed_result(code::OPERATION_TIMEDOUT, "timed out"));
        let mut client = TransferClient::with_engine(engine);

        let error = client
            .fetch_url("http://server.test/slow", None, None)
            .unwrap_err();

        assert!(matches!(error, Error::Transport(_)));
        assert!(client.has_error());
        assert!(client.error_msg().unwrap().contains("#28"));
    }

    #[test]
    fn test_setters_configure_the_session() {
        let (engine, captured) = capturing_engine("");
        let mut client = TransferClient::with_engine(engine);
        client.set_credentials("user", "secret").unwrap();
        client.set_referrer("http://referer.test/").unwrap();
        client.set_user_agent("agent/1.0").unwrap();
        client.include_response_headers(true).unwrap();
        client.set_proxy("http://proxy.test:8080").unwrap();
        client.set_cookie("lang=en").unwrap();
        client
            .store_cookies(Path::new("/tmp/jar.txt"))
            .unwrap();
        client
            .set_headers(vec!["X-Custom: one".to_string()])
            .unwrap();

        client.fetch_url("http://server.test/", None, None).unwrap();

        let captured = captured.lock().unwrap();
        let options = &captured[0];
        assert_eq!(options.text(OptionKey::Credentials), Some("user:secret"));
        assert_eq!(options.text(OptionKey::Referer), Some("http://referer.test/"));
        assert_eq!(options.text(OptionKey::UserAgent), Some("agent/1.0"));
        assert!(options.is_on(OptionKey::IncludeHeaders));
        assert_eq!(options.text(OptionKey::Proxy), Some("http://proxy.test:8080"));
        assert_eq!(options.text(OptionKey::Cookie), Some("lang=en"));
        assert_eq!(options.text(OptionKey::CookieJar), Some("/tmp/jar.txt"));
        assert_eq!(options.text(OptionKey::CookieFile), Some("/tmp/jar.txt"));
        assert_eq!(
            options.text_list(OptionKey::HeaderList),
            Some(&["X-Custom: one".to_string()][..])
        );
        // Hardening defaults applied at init survive.
        assert!(options.is_on(OptionKey::FailOnStatus));
        assert!(options.is_on(OptionKey::FollowRedirects));
        assert_eq!(options.flag(OptionKey::VerifyTlsPeer), Some(false));
    }

    #[test]
    fn test_send_multipart_merges_fields_and_file_markers() {
        let (engine, captured) = capturing_engine("uploaded");
        let mut client = TransferClient::with_engine(engine);

        let body = client
            .send_multipart(
                "http://server.test/upload",
                PostData::fields([("comment", "hello")]),
                &[("doc", Path::new("/tmp/report.txt"))],
                None,
                None,
            )
            .unwrap();

        assert_eq!(body, b"uploaded");
        let captured = captured.lock().unwrap();
        let options = &captured[0];
        assert_eq!(options.number(OptionKey::TimeoutSecs), Some(30));
        assert_eq!(
            options.text_list(OptionKey::HeaderList),
            Some(&["Expect:".to_string()][..])
        );
        assert_eq!(
            options.payload(),
            Some(&PostPayload::Fields(vec![
                ("comment".to_string(), FieldValue::Text("hello".to_string())),
                (
                    "doc".to_string(),
                    FieldValue::File(PathBuf::from("/tmp/report.txt"))
                ),
            ]))
        );
    }

    #[test]
    fn test_send_multipart_rejects_a_raw_payload() {
        // No expectations: any engine call would panic.
        let engine = MockTransferEngine::new();
        let mut client = TransferClient::with_engine(engine);

        let error = client
            .send_multipart(
                "http://server.test/upload",
                PostData::raw("raw=string"),
                &[],
                None,
                None,
            )
            .unwrap_err();

        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[test]
    fn test_actions_after_close_fail_until_init() {
        let mut engine = MockTransferEngine::new();
        engine
            .expect_perform()
            .returning(|_| ok_result("back", 200, "http://server.test/"));
        let mut client = TransferClient::with_engine(engine);

        client.close();
        assert!(!client.is_open());
        assert!(matches!(
            client.fetch_url("http://server.test/", None, None),
            Err(Error::SessionClosed)
        ));
        assert!(matches!(
            client.set_user_agent("agent/1.0"),
            Err(Error::SessionClosed)
        ));

        client.init();
        let body = client.fetch_url("http://server.test/", None, None).unwrap();
        assert_eq!(body, b"back");
    }

    #[test]
    fn test_download_rejects_empty_inputs_before_touching_anything() {
        let engine = MockTransferEngine::new();
        let mut client = TransferClient::with_engine(engine);
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.bin");

        let error = client
            .download("", &target, FileMode::Truncate, None, None)
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(!target.exists());

        let error = client
            .download("http://server.test/file", Path::new(""), FileMode::Truncate, None, None)
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[test]
    fn test_download_unwritable_target_performs_no_transfer() {
        let engine = MockTransferEngine::new();
        let mut client = TransferClient::with_engine(engine);
        let dir = tempdir().unwrap();
        let target = dir.path().join("no-such-dir").join("out.bin");

        let error = client
            .download("http://server.test/file", &target, FileMode::Truncate, None, None)
            .unwrap_err();
        assert!(matches!(error, Error::File { .. }));
    }

    #[test]
    fn test_download_writes_the_fetched_body() {
        let mut engine = MockTransferEngine::new();
        engine.expect_perform_into().returning(|options, sink| {
            sink.write_all(b"downloaded bytes").unwrap();
            streamed_result(200, options.text(OptionKey::Url).unwrap_or_default())
        });
        let mut client = TransferClient::with_engine(engine);
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.bin");

        client
            .download("http://server.test/file", &target, FileMode::Truncate, None, None)
            .unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"downloaded bytes");
        assert!(!client.has_error());
    }

    #[test]
    fn test_download_reports_ok_even_when_the_fetch_fails() {
        let mut engine = MockTransferEngine::new();
        engine
            .expect_perform_into()
            .returning(|_, _| failed_result(code::COULDNT_CONNECT, "connection refused"));
        let mut client = TransferClient::with_engine(engine);
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.bin");

        // The opened target is enough for a successful return; the failed
        // fetch is only visible through the introspection accessors.
        let outcome = client.download(
            "http://server.test/file",
            &target,
            FileMode::Truncate,
            None,
            None,
        );
        assert!(outcome.is_ok());
        assert!(target.exists());
        assert!(client.has_error());
        assert!(client.error_msg().unwrap().contains("#7"));
    }

    #[test]
    fn test_fetch_into_file_streams_without_buffering() {
        let mut engine = MockTransferEngine::new();
        engine.expect_perform_into().returning(|_, sink| {
            sink.write_all(b"streamed").unwrap();
            streamed_result(200, "http://server.test/file")
        });
        let mut client = TransferClient::with_engine(engine);

        let mut sink: Vec<u8> = Vec::new();
        client
            .fetch_into_file("http://server.test/file", &mut sink, None, None)
            .unwrap();
        assert_eq!(sink, b"streamed");
        assert_eq!(client.http_response_code(), Some(200));
    }

    #[test]
    fn test_bind_ip_is_applied_per_call() {
        let (engine, captured) = capturing_engine("");
        let mut client = TransferClient::with_engine(engine);
        client
            .fetch_url("http://server.test/", Some("127.0.0.1"), None)
            .unwrap();
        assert_eq!(
            captured.lock().unwrap()[0].text(OptionKey::Interface),
            Some("127.0.0.1")
        );
    }
}
