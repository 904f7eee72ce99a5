//! The shipped transfer engine, backed by a blocking HTTP client.
//!
//! Every transfer assembles a fresh client from the option table: redirect
//! policy, decompression, TLS verification, proxy, bind address, and timeout
//! are client-level concerns in the underlying library, and a per-transfer
//! client keeps each `perform` call fully scoped to its own option set.

use log::{debug, warn};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, REFERER, SET_COOKIE};
use reqwest::{redirect, Proxy};
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use super::cookies;
use super::options::{FieldValue, Method, OptionKey, PostPayload, TransferOptions};
use super::result::{code, EngineError, TransferResult};
use super::TransferEngine;

/// Redirect ceiling applied when redirect following is enabled.
pub const MAX_REDIRECTS: usize = 10;

/// Transfer engine on top of `reqwest`'s blocking client.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpEngine;

impl HttpEngine {
    pub fn new() -> Self {
        HttpEngine
    }

    fn run(&self, options: &TransferOptions, sink: Option<&mut dyn Write>) -> TransferResult {
        let requested = options.text(OptionKey::Url).unwrap_or_default().to_string();
        match execute(options, sink) {
            Ok(result) => result,
            Err(error) => {
                debug!("transfer to {requested:?} failed: {error}");
                TransferResult::failure(requested, error)
            }
        }
    }
}

impl TransferEngine for HttpEngine {
    #[tracing::instrument(skip(self, options))]
    fn perform(&self, options: &TransferOptions) -> TransferResult {
        self.run(options, None)
    }

    #[tracing::instrument(skip(self, options, sink))]
    fn perform_into(&self, options: &TransferOptions, sink: &mut dyn Write) -> TransferResult {
        self.run(options, Some(sink))
    }
}

fn execute(
    options: &TransferOptions,
    sink: Option<&mut dyn Write>,
) -> Result<TransferResult, EngineError> {
    let url = options
        .text(OptionKey::Url)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| EngineError::new(code::URL_MALFORMAT, "no url set for transfer"))?;

    let client = build_client(options)?;
    let request = build_request(&client, options, url)?;

    let method = options.method().unwrap_or(Method::Get);
    debug!("performing {} transfer to {url}", method.as_str());

    let response = request.send().map_err(|error| classify(&error))?;
    Ok(finish(options, response, sink))
}

fn build_client(options: &TransferOptions) -> Result<Client, EngineError> {
    let mut builder = Client::builder();

    builder = if options.is_on(OptionKey::FollowRedirects) {
        builder.redirect(redirect::Policy::limited(MAX_REDIRECTS))
    } else {
        builder.redirect(redirect::Policy::none())
    };

    // Without an encoding request the client must neither advertise nor
    // transparently decode compressed responses.
    if options.text(OptionKey::AcceptEncoding).is_none() {
        builder = builder.no_gzip().no_deflate();
    }

    builder = builder.danger_accept_invalid_certs(!options.flag(OptionKey::VerifyTlsPeer).unwrap_or(true));

    if let Some(proxy) = options.text(OptionKey::Proxy) {
        let proxy = Proxy::all(proxy).map_err(|error| {
            EngineError::new(
                code::COULDNT_RESOLVE_PROXY,
                format!("invalid proxy {proxy}: {error}"),
            )
        })?;
        builder = builder.proxy(proxy);
    }

    if let Some(interface) = options.text(OptionKey::Interface) {
        let address: IpAddr = interface.parse().map_err(|_| {
            EngineError::new(
                code::INTERFACE_FAILED,
                format!("cannot bind to {interface}: not a local ip address"),
            )
        })?;
        builder = builder.local_address(address);
    }

    if let Some(secs) = options.number(OptionKey::TimeoutSecs) {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    if let Some(agent) = options.text(OptionKey::UserAgent) {
        builder = builder.user_agent(agent.to_string());
    }

    builder.build().map_err(|error| classify(&error))
}

fn build_request(
    client: &Client,
    options: &TransferOptions,
    url: &str,
) -> Result<RequestBuilder, EngineError> {
    let method = options.method().unwrap_or(Method::Get);
    let mut request = match method {
        Method::Get => client.get(url),
        Method::Post => client.post(url),
    };

    if let Some(lines) = options.text_list(OptionKey::HeaderList) {
        for line in lines {
            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => (line.trim(), ""),
            };
            if name.is_empty() {
                continue;
            }
            let name = match HeaderName::from_bytes(name.as_bytes()) {
                Ok(name) => name,
                Err(_) => {
                    warn!("skipping malformed header line {line:?}");
                    continue;
                }
            };
            // A bare `Name:` disables the header; the engine adds none of the
            // affected ones on its own, so there is nothing to strip.
            if value.is_empty() {
                continue;
            }
            match HeaderValue::from_str(value) {
                Ok(value) => request = request.header(name, value),
                Err(_) => warn!("skipping malformed header value in {line:?}"),
            }
        }
    }

    if let Some(referer) = options.text(OptionKey::Referer) {
        if let Ok(value) = HeaderValue::from_str(referer) {
            request = request.header(REFERER, value);
        }
    }

    if let Some(credentials) = options.text(OptionKey::Credentials) {
        let (user, pass) = match credentials.split_once(':') {
            Some((user, pass)) => (user, Some(pass)),
            None => (credentials, None),
        };
        request = request.basic_auth(user, pass);
    }

    request = apply_cookies(request, options);

    if method == Method::Post {
        if let Some(payload) = options.payload() {
            request = apply_payload(request, payload)?;
        }
    }

    Ok(request)
}

fn apply_cookies(mut request: RequestBuilder, options: &TransferOptions) -> RequestBuilder {
    let mut parts: Vec<String> = Vec::new();
    if let Some(raw) = options.text(OptionKey::Cookie) {
        parts.push(raw.to_string());
    }
    if let Some(file) = options.text(OptionKey::CookieFile) {
        match cookies::load(Path::new(file)) {
            Ok(stored) => parts.extend(stored),
            Err(error) => warn!("failed to read cookie file {file}: {error:#}"),
        }
    }
    if !parts.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&parts.join("; ")) {
            request = request.header(COOKIE, value);
        }
    }
    request
}

fn apply_payload(
    request: RequestBuilder,
    payload: &PostPayload,
) -> Result<RequestBuilder, EngineError> {
    match payload {
        PostPayload::Raw(body) => Ok(request
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body.clone())),
        PostPayload::Fields(fields) => {
            let has_uploads = fields
                .iter()
                .any(|(_, value)| matches!(value, FieldValue::File(_)));
            if has_uploads {
                let mut form = multipart::Form::new();
                for (name, value) in fields {
                    form = match value {
                        FieldValue::Text(text) => form.text(name.clone(), text.clone()),
                        FieldValue::File(path) => {
                            form.file(name.clone(), path).map_err(|error| {
                                EngineError::new(
                                    code::READ_ERROR,
                                    format!("failed to read upload file {}: {error}", path.display()),
                                )
                            })?
                        }
                    };
                }
                Ok(request.multipart(form))
            } else {
                let pairs: Vec<(&str, &str)> = fields
                    .iter()
                    .filter_map(|(name, value)| match value {
                        FieldValue::Text(text) => Some((name.as_str(), text.as_str())),
                        FieldValue::File(_) => None,
                    })
                    .collect();
                Ok(request.form(&pairs))
            }
        }
    }
}

fn finish(
    options: &TransferOptions,
    mut response: Response,
    sink: Option<&mut dyn Write>,
) -> TransferResult {
    let status = response.status().as_u16();
    let effective_url = response.url().to_string();
    let header_text = options
        .is_on(OptionKey::IncludeHeaders)
        .then(|| render_header_text(&response));

    persist_cookies(options, &response);

    if options.is_on(OptionKey::FailOnStatus) && status >= 300 {
        return TransferResult {
            body: None,
            header_text,
            status,
            effective_url,
            error: Some(EngineError::new(
                code::HTTP_RETURNED_ERROR,
                format!("http response code said error: {status}"),
            )),
        };
    }

    let (body, error) = match sink {
        Some(sink) => match response.copy_to(sink) {
            Ok(_) => (None, None),
            Err(error) => (
                None,
                Some(EngineError::new(
                    code::WRITE_ERROR,
                    format!("failed writing received data: {error}"),
                )),
            ),
        },
        None if options.is_on(OptionKey::ReturnBody) => match response.bytes() {
            Ok(bytes) => (Some(bytes.to_vec()), None),
            Err(error) => (
                None,
                Some(EngineError::new(
                    code::RECV_ERROR,
                    format!("failed receiving response body: {error}"),
                )),
            ),
        },
        None => {
            // Body neither buffered nor streamed; drain it so the transfer
            // completes cleanly.
            let _ = response.bytes();
            (None, None)
        }
    };

    TransferResult {
        body,
        header_text,
        status,
        effective_url,
        error,
    }
}

fn render_header_text(response: &Response) -> String {
    let mut text = format!("{:?} {}\r\n", response.version(), response.status());
    for (name, value) in response.headers() {
        text.push_str(name.as_str());
        text.push_str(": ");
        text.push_str(value.to_str().unwrap_or_default());
        text.push_str("\r\n");
    }
    text.push_str("\r\n");
    text
}

fn persist_cookies(options: &TransferOptions, response: &Response) {
    let Some(jar) = options.text(OptionKey::CookieJar) else {
        return;
    };
    let set_cookies: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(String::from))
        .collect();
    if set_cookies.is_empty() {
        return;
    }
    if let Err(error) = cookies::store(Path::new(jar), &set_cookies) {
        warn!("failed to persist cookie jar {jar}: {error:#}");
    }
}

/// Maps a client error onto the stable engine error codes.
fn classify(error: &reqwest::Error) -> EngineError {
    let message = describe(error);
    let code = if error.is_timeout() {
        code::OPERATION_TIMEDOUT
    } else if error.is_redirect() {
        code::TOO_MANY_REDIRECTS
    } else if error.is_builder() {
        code::URL_MALFORMAT
    } else if error.is_connect() {
        let lowered = message.to_lowercase();
        if lowered.contains("dns") || lowered.contains("resolve") {
            code::COULDNT_RESOLVE_HOST
        } else if lowered.contains("certificate") || lowered.contains("tls") {
            code::SSL_CONNECT_ERROR
        } else {
            code::COULDNT_CONNECT
        }
    } else {
        code::RECV_ERROR
    };
    EngineError::new(code, message)
}

/// Flattens an error and its sources into one diagnostic line.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(current) = source {
        message.push_str(": ");
        message.push_str(&current.to_string());
        source = current.source();
    }
    message
}
