//! The single choke point for talking to the backend.
//!
//! Every facade call goes through [`HttpClient::request`]. Building the request
//! ([`HttpClient::prepare`]) is kept separate from sending it so header and
//! query construction can be checked without a network.

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::session::Session;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

const GENERIC_FAILURE: &str = "API Request Failed";

/// A file to upload as one part of a multipart body.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Bytes,
    pub mime: Option<String>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let mime = guess_mime(&file_name).map(str::to_string);
        Self {
            file_name,
            bytes: bytes.into(),
            mime,
        }
    }

    pub async fn from_path(path: &Path) -> ApiResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }
}

fn guess_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, file: Attachment },
}

/// Multipart body, kept inspectable until it is handed to reqwest.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    /// Adds a text field only when `value` is present.
    pub fn text_opt(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    pub fn file(mut self, name: &str, file: Attachment) -> Self {
        self.parts.push(FormPart::File {
            name: name.to_string(),
            file,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Value of the first text field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    fn into_form(self) -> ApiResult<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File { name, file } => {
                    let mut p = reqwest::multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name);
                    if let Some(mime) = &file.mime {
                        p = p.mime_str(mime)?;
                    }
                    form.part(name, p)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Json(Value),
    Multipart(MultipartForm),
}

/// Method, body, query parameters and an optional cancellation handle.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Body>,
    pub params: BTreeMap<String, String>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(Body::Multipart(form));
        self
    }

    pub fn params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn cancel(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }
}

/// A fully built request. Headers are fixed here, so a logout after this point
/// does not change what gets sent.
#[derive(Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Body>,
}

type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl HttpClient {
    pub fn new(config: &Config, session: Session) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("libris/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            session,
            on_unauthorized: None,
        })
    }

    /// Runs `hook` after the session has been torn down because of a 401 on a
    /// request that carried a token.
    pub fn on_unauthorized(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Base URL with `endpoint` appended verbatim, plus the query string if any.
    pub fn url(&self, endpoint: &str, params: &BTreeMap<String, String>) -> ApiResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}{}", base, endpoint))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        Ok(url)
    }

    pub fn prepare(&self, endpoint: &str, options: &RequestOptions) -> ApiResult<PreparedRequest> {
        let mut headers = HeaderMap::new();

        // reqwest sets the boundary-aware content type for multipart itself.
        if !matches!(options.body, Some(Body::Multipart(_))) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(token) = self.session.token() {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
        }

        Ok(PreparedRequest {
            method: options.method.clone(),
            url: self.url(endpoint, &options.params)?,
            headers,
            body: options.body.clone(),
        })
    }

    /// Sends a request and returns the JSON payload untouched on success.
    ///
    /// A non-success status becomes [`ApiError::Status`] with the payload's
    /// `error` or `message` field. A 401 also clears the session first.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        let prepared = self.prepare(endpoint, &options)?;
        match options.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        log::debug!("{} {} cancelled", options.method, endpoint);
                        Err(ApiError::Cancelled)
                    }
                    res = self.send(prepared) => res,
                }
            }
            None => self.send(prepared).await,
        }
    }

    async fn send(&self, prepared: PreparedRequest) -> ApiResult<Value> {
        log::debug!("{} {}", prepared.method, prepared.url);
        let had_token = prepared.headers.contains_key(AUTHORIZATION);

        let mut builder = self
            .http
            .request(prepared.method, prepared.url)
            .headers(prepared.headers);
        builder = match prepared.body {
            Some(Body::Json(value)) => builder.body(serde_json::to_vec(&value)?),
            Some(Body::Multipart(form)) => builder.multipart(form.into_form()?),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let data: Value = serde_json::from_slice(&bytes)?;

        if status.is_success() {
            return Ok(data);
        }

        let message = error_message(&data);
        if status == StatusCode::UNAUTHORIZED {
            log::warn!("Backend rejected the session ({}), clearing it", message);
            if let Err(e) = self.session.clear() {
                log::warn!("Could not clear session: {}", e);
            }
            // Without a token there was no session to expire, e.g. a failed login.
            if let Some(hook) = self.on_unauthorized.as_ref().filter(|_| had_token) {
                hook();
            }
            return Err(ApiError::Unauthorized { message });
        }
        Err(ApiError::Status { status, message })
    }
}

/// `error`, else `message`, else a generic string.
fn error_message(data: &Value) -> String {
    ["error", "message"]
        .iter()
        .find_map(|key| match data.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null | Value::Bool(false) => None,
            Value::String(_) => None,
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}
