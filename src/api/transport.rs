//! Purpose: Single HTTP request function shared by the read fetcher and the mutation runner.
//! Exports: `Method`, `ApiRequest`, `Transport`, `HttpTransport`, `ApiResult`.
//! Role: Turns an endpoint string (path + query) into a JSON value or a typed `Error`.
//! Invariants: No retries and no timeouts; a request is sent exactly once.
//! Invariants: Non-JSON success bodies become a JSON string; empty bodies become `null`.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            endpoint: endpoint.into(),
            body: None,
        }
    }
}

/// Seam between request construction and the network.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> ApiResult<Value>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &ApiRequest) -> ApiResult<Value> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &ApiRequest) -> ApiResult<Value> {
        (**self).send(request)
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    base_url: Url,
    agent: ureq::Agent,
}

/// Error body produced by the backend's global exception handler.
#[derive(Deserialize)]
struct BackendError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(HttpTransportInner { base_url, agent }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn endpoint_url(&self, endpoint: &str) -> ApiResult<Url> {
        build_url(&self.inner.base_url, endpoint)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> ApiResult<Value> {
        let url = self.endpoint_url(&request.endpoint)?;
        tracing::debug!(method = %request.method, url = %url, "sending request");
        let call = self
            .inner
            .agent
            .request(request.method.as_str(), url.as_str())
            .set("Accept", "application/json");
        let response = match &request.body {
            Some(body) => {
                let payload = serde_json::to_string(body).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                call.set("Content-Type", "application/json")
                    .send_string(&payload)
            }
            None => call.call(),
        };

        match response {
            Ok(resp) => read_body(resp),
            Err(ureq::Error::Status(code, resp)) => {
                let err = parse_error_response(code, resp);
                tracing::warn!(method = %request.method, url = %url, status = code, "request rejected");
                Err(err)
            }
            Err(ureq::Error::Transport(err)) => {
                tracing::warn!(method = %request.method, url = %url, error = %err, "request failed");
                Err(Error::new(ErrorKind::Io)
                    .with_message("request failed")
                    .with_hint("Check that the product API is running and --api-url is correct.")
                    .with_source(err))
            }
        }
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(raw.trim()).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid api base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("api base url must use http or https scheme")
        );
    }
    if url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Usage).with_message("api base url cannot be a base"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, endpoint: &str) -> ApiResult<Url> {
    base_url
        .join(endpoint.trim_start_matches('/'))
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid endpoint: {endpoint}"))
                .with_source(err)
        })
}

fn read_body(response: ureq::Response) -> ApiResult<Value> {
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    Ok(decode_body(&body))
}

fn decode_body(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    error_from_status(status, &body)
}

fn error_from_status(status: u16, body: &str) -> Error {
    let kind = error_kind_from_status(status);
    let detail = serde_json::from_str::<BackendError>(body)
        .ok()
        .and_then(|backend| backend.message.or(backend.error))
        .filter(|message| !message.trim().is_empty());
    let message = detail.unwrap_or_else(|| format!("request failed with status {status}"));
    Error::new(kind).with_message(message).with_status(status)
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 422 => ErrorKind::Usage,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::Remote,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_url, decode_body, error_from_status, normalize_base_url};
    use crate::core::error::ErrorKind;
    use serde_json::{Value, json};

    #[test]
    fn normalize_base_url_adds_trailing_slash() {
        let url = normalize_base_url("http://localhost:8080".to_string()).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/");
        let url = normalize_base_url("https://shop.example/api?x=1".to_string()).expect("url");
        assert_eq!(url.as_str(), "https://shop.example/api/");
    }

    #[test]
    fn normalize_base_url_rejects_other_schemes() {
        let err = normalize_base_url("ftp://localhost".to_string()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = normalize_base_url("not a url".to_string()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn build_url_keeps_prefix_and_query() {
        let base = normalize_base_url("http://localhost:8080/api".to_string()).expect("url");
        let url = build_url(&base, "/produtos?categoria=calcados&sort=preco,desc").expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/produtos?categoria=calcados&sort=preco,desc"
        );
    }

    #[test]
    fn decode_body_handles_text_and_empty() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(
            decode_body("Removido com sucesso."),
            Value::String("Removido com sucesso.".to_string())
        );
        assert_eq!(decode_body("{\"a\":1}"), json!({"a": 1}));
    }

    #[test]
    fn status_errors_carry_backend_message() {
        let body = r#"{"status":404,"error":"Not Found","message":"Produto não encontrado com ID: 9","path":"/produtos/9"}"#;
        let err = error_from_status(404, body);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), Some("Produto não encontrado com ID: 9"));

        let err = error_from_status(502, "<html>bad gateway</html>");
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(err.message(), Some("request failed with status 502"));

        let err = error_from_status(400, "");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
