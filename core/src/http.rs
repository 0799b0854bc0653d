//! HTTP request and response descriptors.
//!
//! # Design
//! Requests are described as plain data. `ApiClient` builds `HttpRequest`
//! values, the `Executor` resolves them against the configured base URL and
//! hands the result to a `Transport`. Keeping the descriptor free of any
//! client handle makes it easy to inspect in tests and to hold on to while a
//! conflict confirmation is pending.
//!
//! A request carries at most one body, and `Option<RequestBody>` makes the
//! three cases (none, JSON, multipart) mutually exclusive by construction.
//! `Some(RequestBody::Json(Value::Null))` is a real body that serializes to
//! the literal `null`; `None` sends nothing.

use std::time::Duration;

use serde_json::Value;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

/// A `multipart/form-data` payload. The boundary, and therefore the
/// `Content-Type` header, is chosen by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub parts: Vec<MultipartPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(MultipartPart::Text {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        self.parts.push(MultipartPart::File {
            name: name.to_string(),
            file_name: file_name.to_string(),
            mime: mime.map(str::to_string),
            bytes,
        });
        self
    }
}

/// Body of an `HttpRequest`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartForm),
}

/// An HTTP request described as plain data.
///
/// `path` is server-relative; the executor joins it to the configured base
/// URL. `timeout` falls back to the executor default when `None`, and
/// `credential` overrides the session token for this call only.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
    pub credential: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            credential: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn credential(mut self, token: &str) -> Self {
        self.credential = Some(token.to_string());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_and_multipart_replace_each_other() {
        let req = HttpRequest::post("/pets")
            .json(serde_json::json!({"name": "Rex"}))
            .multipart(MultipartForm::new().text("name", "Rex"));
        assert!(matches!(req.body, Some(RequestBody::Multipart(_))));
    }

    #[test]
    fn null_json_is_still_a_body() {
        let req = HttpRequest::put("/x").json(Value::Null);
        assert_eq!(req.body, Some(RequestBody::Json(Value::Null)));
        assert!(HttpRequest::put("/x").body.is_none());
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest::get("/").header("Content-Type", "text/plain");
        assert_eq!(req.header_value("content-type"), Some("text/plain"));
        assert_eq!(req.header_value("accept"), None);
    }

    #[test]
    fn method_names() {
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
        assert_eq!(HttpMethod::Delete.as_str(), "DELETE");
    }
}
