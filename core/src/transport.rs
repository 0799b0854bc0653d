//! Network layer used by the executor.
//!
//! # Design
//! The executor resolves a request into an `OutgoingRequest` (absolute URL,
//! final headers, encoded body) and hands it to a `Transport`. The transport
//! only moves bytes: it does not classify statuses, apply timeouts or touch
//! the session. `ReqwestTransport` is the production implementation; tests
//! substitute their own to observe exactly what would go on the wire.

use std::future::Future;

use thiserror::Error;

use crate::http::{HttpMethod, HttpResponse, MultipartForm, MultipartPart};

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: OutgoingBody,
}

impl OutgoingRequest {
    pub fn header_value(&self, name: &str) -> Option<&str> {
        crate::http::find_header(&self.headers, name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingBody {
    Empty,
    Bytes(Vec<u8>),
    /// Encoded by the transport, which also picks the boundary.
    Multipart(MultipartForm),
}

/// No response was received.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: OutgoingRequest) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: OutgoingRequest) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let client = self.client.clone();
        async move {
            let mut builder = client.request(to_reqwest_method(request.method), &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder = match request.body {
                OutgoingBody::Empty => builder,
                OutgoingBody::Bytes(bytes) => builder.body(bytes),
                OutgoingBody::Multipart(form) => builder.multipart(to_reqwest_form(form)?),
            };

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
                .collect();
            let body = response.bytes().await?.to_vec();

            Ok(HttpResponse { status, headers, body })
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, TransportError> {
    let mut out = reqwest::multipart::Form::new();
    for part in form.parts {
        out = match part {
            MultipartPart::Text { name, value } => out.text(name, value),
            MultipartPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let mut p = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                if let Some(mime) = mime {
                    p = p.mime_str(&mime)?;
                }
                out.part(name, p)
            }
        };
    }
    Ok(out)
}
