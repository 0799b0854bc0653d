//! Typed request executor.
//!
//! # Design
//! `Executor` turns an `HttpRequest` descriptor into one network call and
//! returns either the decoded JSON body or a classified `ApiError`. It is
//! the only place where HTTP statuses are inspected.
//!
//! Each call races three futures: the transport, a timer for the request's
//! timeout budget and the caller's `CancellationToken`. Whichever finishes
//! first wins and the others are dropped, so the timer is released on every
//! exit path.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, RequestBody};
use crate::session::Session;
use crate::transport::{OutgoingBody, OutgoingRequest, ReqwestTransport, Transport};

const CONTENT_TYPE: &str = "Content-Type";
const AUTHORIZATION: &str = "Authorization";
const JSON_MIME: &str = "application/json";

pub struct Executor<T = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
    session: Session,
}

impl Executor<ReqwestTransport> {
    pub fn new(config: ClientConfig, session: Session) -> Self {
        Self::with_transport(config, ReqwestTransport::new(), session)
    }
}

impl<T: Transport> Executor<T> {
    pub fn with_transport(config: ClientConfig, transport: T, session: Session) -> Self {
        Self {
            config,
            transport,
            session,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Join the base URL and `path` with exactly one slash, then append the
    /// URL-encoded query string.
    pub fn resolve_url(&self, path: &str, query: &[(String, String)]) -> String {
        let mut url = format!("{}/{}", self.config.base_url, path.trim_start_matches('/'));
        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }

    /// Resolve URL, headers, credentials and body without sending anything.
    pub fn prepare(&self, request: &HttpRequest) -> Result<OutgoingRequest, ApiError> {
        let url = self.resolve_url(&request.path, &request.query);
        let mut headers = request.headers.clone();

        let body = match &request.body {
            None => OutgoingBody::Empty,
            Some(RequestBody::Json(value)) => {
                if request.header_value(CONTENT_TYPE).is_none() {
                    headers.push((CONTENT_TYPE.to_string(), JSON_MIME.to_string()));
                }
                let bytes = serde_json::to_vec(value).map_err(|e| classify::serialization(&e))?;
                OutgoingBody::Bytes(bytes)
            }
            Some(RequestBody::Multipart(form)) => {
                // The boundary belongs in the header, and only the transport knows it.
                headers.retain(|(name, _)| {
                    let keep = !name.eq_ignore_ascii_case(CONTENT_TYPE);
                    if !keep {
                        debug!(path = %request.path, "dropping caller Content-Type on multipart body");
                    }
                    keep
                });
                OutgoingBody::Multipart(form.clone())
            }
        };

        if let Some(token) = request.credential.clone().or_else(|| self.session.token()) {
            headers.push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
        }

        Ok(OutgoingRequest {
            method: request.method,
            url,
            headers,
            body,
        })
    }

    /// Execute `request` and decode the response as `R`.
    ///
    /// Returns `Ok(None)` for 204 and for 2xx responses whose body is empty,
    /// not JSON, or `null`. Every failure is returned as a classified
    /// `ApiError`; a 401 additionally expires the session.
    pub async fn execute<R: DeserializeOwned>(
        &self,
        request: HttpRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<R>, ApiError> {
        let outgoing = self.prepare(&request)?;
        let timeout = request.timeout.unwrap_or(self.config.timeout);
        let method = outgoing.method.as_str();
        let url = outgoing.url.clone();
        let caller = cancel.cloned().unwrap_or_default();

        debug!(method, %url, "sending request");

        let result = tokio::select! {
            res = self.transport.send(outgoing) => res.map_err(|e| classify::from_transport(&e)),
            _ = tokio::time::sleep(timeout) => Err(classify::timeout(timeout)),
            _ = caller.cancelled() => Err(classify::cancelled()),
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(method, %url, error = %err, "no response");
                return Err(err);
            }
        };

        if !response.is_success() {
            if response.status == 401 {
                self.session.expire();
            }
            let err = classify::from_response(response.status, &response.body);
            warn!(method, %url, status = response.status, kind = %err.kind, "request failed");
            return Err(err);
        }

        debug!(method, %url, status = response.status, "request succeeded");
        if response.status == 204 {
            return Ok(None);
        }
        decode_body(response.status, &response.body)
    }
}

fn decode_body<R: DeserializeOwned>(status: u16, body: &[u8]) -> Result<Option<R>, ApiError> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| classify::unexpected_body(status, &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::MultipartForm;

    struct NoTransport;

    impl Transport for NoTransport {
        fn send(
            &self,
            _request: OutgoingRequest,
        ) -> impl std::future::Future<Output = Result<crate::http::HttpResponse, crate::transport::TransportError>> + Send
        {
            std::future::pending()
        }
    }

    fn executor(base: &str) -> Executor<NoTransport> {
        Executor::with_transport(ClientConfig::new(base), NoTransport, Session::new())
    }

    #[test]
    fn url_has_exactly_one_slash() {
        let e = executor("http://localhost:3000/api/");
        assert_eq!(e.resolve_url("appointments", &[]), "http://localhost:3000/api/appointments");
        assert_eq!(e.resolve_url("/appointments", &[]), "http://localhost:3000/api/appointments");
        assert_eq!(e.resolve_url("//appointments", &[]), "http://localhost:3000/api/appointments");
    }

    #[test]
    fn query_is_encoded() {
        let e = executor("http://h");
        let q = vec![
            ("forceOverlap".to_string(), "true".to_string()),
            ("q".to_string(), "a b&c".to_string()),
        ];
        assert_eq!(e.resolve_url("/x", &q), "http://h/x?forceOverlap=true&q=a+b%26c");
    }

    #[test]
    fn json_body_gets_content_type() {
        let out = executor("http://h").prepare(&HttpRequest::post("/x").json(serde_json::json!({"a": 1}))).unwrap();
        assert_eq!(out.header_value("content-type"), Some(JSON_MIME));
        assert_eq!(out.body, OutgoingBody::Bytes(br#"{"a":1}"#.to_vec()));
    }

    #[test]
    fn caller_content_type_is_kept_for_json() {
        let req = HttpRequest::post("/x")
            .header("content-type", "application/merge-patch+json")
            .json(serde_json::json!({}));
        let out = executor("http://h").prepare(&req).unwrap();
        let values: Vec<_> = out.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case(CONTENT_TYPE)).collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].1, "application/merge-patch+json");
    }

    #[test]
    fn null_json_is_sent_as_literal_null() {
        let out = executor("http://h").prepare(&HttpRequest::put("/x").json(Value::Null)).unwrap();
        assert_eq!(out.body, OutgoingBody::Bytes(b"null".to_vec()));
        assert_eq!(out.header_value(CONTENT_TYPE), Some(JSON_MIME));
    }

    #[test]
    fn absent_body_has_no_content_type() {
        let out = executor("http://h").prepare(&HttpRequest::post("/x")).unwrap();
        assert_eq!(out.body, OutgoingBody::Empty);
        assert!(out.header_value(CONTENT_TYPE).is_none());
    }

    #[test]
    fn multipart_never_gets_content_type() {
        let form = MultipartForm::new().file("file", "rex.png", Some("image/png"), vec![0x89, 0x50]);
        let req = HttpRequest::post("/pets/1/photo")
            .header("Content-Type", "multipart/form-data")
            .multipart(form.clone());
        let out = executor("http://h").prepare(&req).unwrap();
        assert!(out.header_value(CONTENT_TYPE).is_none());
        assert_eq!(out.body, OutgoingBody::Multipart(form));
    }

    #[test]
    fn explicit_credential_beats_session_token() {
        let e = executor("http://h");
        e.session().set_token("ambient");
        let out = e.prepare(&HttpRequest::get("/x")).unwrap();
        assert_eq!(out.header_value(AUTHORIZATION), Some("Bearer ambient"));
        let out = e.prepare(&HttpRequest::get("/x").credential("explicit")).unwrap();
        assert_eq!(out.header_value(AUTHORIZATION), Some("Bearer explicit"));
    }

    #[test]
    fn no_token_no_authorization() {
        let out = executor("http://h").prepare(&HttpRequest::get("/x")).unwrap();
        assert!(out.header_value(AUTHORIZATION).is_none());
    }

    #[test]
    fn decode_tolerates_empty_and_invalid_bodies() {
        assert_eq!(decode_body::<Value>(200, b"").unwrap(), None);
        assert_eq!(decode_body::<Value>(200, b"not json").unwrap(), None);
        assert_eq!(decode_body::<Value>(200, b"null").unwrap(), None);
        assert_eq!(decode_body::<u32>(200, b"7").unwrap(), Some(7));
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        let err = decode_body::<u32>(200, br#"{"a":1}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.status, Some(200));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_network_error() {
        let e = executor("http://h");
        let err = e
            .execute::<Value>(HttpRequest::get("/slow").timeout(std::time::Duration::from_millis(50)), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.status.is_none());
        assert!(err.message.contains("timed out"));
    }

    #[tokio::test]
    async fn caller_cancellation_aborts() {
        let e = executor("http://h");
        let token = CancellationToken::new();
        token.cancel();
        let err = e.execute::<Value>(HttpRequest::get("/x"), Some(&token)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.message, "request was cancelled");
    }
}
