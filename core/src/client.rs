//! Request builders and typed calls for the grooming API.
//!
//! # Design
//! Every endpoint is split into a `build_*` method that produces an
//! `HttpRequest` descriptor and an async method that runs it through the
//! shared `Executor`. The builders are pure, so tests can check paths,
//! bodies and the `forceOverlap` flag without a server.
//!
//! The overlap override is always a query parameter, never a body field, so
//! the server can tell a first attempt from a forced write.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::classify;
use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorKind};
use crate::executor::Executor;
use crate::http::{HttpRequest, MultipartForm};
use crate::session::Session;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    Appointment, CreateAppointment, Credentials, LoginResponse, PetPhoto, RescheduleAppointment, UpdateAppointment,
};

pub const FORCE_OVERLAP_PARAM: &str = "forceOverlap";

/// Client for the grooming API. Cheap to clone; clones share the executor
/// and therefore the session.
pub struct ApiClient<T = ReqwestTransport> {
    executor: Arc<Executor<T>>,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl ApiClient<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Self {
        Self::from_executor(Executor::new(config, Session::new()))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn from_executor(executor: Executor<T>) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    pub fn executor(&self) -> &Executor<T> {
        &self.executor
    }

    pub fn session(&self) -> &Session {
        self.executor.session()
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest::post("/auth/login").json(to_json(credentials)?))
    }

    pub fn build_list_appointments(&self) -> HttpRequest {
        HttpRequest::get("/appointments")
    }

    pub fn build_get_appointment(&self, id: Uuid) -> HttpRequest {
        HttpRequest::get(format!("/appointments/{id}"))
    }

    pub fn build_create_appointment(
        &self,
        input: &CreateAppointment,
        force_overlap: bool,
    ) -> Result<HttpRequest, ApiError> {
        let req = HttpRequest::post("/appointments").json(to_json(input)?);
        Ok(with_override(req, force_overlap))
    }

    pub fn build_update_appointment(
        &self,
        id: Uuid,
        input: &UpdateAppointment,
        force_overlap: bool,
    ) -> Result<HttpRequest, ApiError> {
        let req = HttpRequest::put(format!("/appointments/{id}")).json(to_json(input)?);
        Ok(with_override(req, force_overlap))
    }

    pub fn build_reschedule_appointment(
        &self,
        id: Uuid,
        input: &RescheduleAppointment,
        force_overlap: bool,
    ) -> Result<HttpRequest, ApiError> {
        let req = HttpRequest::patch(format!("/appointments/{id}/reschedule")).json(to_json(input)?);
        Ok(with_override(req, force_overlap))
    }

    pub fn build_delete_appointment(&self, id: Uuid) -> HttpRequest {
        HttpRequest::delete(format!("/appointments/{id}"))
    }

    pub fn build_upload_pet_photo(&self, pet_id: Uuid, file_name: &str, mime: Option<&str>, bytes: Vec<u8>) -> HttpRequest {
        let form = MultipartForm::new().file("file", file_name, mime, bytes);
        HttpRequest::post(format!("/pets/{pet_id}/photo")).multipart(form)
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Exchange credentials for a token and store it in the session.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let res: LoginResponse = self.expect_body(self.build_login(credentials)?).await?;
        self.session().set_token(res.token);
        Ok(())
    }

    pub fn logout(&self) {
        self.session().clear();
    }

    pub async fn list_appointments(&self) -> Result<Vec<Appointment>, ApiError> {
        let list: Option<Vec<Appointment>> = self.executor.execute(self.build_list_appointments(), None).await?;
        Ok(list.unwrap_or_default())
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, ApiError> {
        self.expect_body(self.build_get_appointment(id)).await
    }

    pub async fn create_appointment(
        &self,
        input: &CreateAppointment,
        force_overlap: bool,
    ) -> Result<Appointment, ApiError> {
        self.expect_body(self.build_create_appointment(input, force_overlap)?).await
    }

    pub async fn update_appointment(
        &self,
        id: Uuid,
        input: &UpdateAppointment,
        force_overlap: bool,
    ) -> Result<Appointment, ApiError> {
        self.expect_body(self.build_update_appointment(id, input, force_overlap)?).await
    }

    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        input: &RescheduleAppointment,
        force_overlap: bool,
    ) -> Result<Appointment, ApiError> {
        self.expect_body(self.build_reschedule_appointment(id, input, force_overlap)?).await
    }

    pub async fn delete_appointment(&self, id: Uuid) -> Result<(), ApiError> {
        self.executor
            .execute::<serde_json::Value>(self.build_delete_appointment(id), None)
            .await
            .map(|_| ())
    }

    pub async fn upload_pet_photo(
        &self,
        pet_id: Uuid,
        file_name: &str,
        mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<PetPhoto, ApiError> {
        self.expect_body(self.build_upload_pet_photo(pet_id, file_name, mime, bytes)).await
    }

    async fn expect_body<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R, ApiError> {
        self.executor
            .execute(request, None)
            .await?
            .ok_or_else(|| ApiError::new(ErrorKind::Unknown, "expected a response body, got none"))
    }
}

fn to_json<S: Serialize>(value: &S) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| classify::serialization(&e))
}

fn with_override(req: HttpRequest, force_overlap: bool) -> HttpRequest {
    if force_overlap {
        req.query(FORCE_OVERLAP_PARAM, "true")
    } else {
        req
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MultipartPart, RequestBody};

    fn client() -> ApiClient {
        ApiClient::new(ClientConfig::new("http://localhost:3000"))
    }

    fn create_input() -> CreateAppointment {
        CreateAppointment {
            pet_id: Uuid::nil(),
            groomer_id: None,
            reason: "client cancelled".to_string(),
            start_at: "2024-01-01T10:00:00".parse().unwrap(),
            end_at: "2024-01-01T10:30:00".parse().unwrap(),
            notes: None,
        }
    }

    fn body_of(req: &HttpRequest) -> &serde_json::Value {
        match &req.body {
            Some(RequestBody::Json(v)) => v,
            other => panic!("expected JSON body, got {other:?}"),
        }
    }

    #[test]
    fn build_list_appointments_produces_correct_request() {
        let req = client().build_list_appointments();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "/appointments");
        assert!(req.body.is_none());
        assert!(req.query.is_empty());
    }

    #[test]
    fn build_create_without_override() {
        let req = client().build_create_appointment(&create_input(), false).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "/appointments");
        assert!(req.query.is_empty());
        assert_eq!(body_of(&req)["reason"], "client cancelled");
    }

    #[test]
    fn override_is_a_query_parameter_only() {
        let c = client();
        let first = c.build_create_appointment(&create_input(), false).unwrap();
        let forced = c.build_create_appointment(&create_input(), true).unwrap();
        assert_eq!(forced.query, vec![("forceOverlap".to_string(), "true".to_string())]);
        assert_eq!(body_of(&first), body_of(&forced));
        assert!(body_of(&forced).get("forceOverlap").is_none());
    }

    #[test]
    fn build_update_and_reschedule_paths() {
        let c = client();
        let id = Uuid::nil();
        let upd = c.build_update_appointment(id, &UpdateAppointment::default(), true).unwrap();
        assert_eq!(upd.method, HttpMethod::Put);
        assert_eq!(upd.path, "/appointments/00000000-0000-0000-0000-000000000000");

        let input = RescheduleAppointment {
            start_at: "2024-01-02T09:00:00".parse().unwrap(),
            end_at: "2024-01-02T10:00:00".parse().unwrap(),
            reason: "groomer sick".to_string(),
        };
        let res = c.build_reschedule_appointment(id, &input, false).unwrap();
        assert_eq!(res.method, HttpMethod::Patch);
        assert_eq!(res.path, "/appointments/00000000-0000-0000-0000-000000000000/reschedule");
        assert_eq!(body_of(&res)["startAt"], "2024-01-02T09:00:00");
    }

    #[test]
    fn build_delete_has_no_body() {
        let req = client().build_delete_appointment(Uuid::nil());
        assert_eq!(req.method, HttpMethod::Delete);
        assert!(req.body.is_none());
    }

    #[test]
    fn build_upload_is_multipart_without_content_type() {
        let req = client().build_upload_pet_photo(Uuid::nil(), "rex.jpg", Some("image/jpeg"), vec![1, 2, 3]);
        assert!(req.headers.is_empty());
        match req.body {
            Some(RequestBody::Multipart(form)) => {
                assert_eq!(form.parts.len(), 1);
                assert!(matches!(&form.parts[0], MultipartPart::File { name, .. } if name == "file"));
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn logout_clears_the_session() {
        let c = client();
        c.session().set_token("t");
        c.clone().logout();
        assert!(c.session().token().is_none());
    }
}
