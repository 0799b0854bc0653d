use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_TOKEN: &str = "test-token";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "secret";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub pet_id: Uuid,
    pub groomer_id: Option<Uuid>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointment {
    pub pet_id: Uuid,
    pub groomer_id: Option<Uuid>,
    pub reason: Option<String>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointment {
    pub groomer_id: Option<Uuid>,
    pub reason: Option<String>,
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleAppointment {
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetPhoto {
    pub pet_id: Uuid,
    pub file_name: String,
    pub size: u64,
}

#[derive(Deserialize, Default)]
pub struct WriteParams {
    #[serde(default, rename = "forceOverlap")]
    pub force_overlap: bool,
}

/// One accepted or rejected scheduling write, kept so tests can compare
/// what the client sent on each attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteRecord {
    pub method: &'static str,
    pub path: String,
    pub forced: bool,
    pub body: Value,
    pub status: u16,
}

/// Error body in the shape the client expects: `{"code": ..., "message": ...}`.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing or invalid bearer token")
    }

    fn not_found(id: Uuid) -> Self {
        Self::new(StatusCode::NOT_FOUND, "APPOINTMENT_NOT_FOUND", format!("appointment {id} does not exist"))
    }

    fn overlap() -> Self {
        Self::new(StatusCode::CONFLICT, "APPOINTMENT_OVERLAP", "appointment overlaps an existing booking")
    }

    fn invalid(code: &'static str, message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "code": self.code, "message": self.message }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    token: Arc<String>,
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
    photos: Arc<RwLock<HashMap<Uuid, PetPhoto>>>,
    writes: Arc<RwLock<Vec<WriteRecord>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_token(DEFAULT_TOKEN)
    }
}

impl AppState {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Arc::new(token.to_string()),
            appointments: Arc::default(),
            photos: Arc::default(),
            writes: Arc::default(),
        }
    }

    /// Scheduling writes in arrival order.
    pub async fn write_log(&self) -> Vec<WriteRecord> {
        self.writes.read().await.clone()
    }

    /// Insert an appointment directly, bypassing auth and overlap checks.
    pub async fn seed(&self, appointment: Appointment) {
        self.appointments.write().await.insert(appointment.id, appointment);
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiFailure> {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match presented {
            Some(token) if token == self.token.as_str() => Ok(()),
            _ => Err(ApiFailure::unauthorized()),
        }
    }

    async fn record(&self, method: &'static str, path: String, forced: bool, body: Value, status: StatusCode) {
        info!(method, %path, forced, status = status.as_u16(), "scheduling write");
        self.writes.write().await.push(WriteRecord {
            method,
            path,
            forced,
            body,
            status: status.as_u16(),
        });
    }
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{id}",
            get(get_appointment).put(update_appointment).delete(delete_appointment),
        )
        .route("/appointments/{id}/reschedule", patch(reschedule_appointment))
        .route("/pets/{id}/photo", post(upload_pet_photo))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

/// Two scheduled bookings clash when they share a pet or a groomer and
/// their time ranges intersect.
fn overlaps(a: &Appointment, b: &Appointment) -> bool {
    let shares_resource = a.pet_id == b.pet_id || (a.groomer_id.is_some() && a.groomer_id == b.groomer_id);
    a.id != b.id
        && a.status == AppointmentStatus::Scheduled
        && b.status == AppointmentStatus::Scheduled
        && shares_resource
        && a.start_at < b.end_at
        && b.start_at < a.end_at
}

fn check_range(start: NaiveDateTime, end: NaiveDateTime) -> Result<(), ApiFailure> {
    if start >= end {
        return Err(ApiFailure::invalid("INVALID_RANGE", "endAt must be after startAt"));
    }
    Ok(())
}

fn check_overlap(
    existing: &HashMap<Uuid, Appointment>,
    candidate: &Appointment,
    force_overlap: bool,
) -> Result<(), ApiFailure> {
    if !force_overlap && existing.values().any(|other| overlaps(candidate, other)) {
        return Err(ApiFailure::overlap());
    }
    Ok(())
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<Credentials>,
) -> Result<Json<Value>, ApiFailure> {
    if input.username == DEFAULT_USERNAME && input.password == DEFAULT_PASSWORD {
        Ok(Json(json!({ "token": state.token.as_str() })))
    } else {
        Err(ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "BAD_CREDENTIALS",
            "invalid username or password",
        ))
    }
}

async fn list_appointments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Appointment>>, ApiFailure> {
    state.authorize(&headers)?;
    let appointments = state.appointments.read().await;
    let mut list: Vec<Appointment> = appointments.values().cloned().collect();
    list.sort_by_key(|a| a.start_at);
    Ok(Json(list))
}

async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Appointment>, ApiFailure> {
    state.authorize(&headers)?;
    let appointments = state.appointments.read().await;
    appointments.get(&id).cloned().map(Json).ok_or_else(|| ApiFailure::not_found(id))
}

async fn create_appointment(
    State(state): State<AppState>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Appointment>), ApiFailure> {
    state.authorize(&headers)?;
    let result = try_create(&state, &body, params.force_overlap).await;
    let status = result.as_ref().map(|_| StatusCode::CREATED).unwrap_or_else(|e| e.status);
    state
        .record("POST", "/appointments".to_string(), params.force_overlap, body, status)
        .await;
    result.map(|a| (StatusCode::CREATED, Json(a)))
}

async fn try_create(state: &AppState, body: &Value, force_overlap: bool) -> Result<Appointment, ApiFailure> {
    let input: CreateAppointment = serde_json::from_value(body.clone())
        .map_err(|e| ApiFailure::invalid("INVALID_BODY", &e.to_string()))?;
    check_range(input.start_at, input.end_at)?;

    let appointment = Appointment {
        id: Uuid::new_v4(),
        pet_id: input.pet_id,
        groomer_id: input.groomer_id,
        start_at: input.start_at,
        end_at: input.end_at,
        reason: input.reason,
        notes: input.notes,
        status: AppointmentStatus::Scheduled,
    };

    let mut appointments = state.appointments.write().await;
    check_overlap(&appointments, &appointment, force_overlap)?;
    appointments.insert(appointment.id, appointment.clone());
    Ok(appointment)
}

async fn update_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Appointment>, ApiFailure> {
    state.authorize(&headers)?;
    let result = try_update(&state, id, &body, params.force_overlap).await;
    let status = result.as_ref().map(|_| StatusCode::OK).unwrap_or_else(|e| e.status);
    state
        .record("PUT", format!("/appointments/{id}"), params.force_overlap, body, status)
        .await;
    result.map(Json)
}

async fn try_update(state: &AppState, id: Uuid, body: &Value, force_overlap: bool) -> Result<Appointment, ApiFailure> {
    let input: UpdateAppointment = serde_json::from_value(body.clone())
        .map_err(|e| ApiFailure::invalid("INVALID_BODY", &e.to_string()))?;

    let mut appointments = state.appointments.write().await;
    let mut updated = appointments.get(&id).cloned().ok_or_else(|| ApiFailure::not_found(id))?;
    if let Some(groomer_id) = input.groomer_id {
        updated.groomer_id = Some(groomer_id);
    }
    if let Some(reason) = input.reason {
        updated.reason = Some(reason);
    }
    if let Some(start_at) = input.start_at {
        updated.start_at = start_at;
    }
    if let Some(end_at) = input.end_at {
        updated.end_at = end_at;
    }
    if let Some(notes) = input.notes {
        updated.notes = Some(notes);
    }
    if let Some(status) = input.status {
        updated.status = status;
    }
    check_range(updated.start_at, updated.end_at)?;
    check_overlap(&appointments, &updated, force_overlap)?;
    appointments.insert(id, updated.clone());
    Ok(updated)
}

async fn reschedule_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Appointment>, ApiFailure> {
    state.authorize(&headers)?;
    let result = try_reschedule(&state, id, &body, params.force_overlap).await;
    let status = result.as_ref().map(|_| StatusCode::OK).unwrap_or_else(|e| e.status);
    state
        .record(
            "PATCH",
            format!("/appointments/{id}/reschedule"),
            params.force_overlap,
            body,
            status,
        )
        .await;
    result.map(Json)
}

async fn try_reschedule(
    state: &AppState,
    id: Uuid,
    body: &Value,
    force_overlap: bool,
) -> Result<Appointment, ApiFailure> {
    let input: RescheduleAppointment = serde_json::from_value(body.clone())
        .map_err(|e| ApiFailure::invalid("INVALID_BODY", &e.to_string()))?;
    if input.reason.trim().is_empty() {
        return Err(ApiFailure::invalid("REASON_REQUIRED", "a reason is required to reschedule"));
    }
    check_range(input.start_at, input.end_at)?;

    let mut appointments = state.appointments.write().await;
    let mut updated = appointments.get(&id).cloned().ok_or_else(|| ApiFailure::not_found(id))?;
    updated.start_at = input.start_at;
    updated.end_at = input.end_at;
    updated.reason = Some(input.reason);
    check_overlap(&appointments, &updated, force_overlap)?;
    appointments.insert(id, updated.clone());
    Ok(updated)
}

async fn delete_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiFailure> {
    state.authorize(&headers)?;
    let mut appointments = state.appointments.write().await;
    appointments
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| ApiFailure::not_found(id))
}

async fn upload_pet_photo(
    State(state): State<AppState>,
    Path(pet_id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PetPhoto>), ApiFailure> {
    state.authorize(&headers)?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiFailure::invalid("INVALID_MULTIPART", &e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiFailure::invalid("INVALID_MULTIPART", &e.to_string()))?;
        let photo = PetPhoto {
            pet_id,
            file_name,
            size: bytes.len() as u64,
        };
        state.photos.write().await.insert(pet_id, photo.clone());
        return Ok((StatusCode::CREATED, Json(photo)));
    }
    Err(ApiFailure::invalid("FILE_REQUIRED", "multipart field `file` is required"))
}
