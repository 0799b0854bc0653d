//! The appointment forms that go through the conflict workflow.
//!
//! Each form contributes its validation rules and the endpoint it writes to;
//! everything else comes from `ConflictWorkflow`.

use std::future::Future;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Appointment, CreateAppointment, RescheduleAppointment, UpdateAppointment};
use crate::workflow::{ConflictForm, ConflictWorkflow, FormError};

pub type CreateAppointmentWorkflow<T = ReqwestTransport> = ConflictWorkflow<CreateAppointmentForm<T>>;
pub type UpdateAppointmentWorkflow<T = ReqwestTransport> = ConflictWorkflow<UpdateAppointmentForm<T>>;
pub type RescheduleAppointmentWorkflow<T = ReqwestTransport> = ConflictWorkflow<RescheduleAppointmentForm<T>>;

fn require_text(field: &'static str, value: &str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        return Err(FormError::new(field, "is required"));
    }
    Ok(())
}

fn require_order(start: NaiveDateTime, end: NaiveDateTime) -> Result<(), FormError> {
    if start >= end {
        return Err(FormError::new("endAt", "must be after startAt"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

pub struct CreateAppointmentForm<T = ReqwestTransport> {
    client: ApiClient<T>,
}

impl<T: Transport> CreateAppointmentForm<T> {
    pub fn new(client: ApiClient<T>) -> Self {
        Self { client }
    }

    pub fn workflow(client: ApiClient<T>) -> CreateAppointmentWorkflow<T> {
        ConflictWorkflow::new(Self::new(client))
    }
}

impl<T: Transport> ConflictForm for CreateAppointmentForm<T> {
    type Payload = CreateAppointment;
    type Output = Appointment;

    fn validate(&self, payload: &CreateAppointment) -> Result<(), FormError> {
        require_text("reason", &payload.reason)?;
        require_order(payload.start_at, payload.end_at)
    }

    fn submit(
        &self,
        payload: &CreateAppointment,
        force_overlap: bool,
    ) -> impl Future<Output = Result<Appointment, ApiError>> + Send {
        self.client.create_appointment(payload, force_overlap)
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

pub struct UpdateAppointmentForm<T = ReqwestTransport> {
    client: ApiClient<T>,
    id: Uuid,
}

impl<T: Transport> UpdateAppointmentForm<T> {
    pub fn new(client: ApiClient<T>, id: Uuid) -> Self {
        Self { client, id }
    }

    pub fn workflow(client: ApiClient<T>, id: Uuid) -> UpdateAppointmentWorkflow<T> {
        ConflictWorkflow::new(Self::new(client, id))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<T: Transport> ConflictForm for UpdateAppointmentForm<T> {
    type Payload = UpdateAppointment;
    type Output = Appointment;

    fn validate(&self, payload: &UpdateAppointment) -> Result<(), FormError> {
        if let Some(reason) = &payload.reason {
            require_text("reason", reason)?;
        }
        match (payload.start_at, payload.end_at) {
            (Some(start), Some(end)) => require_order(start, end),
            _ => Ok(()),
        }
    }

    fn submit(
        &self,
        payload: &UpdateAppointment,
        force_overlap: bool,
    ) -> impl Future<Output = Result<Appointment, ApiError>> + Send {
        self.client.update_appointment(self.id, payload, force_overlap)
    }
}

// ---------------------------------------------------------------------------
// Reschedule
// ---------------------------------------------------------------------------

pub struct RescheduleAppointmentForm<T = ReqwestTransport> {
    client: ApiClient<T>,
    id: Uuid,
}

impl<T: Transport> RescheduleAppointmentForm<T> {
    pub fn new(client: ApiClient<T>, id: Uuid) -> Self {
        Self { client, id }
    }

    pub fn workflow(client: ApiClient<T>, id: Uuid) -> RescheduleAppointmentWorkflow<T> {
        ConflictWorkflow::new(Self::new(client, id))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<T: Transport> ConflictForm for RescheduleAppointmentForm<T> {
    type Payload = RescheduleAppointment;
    type Output = Appointment;

    fn validate(&self, payload: &RescheduleAppointment) -> Result<(), FormError> {
        require_text("reason", &payload.reason)?;
        require_order(payload.start_at, payload.end_at)
    }

    fn submit(
        &self,
        payload: &RescheduleAppointment,
        force_overlap: bool,
    ) -> impl Future<Output = Result<Appointment, ApiError>> + Send {
        self.client.reschedule_appointment(self.id, payload, force_overlap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn client() -> ApiClient {
        ApiClient::new(ClientConfig::new("http://localhost:3000"))
    }

    fn at(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    #[test]
    fn create_requires_reason_and_order() {
        let form = CreateAppointmentForm::new(client());
        let mut input = CreateAppointment {
            pet_id: Uuid::nil(),
            groomer_id: None,
            reason: "  ".to_string(),
            start_at: at("2024-01-01T10:00:00"),
            end_at: at("2024-01-01T10:30:00"),
            notes: None,
        };
        assert_eq!(form.validate(&input).unwrap_err().field, "reason");

        input.reason = "bath".to_string();
        assert!(form.validate(&input).is_ok());

        input.end_at = input.start_at;
        assert_eq!(form.validate(&input).unwrap_err().field, "endAt");
    }

    #[test]
    fn update_checks_order_only_when_both_times_change() {
        let form = UpdateAppointmentForm::new(client(), Uuid::nil());
        let only_start = UpdateAppointment {
            start_at: Some(at("2024-01-01T12:00:00")),
            ..Default::default()
        };
        assert!(form.validate(&only_start).is_ok());

        let reversed = UpdateAppointment {
            start_at: Some(at("2024-01-01T12:00:00")),
            end_at: Some(at("2024-01-01T11:00:00")),
            ..Default::default()
        };
        assert_eq!(form.validate(&reversed).unwrap_err().field, "endAt");
    }

    #[test]
    fn reschedule_requires_a_reason() {
        let form = RescheduleAppointmentForm::new(client(), Uuid::nil());
        let input = RescheduleAppointment {
            start_at: at("2024-01-02T09:00:00"),
            end_at: at("2024-01-02T10:00:00"),
            reason: String::new(),
        };
        let err = form.validate(&input).unwrap_err();
        assert_eq!(err, FormError::new("reason", "is required"));
        assert_eq!(err.to_string(), "reason: is required");
    }
}
