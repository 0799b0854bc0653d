//! API client core for the pet-grooming service.
//!
//! # Overview
//! `ApiClient` builds `HttpRequest` descriptors for each endpoint and runs
//! them through an `Executor`, which attaches the session's bearer token,
//! applies the timeout, and turns every failure into a classified
//! `ApiError`. Writes that can be rejected with an overlap conflict
//! (create, update and reschedule appointment) go through
//! `ConflictWorkflow`, which parks the payload on a 409 and resubmits it with
//! `forceOverlap=true` once the user confirms.
//!
//! # Design
//! - HTTP statuses are inspected in exactly one place (`Executor::execute`);
//!   everything above it branches on `ErrorKind`.
//! - The session token is shared state behind `Session`. A 401 clears it
//!   and publishes `SessionEvent::Unauthorized` instead of calling into
//!   navigation code.
//! - `Transport` is the I/O seam. `ReqwestTransport` is the default; tests
//!   plug in fakes to observe the outgoing request.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod forms;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;
pub mod workflow;

pub use client::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, ErrorDetails, ErrorKind};
pub use executor::Executor;
pub use forms::{
    CreateAppointmentForm, CreateAppointmentWorkflow, RescheduleAppointmentForm, RescheduleAppointmentWorkflow,
    UpdateAppointmentForm, UpdateAppointmentWorkflow,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, MultipartPart, RequestBody};
pub use session::{MemoryTokenStore, Session, SessionEvent, TokenStore};
pub use transport::{OutgoingBody, OutgoingRequest, ReqwestTransport, Transport, TransportError};
pub use types::{
    Appointment, AppointmentStatus, CreateAppointment, Credentials, LoginResponse, PetPhoto, RescheduleAppointment,
    UpdateAppointment,
};
pub use workflow::{ConflictForm, ConflictWorkflow, FormError, Submission, WorkflowError, WorkflowState};
