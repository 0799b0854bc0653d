//! Conflict-confirmation workflow for writes that may hit a 409.
//!
//! # Design
//! A write is attempted once without the override. If the server answers
//! with a business-rule conflict, the exact payload is parked in
//! `WorkflowState::ConflictPending` until the user either confirms (the same
//! payload is resubmitted with `force_overlap = true`) or cancels (the
//! payload is dropped). Only one confirmation cycle is allowed: a conflict
//! on the forced resubmission is reported as an ordinary failure.
//!
//! Forms plug in through `ConflictForm`, which supplies validation and the
//! actual call. The state machine itself is shared by every form.
//!
//! ```text
//! Idle --submit--> Submitting --ok--> Done
//!                       |--409--> ConflictPending --cancel--> Idle
//!                       |--err--> Idle        |
//!                                             confirm
//!                                             v
//!                                  ConfirmedSubmitting --ok--> Done
//!                                             |--err (incl. 409)--> Idle
//! ```

use std::future::Future;

use thiserror::Error;
use tracing::{debug, info};

use crate::error::ApiError;

/// A client-side validation failure on one field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct FormError {
    pub field: &'static str,
    pub reason: String,
}

impl FormError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Misuse of the workflow. None of these make a network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("a submission is already in progress")]
    Busy,

    #[error("a conflict is awaiting confirmation; confirm or cancel it first")]
    AwaitingConfirmation,

    #[error("nothing is awaiting confirmation")]
    NothingPending,

    #[error("the workflow has already completed")]
    Finished,

    #[error("invalid input: {0}")]
    Invalid(#[from] FormError),
}

/// Per-form behaviour plugged into `ConflictWorkflow`.
pub trait ConflictForm: Send + Sync {
    type Payload: Clone + Send + Sync;
    type Output: Send;

    /// Checked before the first attempt only; the confirmed resubmission
    /// reuses a payload that already passed.
    fn validate(&self, payload: &Self::Payload) -> Result<(), FormError>;

    /// Perform the write. `force_overlap` must travel outside the payload.
    fn submit(
        &self,
        payload: &Self::Payload,
        force_overlap: bool,
    ) -> impl Future<Output = Result<Self::Output, ApiError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState<P> {
    Idle,
    Submitting,
    ConflictPending(P),
    ConfirmedSubmitting,
    Done,
}

/// What a `submit` or `confirm` call ended with.
#[derive(Debug)]
pub enum Submission<R> {
    Done(R),
    /// The server reported a conflict; the payload is held for confirmation.
    ConflictPending(ApiError),
    /// Any other failure. The workflow is back to `Idle`.
    Failed(ApiError),
}

pub struct ConflictWorkflow<F: ConflictForm> {
    form: F,
    state: WorkflowState<F::Payload>,
    last_error: Option<ApiError>,
}

impl<F: ConflictForm> ConflictWorkflow<F> {
    pub fn new(form: F) -> Self {
        Self {
            form,
            state: WorkflowState::Idle,
            last_error: None,
        }
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn state(&self) -> &WorkflowState<F::Payload> {
        &self.state
    }

    /// The payload awaiting confirmation, if any.
    pub fn pending_payload(&self) -> Option<&F::Payload> {
        match &self.state {
            WorkflowState::ConflictPending(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, WorkflowState::Submitting | WorkflowState::ConfirmedSubmitting)
    }

    /// The error from the most recent attempt, for display.
    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    /// First attempt, without the override.
    pub async fn submit(&mut self, payload: F::Payload) -> Result<Submission<F::Output>, WorkflowError> {
        match self.state {
            WorkflowState::Idle => {}
            WorkflowState::Submitting | WorkflowState::ConfirmedSubmitting => return Err(WorkflowError::Busy),
            WorkflowState::ConflictPending(_) => return Err(WorkflowError::AwaitingConfirmation),
            WorkflowState::Done => return Err(WorkflowError::Finished),
        }
        self.form.validate(&payload)?;

        self.last_error = None;
        self.state = WorkflowState::Submitting;
        debug!("submitting");

        match self.form.submit(&payload, false).await {
            Ok(output) => {
                self.state = WorkflowState::Done;
                Ok(Submission::Done(output))
            }
            Err(err) if err.is_conflict() => {
                info!(code = ?err.code, "conflict reported, awaiting confirmation");
                self.state = WorkflowState::ConflictPending(payload);
                self.last_error = Some(err.clone());
                Ok(Submission::ConflictPending(err))
            }
            Err(err) => Ok(self.fail(err)),
        }
    }

    /// Resubmit the pending payload with the override set.
    pub async fn confirm(&mut self) -> Result<Submission<F::Output>, WorkflowError> {
        let payload = match &self.state {
            WorkflowState::ConflictPending(payload) => payload.clone(),
            WorkflowState::Idle => return Err(WorkflowError::NothingPending),
            WorkflowState::Submitting | WorkflowState::ConfirmedSubmitting => return Err(WorkflowError::Busy),
            WorkflowState::Done => return Err(WorkflowError::Finished),
        };

        self.last_error = None;
        self.state = WorkflowState::ConfirmedSubmitting;
        info!("conflict confirmed, resubmitting with override");

        match self.form.submit(&payload, true).await {
            Ok(output) => {
                self.state = WorkflowState::Done;
                Ok(Submission::Done(output))
            }
            Err(err) => Ok(self.fail(err)),
        }
    }

    /// Drop the pending payload without calling the server.
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        match self.state {
            WorkflowState::ConflictPending(_) => {
                debug!("conflict cancelled");
                self.state = WorkflowState::Idle;
                self.last_error = None;
                Ok(())
            }
            WorkflowState::Submitting | WorkflowState::ConfirmedSubmitting => Err(WorkflowError::Busy),
            WorkflowState::Idle => Err(WorkflowError::NothingPending),
            WorkflowState::Done => Err(WorkflowError::Finished),
        }
    }

    /// Force the workflow back to `Idle`. Needed only when a `submit` or
    /// `confirm` future was dropped before it finished.
    pub fn reset(&mut self) {
        self.state = WorkflowState::Idle;
        self.last_error = None;
    }

    fn fail(&mut self, err: ApiError) -> Submission<F::Output> {
        debug!(kind = %err.kind, "submission failed");
        self.state = WorkflowState::Idle;
        self.last_error = Some(err.clone());
        Submission::Failed(err)
    }
}
