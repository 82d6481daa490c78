//! OnboardingController owns one flow's state, persists the profile on
//! completion, and tells the host when onboarding is done.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::{OnboardingError, PersistenceError};
use crate::store::ProfileStore;

use super::model::{DraftField, IdentityMetadata, ProfileDraft, ProfileRecord, ProfileUpdate, Role};
use super::resume::{ResumeAuthoring, ResumeFile, ResumeSelection};
use super::state::{CompletionIntent, OnboardingState, OnboardingStep, StepAction, Transition};
use super::validator;

/// Default bound on the completion-time store call.
pub const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Collaborators a flow needs.
#[derive(Clone)]
pub struct OnboardingDeps {
    pub store: Arc<dyn ProfileStore>,
    /// Resume-builder hand-off. `None` skips the hand-off.
    pub authoring: Option<Arc<dyn ResumeAuthoring>>,
    pub persist_timeout: Duration,
}

impl OnboardingDeps {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            authoring: None,
            persist_timeout: DEFAULT_PERSIST_TIMEOUT,
        }
    }

    pub fn with_authoring(mut self, authoring: Arc<dyn ResumeAuthoring>) -> Self {
        self.authoring = Some(authoring);
        self
    }

    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }
}

/// Lifecycle of a flow as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    InProgress,
    /// Completion request in flight; the completing control is disabled.
    Saving,
    Completed,
    Abandoned,
}

/// Everything a caller needs to render the current step.
#[derive(Debug, Clone, Serialize)]
pub struct FlowView {
    pub user_id: String,
    pub role: Role,
    pub status: FlowStatus,
    pub step: OnboardingStep,
    pub step_number: usize,
    pub total_steps: usize,
    pub progress_percent: u8,
    pub draft: ProfileDraft,
    pub missing_fields: Vec<DraftField>,
    pub resume: ResumeSelection,
    pub available_actions: Vec<StepAction>,
}

/// Result of a successful completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub intent: CompletionIntent,
    pub profile: ProfileRecord,
    pub resume: ResumeSelection,
    /// Whether the resume-authoring hand-off was accepted.
    pub handed_off: bool,
}

/// What `advance` did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Step(FlowView),
    Completed(CompletionOutcome),
}

/// Clears the in-flight flag when a completion attempt ends, including when
/// the attempt's future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one onboarding flow for one user.
pub struct OnboardingController {
    user_id: String,
    role: Role,
    deps: OnboardingDeps,
    /// `None` once the flow has completed or been abandoned.
    state: Mutex<Option<OnboardingState>>,
    in_flight: AtomicBool,
    status: watch::Sender<FlowStatus>,
}

impl OnboardingController {
    /// Start a flow. Fails if the user's stored profile is already onboarded.
    pub async fn start(
        user_id: impl Into<String>,
        role: Role,
        identity: &IdentityMetadata,
        deps: OnboardingDeps,
    ) -> Result<Self, OnboardingError> {
        let user_id = user_id.into();

        let existing = deps
            .store
            .get_profile(&user_id)
            .await
            .map_err(OnboardingError::Lookup)?;
        if let Some(stored) = existing {
            if stored.onboarding_completed {
                return Err(OnboardingError::AlreadyCompleted { user_id });
            }
            if stored.role != role {
                return Err(OnboardingError::RoleMismatch {
                    user_id,
                    stored: stored.role,
                    requested: role,
                });
            }
        }

        let (status, _) = watch::channel(FlowStatus::InProgress);
        info!(user_id = %user_id, role = %role, "Onboarding started");

        Ok(Self {
            user_id,
            role,
            deps,
            state: Mutex::new(Some(OnboardingState::new(role, identity))),
            in_flight: AtomicBool::new(false),
            status,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> FlowStatus {
        *self.status.borrow()
    }

    /// Watch for the flow finishing.
    pub fn subscribe(&self) -> watch::Receiver<FlowStatus> {
        self.status.subscribe()
    }

    pub async fn view(&self) -> Result<FlowView, OnboardingError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or(OnboardingError::Finished)?;
        Ok(self.render(state))
    }

    pub async fn set_field(
        &self,
        field: DraftField,
        value: impl Into<String>,
    ) -> Result<FlowView, OnboardingError> {
        let mut guard = self.state.lock().await;
        let state = guard.as_mut().ok_or(OnboardingError::Finished)?;
        self.ensure_idle()?;
        state.set_field(field, value);
        Ok(self.render(state))
    }

    pub async fn submit_resume(&self, file: ResumeFile) -> Result<FlowView, OnboardingError> {
        let mut guard = self.state.lock().await;
        let state = guard.as_mut().ok_or(OnboardingError::Finished)?;
        self.ensure_idle()?;
        let file_name = file.file_name.clone();
        match state.submit_resume(file) {
            Ok(_) => {
                info!(user_id = %self.user_id, file = %file_name, "Resume accepted");
                Ok(self.render(state))
            }
            Err(e) => {
                debug!(user_id = %self.user_id, error = %e, "Resume upload refused");
                Err(e)
            }
        }
    }

    /// Apply a step action. Terminal actions persist the profile before returning.
    pub async fn advance(&self, action: StepAction) -> Result<StepOutcome, OnboardingError> {
        let transition = {
            let mut guard = self.state.lock().await;
            let state = guard.as_mut().ok_or(OnboardingError::Finished)?;
            self.ensure_idle()?;
            let transition = state.advance(action)?;
            match transition {
                Transition::Moved { from, to } => {
                    info!(user_id = %self.user_id, %from, %to, %action, "Onboarding step changed");
                    return Ok(StepOutcome::Step(self.render(state)));
                }
                Transition::Unchanged(_) => return Ok(StepOutcome::Step(self.render(state))),
                Transition::Complete(intent) => intent,
            }
        };
        self.finish(transition).await.map(StepOutcome::Completed)
    }

    /// Complete from the current step using its default completion.
    ///
    /// Only one completion may be in flight; overlapping calls fail with
    /// `CompletionInFlight` and send nothing to the store.
    pub async fn complete(&self) -> Result<CompletionOutcome, OnboardingError> {
        let intent = {
            let guard = self.state.lock().await;
            let state = guard.as_ref().ok_or(OnboardingError::Finished)?;
            state
                .default_completion()
                .ok_or(OnboardingError::NotTerminal { step: state.step() })?
        };
        self.finish(intent).await
    }

    /// Leave the flow without saving. A completion still in flight is not
    /// cancelled, but its result is ignored.
    pub async fn abandon(&self) {
        let mut guard = self.state.lock().await;
        if guard.take().is_some() {
            self.status.send_replace(FlowStatus::Abandoned);
            info!(user_id = %self.user_id, "Onboarding abandoned");
        }
    }

    /// Must be called with the state lock held. `finish` raises the flag
    /// before taking its snapshot under the same lock, so a mutator that
    /// gets the lock afterwards always sees it.
    fn ensure_idle(&self) -> Result<(), OnboardingError> {
        if self.in_flight.load(Ordering::Acquire) {
            return Err(OnboardingError::CompletionInFlight);
        }
        Ok(())
    }

    fn render(&self, state: &OnboardingState) -> FlowView {
        FlowView {
            user_id: self.user_id.clone(),
            role: state.role(),
            status: self.status(),
            step: state.step(),
            step_number: state.step_number(),
            total_steps: state.total_steps(),
            progress_percent: state.progress_percent(),
            draft: state.draft().clone(),
            missing_fields: validator::missing_fields(state.draft()),
            resume: state.resume().clone(),
            available_actions: state.available_actions(),
        }
    }

    async fn finish(&self, intent: CompletionIntent) -> Result<CompletionOutcome, OnboardingError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(user_id = %self.user_id, "Completion suppressed, one already in flight");
            return Err(OnboardingError::CompletionInFlight);
        }
        let _in_flight = InFlightGuard(&self.in_flight);

        let (update, draft, selection) = {
            let guard = self.state.lock().await;
            let state = guard.as_ref().ok_or(OnboardingError::Finished)?;
            // The step may have moved since the intent was chosen.
            if state.default_completion() != Some(intent) {
                return Err(OnboardingError::NotTerminal { step: state.step() });
            }
            self.status.send_replace(FlowStatus::Saving);
            (
                ProfileUpdate::completed_from(state.draft()),
                state.draft().clone(),
                state.selection_for(intent),
            )
        };

        debug!(user_id = %self.user_id, ?intent, "Saving onboarding profile");
        let saved = tokio::time::timeout(
            self.deps.persist_timeout,
            self.deps.store.upsert_profile(&self.user_id, &update),
        )
        .await;
        let saved = match saved {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(e)) => Err(PersistenceError::Store(e)),
            Err(_) => Err(PersistenceError::TimedOut(self.deps.persist_timeout)),
        };

        let profile = {
            let mut guard = self.state.lock().await;
            if guard.is_none() {
                warn!(user_id = %self.user_id, "Flow abandoned while saving; ignoring result");
                return Err(OnboardingError::Finished);
            }
            match saved {
                Ok(Some(record)) => {
                    guard.take();
                    self.status.send_replace(FlowStatus::Completed);
                    record
                }
                Ok(None) => {
                    guard.take();
                    self.status.send_replace(FlowStatus::Abandoned);
                    warn!(user_id = %self.user_id, "Profile was onboarded elsewhere; draft discarded");
                    return Err(OnboardingError::AlreadyCompleted {
                        user_id: self.user_id.clone(),
                    });
                }
                Err(e) => {
                    self.status.send_replace(FlowStatus::InProgress);
                    warn!(user_id = %self.user_id, error = %e, "Failed to save onboarding profile");
                    return Err(e.into());
                }
            }
        };

        info!(user_id = %self.user_id, ?intent, "Onboarding completed");

        let mut handed_off = false;
        if intent == CompletionIntent::ResumeBuilder {
            if let Some(authoring) = &self.deps.authoring {
                match authoring
                    .begin_resume_authoring(&self.user_id, &draft, &selection)
                    .await
                {
                    Ok(()) => handed_off = true,
                    Err(e) => {
                        warn!(user_id = %self.user_id, error = %e, "Resume authoring hand-off failed");
                    }
                }
            }
        }

        Ok(CompletionOutcome {
            intent,
            profile,
            resume: selection,
            handed_off,
        })
    }
}
