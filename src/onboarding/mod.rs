//! Onboarding system: the multi-step profile setup a new user walks
//! through after sign-up.
//!
//! The flow collects basic profile data, then branches by role: job seekers
//! may upload a resume or hand off to AI resume authoring, employers confirm
//! and finish. Nothing is persisted until the flow completes.

pub mod controller;
pub mod model;
pub mod resume;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod validator;

pub use controller::{
    CompletionOutcome, FlowStatus, FlowView, OnboardingController, OnboardingDeps, StepOutcome,
};
pub use model::{DraftField, IdentityMetadata, Industry, ProfileDraft, ProfileRecord, Role};
pub use resume::{QueuedResumeAuthoring, ResumeAuthoring, ResumeFile, ResumeMode, ResumeSelection};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use sessions::{SessionRegistry, spawn_eviction_task};
pub use state::{CompletionIntent, OnboardingState, OnboardingStep, StepAction, total_steps};
