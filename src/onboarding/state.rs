//! Onboarding state machine. Tracks the current step, the draft and the
//! resume selection, and decides which actions move between steps.

use serde::{Deserialize, Serialize};

use crate::error::{OnboardingError, ValidationError};

use super::model::{DraftField, IdentityMetadata, ProfileDraft, Role};
use super::resume::{self, ResumeFile, ResumeSelection};
use super::validator;

/// The screens of the onboarding wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    BasicInfo,
    /// Resume upload for job seekers; final confirmation for employers.
    ResumeOrDetails,
    ResumeBuilderChoice,
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BasicInfo => "basic_info",
            Self::ResumeOrDetails => "resume_or_details",
            Self::ResumeBuilderChoice => "resume_builder_choice",
        };
        write!(f, "{s}")
    }
}

const JOB_SEEKER_STEPS: &[OnboardingStep] = &[
    OnboardingStep::BasicInfo,
    OnboardingStep::ResumeOrDetails,
    OnboardingStep::ResumeBuilderChoice,
];

const EMPLOYER_STEPS: &[OnboardingStep] = &[
    OnboardingStep::BasicInfo,
    OnboardingStep::ResumeOrDetails,
];

/// Ordered steps a role walks through.
pub fn steps_for(role: Role) -> &'static [OnboardingStep] {
    match role {
        Role::JobSeeker => JOB_SEEKER_STEPS,
        Role::Employer => EMPLOYER_STEPS,
    }
}

pub fn total_steps(role: Role) -> usize {
    steps_for(role).len()
}

/// Something the user can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Next,
    Previous,
    Continue,
    CreateResumeWithAi,
    SkipForNow,
    CompleteSetup,
    ContinueToResumeBuilder,
    BackToUpload,
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Continue => "continue",
            Self::CreateResumeWithAi => "create_resume_with_ai",
            Self::SkipForNow => "skip_for_now",
            Self::CompleteSetup => "complete_setup",
            Self::ContinueToResumeBuilder => "continue_to_resume_builder",
            Self::BackToUpload => "back_to_upload",
        };
        write!(f, "{s}")
    }
}

/// Why the flow is finishing. Decides the resume selection that goes with
/// the completed profile and whether to hand off to resume authoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionIntent {
    SkipResume,
    EmployerSetup,
    ResumeBuilder,
}

/// Outcome of a successful `advance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved {
        from: OnboardingStep,
        to: OnboardingStep,
    },
    Unchanged(OnboardingStep),
    /// The action finishes onboarding; the caller must persist.
    Complete(CompletionIntent),
}

/// In-memory state of one onboarding flow.
#[derive(Debug, Clone)]
pub struct OnboardingState {
    role: Role,
    index: usize,
    draft: ProfileDraft,
    resume: ResumeSelection,
}

impl OnboardingState {
    pub fn new(role: Role, identity: &IdentityMetadata) -> Self {
        Self {
            role,
            index: 0,
            draft: ProfileDraft::new(role, identity),
            resume: ResumeSelection::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    fn steps(&self) -> &'static [OnboardingStep] {
        steps_for(self.role)
    }

    pub fn step(&self) -> OnboardingStep {
        self.steps()[self.index]
    }

    /// 1-based position of the current step.
    pub fn step_number(&self) -> usize {
        self.index + 1
    }

    pub fn total_steps(&self) -> usize {
        self.steps().len()
    }

    pub fn progress_percent(&self) -> u8 {
        let pct = (self.step_number() as f64 / self.total_steps() as f64) * 100.0;
        pct.round() as u8
    }

    pub fn draft(&self) -> &ProfileDraft {
        &self.draft
    }

    pub fn resume(&self) -> &ResumeSelection {
        &self.resume
    }

    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) {
        self.draft.set_field(field, value);
    }

    /// Record a resume upload. A rejected file leaves the selection as it was.
    pub fn submit_resume(&mut self, file: ResumeFile) -> Result<&ResumeSelection, OnboardingError> {
        let step = self.step();
        if self.role != Role::JobSeeker || step != OnboardingStep::ResumeOrDetails {
            return Err(OnboardingError::UploadNotAvailable { step });
        }
        self.resume = resume::submit_file(file)?;
        Ok(&self.resume)
    }

    /// The resume selection that accompanies a completion.
    pub fn selection_for(&self, intent: CompletionIntent) -> ResumeSelection {
        match intent {
            CompletionIntent::ResumeBuilder => self.resume.clone(),
            CompletionIntent::SkipResume | CompletionIntent::EmployerSetup => {
                ResumeSelection::default()
            }
        }
    }

    /// The completion a terminal-eligible step performs when no specific
    /// action was pressed.
    pub fn default_completion(&self) -> Option<CompletionIntent> {
        match (self.role, self.step()) {
            (Role::Employer, OnboardingStep::ResumeOrDetails) => {
                Some(CompletionIntent::EmployerSetup)
            }
            (Role::JobSeeker, OnboardingStep::ResumeOrDetails) => {
                Some(CompletionIntent::SkipResume)
            }
            (Role::JobSeeker, OnboardingStep::ResumeBuilderChoice) => {
                Some(CompletionIntent::ResumeBuilder)
            }
            _ => None,
        }
    }

    /// Apply an action. On error the step, draft, and selection are unchanged.
    pub fn advance(&mut self, action: StepAction) -> Result<Transition, OnboardingError> {
        use OnboardingStep::*;
        use StepAction::*;

        let step = self.step();
        let seeker = self.role == Role::JobSeeker;

        match (step, action) {
            (_, Previous) => Ok(self.back()),
            (BasicInfo, Next) => {
                let missing = validator::missing_fields(&self.draft);
                if !missing.is_empty() {
                    return Err(ValidationError { step, missing }.into());
                }
                self.forward(action)
            }
            (ResumeOrDetails, Continue) if seeker => {
                if !validator::is_resume_step_satisfied(&self.resume) {
                    return Err(ValidationError {
                        step,
                        missing: Vec::new(),
                    }
                    .into());
                }
                self.forward(action)
            }
            (ResumeOrDetails, CreateResumeWithAi) if seeker => {
                let moved = self.forward(action)?;
                self.resume = resume::choose_ai_path();
                Ok(moved)
            }
            (ResumeOrDetails, SkipForNow) if seeker => {
                Ok(Transition::Complete(CompletionIntent::SkipResume))
            }
            (ResumeOrDetails, CompleteSetup) if !seeker => {
                Ok(Transition::Complete(CompletionIntent::EmployerSetup))
            }
            (ResumeBuilderChoice, ContinueToResumeBuilder) => {
                Ok(Transition::Complete(CompletionIntent::ResumeBuilder))
            }
            (ResumeBuilderChoice, BackToUpload) => Ok(self.back()),
            _ => Err(OnboardingError::InvalidAction { step, action }),
        }
    }

    /// Actions whose controls should be enabled on the current step.
    pub fn available_actions(&self) -> Vec<StepAction> {
        use OnboardingStep::*;
        use StepAction::*;

        let mut actions = Vec::new();
        if self.index > 0 {
            actions.push(Previous);
        }
        match (self.role, self.step()) {
            (_, BasicInfo) => {
                if validator::is_step1_valid(&self.draft) {
                    actions.push(Next);
                }
            }
            (Role::JobSeeker, ResumeOrDetails) => {
                if validator::is_resume_step_satisfied(&self.resume) {
                    actions.push(Continue);
                }
                actions.push(CreateResumeWithAi);
                actions.push(SkipForNow);
            }
            (Role::Employer, ResumeOrDetails) => actions.push(CompleteSetup),
            (_, ResumeBuilderChoice) => {
                actions.push(BackToUpload);
                actions.push(ContinueToResumeBuilder);
            }
        }
        actions
    }

    fn forward(&mut self, action: StepAction) -> Result<Transition, OnboardingError> {
        let from = self.step();
        if self.index + 1 >= self.total_steps() {
            return Err(OnboardingError::InvalidAction { step: from, action });
        }
        self.index += 1;
        Ok(Transition::Moved {
            from,
            to: self.step(),
        })
    }

    fn back(&mut self) -> Transition {
        let from = self.step();
        if self.index == 0 {
            return Transition::Unchanged(from);
        }
        self.index -= 1;
        Transition::Moved {
            from,
            to: self.step(),
        }
    }
}
