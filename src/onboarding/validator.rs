//! Step guards. Pure predicates over the draft and resume selection.

use super::model::{DraftField, ProfileDraft, Role};
use super::resume::{ResumeMode, ResumeSelection};

const JOB_SEEKER_REQUIRED: &[DraftField] = &[
    DraftField::Name,
    DraftField::Phone,
    DraftField::Location,
    DraftField::Bio,
];

const EMPLOYER_REQUIRED: &[DraftField] = &[
    DraftField::Name,
    DraftField::Phone,
    DraftField::Location,
    DraftField::Company,
    DraftField::Industry,
    DraftField::Bio,
];

/// Fields that must be non-empty before leaving step 1.
pub fn required_fields(role: Role) -> &'static [DraftField] {
    match role {
        Role::JobSeeker => JOB_SEEKER_REQUIRED,
        Role::Employer => EMPLOYER_REQUIRED,
    }
}

fn is_filled(draft: &ProfileDraft, field: DraftField) -> bool {
    match field {
        DraftField::Name => !draft.name.trim().is_empty(),
        DraftField::Phone => !draft.phone.trim().is_empty(),
        DraftField::Location => !draft.location.trim().is_empty(),
        DraftField::Bio => !draft.bio.trim().is_empty(),
        DraftField::Company => draft
            .company
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty()),
        DraftField::Industry => draft.industry.is_some(),
    }
}

/// Required fields that are still empty, in form order.
pub fn missing_fields(draft: &ProfileDraft) -> Vec<DraftField> {
    required_fields(draft.role())
        .iter()
        .copied()
        .filter(|f| !is_filled(draft, *f))
        .collect()
}

pub fn is_step1_valid(draft: &ProfileDraft) -> bool {
    missing_fields(draft).is_empty()
}

/// Gates only the resume step's Continue action.
pub fn is_resume_step_satisfied(selection: &ResumeSelection) -> bool {
    selection.mode() == ResumeMode::Uploaded
}
