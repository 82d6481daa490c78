//! Resume acquisition for job seekers: upload a PDF or defer to AI authoring.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DatabaseError, RejectedFileError};
use crate::store::FlagStore;

use super::model::{ProfileDraft, ProfileUpdate, settings_keys};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A file offered by the user. Only the declared metadata is inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeFile {
    pub file_name: String,
    pub content_type: String,
    #[serde(default)]
    pub size_bytes: u64,
}

impl ResumeFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size_bytes,
        }
    }

    fn is_pdf(&self) -> bool {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        essence.eq_ignore_ascii_case(PDF_CONTENT_TYPE)
    }
}

/// Opaque handle to an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeFileRef {
    pub id: Uuid,
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    #[default]
    None,
    Uploaded,
    AiGenerated,
}

/// How the job seeker intends to supply a resume.
///
/// An uploaded reference exists exactly when the mode is `Uploaded`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResumeSelection {
    mode: ResumeMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    uploaded: Option<ResumeFileRef>,
}

impl ResumeSelection {
    pub fn ai_generated() -> Self {
        Self {
            mode: ResumeMode::AiGenerated,
            uploaded: None,
        }
    }

    pub fn mode(&self) -> ResumeMode {
        self.mode
    }

    pub fn uploaded(&self) -> Option<&ResumeFileRef> {
        self.uploaded.as_ref()
    }
}

/// Accept a resume upload if it is declared as a PDF.
pub fn submit_file(file: ResumeFile) -> Result<ResumeSelection, RejectedFileError> {
    if !file.is_pdf() {
        return Err(RejectedFileError {
            file_name: file.file_name,
            content_type: file.content_type,
        });
    }
    Ok(ResumeSelection {
        mode: ResumeMode::Uploaded,
        uploaded: Some(ResumeFileRef {
            id: Uuid::new_v4(),
            file_name: file.file_name,
            size_bytes: file.size_bytes,
        }),
    })
}

pub fn choose_ai_path() -> ResumeSelection {
    ResumeSelection::ai_generated()
}

/// External AI resume-authoring service.
///
/// Called after the profile is saved when the user continues to the
/// resume builder. What happens after the hand-off is up to the service.
#[async_trait]
pub trait ResumeAuthoring: Send + Sync {
    async fn begin_resume_authoring(
        &self,
        user_id: &str,
        draft: &ProfileDraft,
        selection: &ResumeSelection,
    ) -> Result<(), DatabaseError>;
}

/// Hands off by writing an authoring request into the settings table,
/// where the resume-builder service picks it up.
pub struct QueuedResumeAuthoring {
    store: Arc<dyn FlagStore>,
}

impl QueuedResumeAuthoring {
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ResumeAuthoring for QueuedResumeAuthoring {
    async fn begin_resume_authoring(
        &self,
        user_id: &str,
        draft: &ProfileDraft,
        selection: &ResumeSelection,
    ) -> Result<(), DatabaseError> {
        let request = serde_json::json!({
            "profile": ProfileUpdate::completed_from(draft),
            "resume_mode": selection.mode(),
            "uploaded": selection.uploaded(),
            "requested_at": Utc::now().to_rfc3339(),
        });
        self.store
            .set_setting(user_id, settings_keys::RESUME_AUTHORING_REQUEST, &request)
            .await?;
        tracing::info!(user_id = %user_id, "Resume authoring requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::{IdentityMetadata, Role};
    use crate::store::LibSqlBackend;

    #[test]
    fn pdf_upload_is_accepted() {
        let sel = submit_file(ResumeFile::new("cv.pdf", "application/pdf", 2048)).unwrap();
        assert_eq!(sel.mode(), ResumeMode::Uploaded);
        let file = sel.uploaded().unwrap();
        assert_eq!(file.file_name, "cv.pdf");
        assert_eq!(file.size_bytes, 2048);
    }

    #[test]
    fn content_type_parameters_and_case_are_ignored() {
        assert!(submit_file(ResumeFile::new("a.pdf", "Application/PDF", 1)).is_ok());
        assert!(submit_file(ResumeFile::new("a.pdf", "application/pdf; name=a.pdf", 1)).is_ok());
    }

    #[test]
    fn non_pdf_is_rejected_even_with_pdf_extension() {
        let err = submit_file(ResumeFile::new("cv.pdf", "application/msword", 10)).unwrap_err();
        assert_eq!(err.file_name, "cv.pdf");
        assert_eq!(err.content_type, "application/msword");

        assert!(submit_file(ResumeFile::new("cv", "", 10)).is_err());
        assert!(submit_file(ResumeFile::new("cv.txt", "text/plain", 10)).is_err());
    }

    #[test]
    fn ai_path_has_no_upload() {
        let sel = choose_ai_path();
        assert_eq!(sel.mode(), ResumeMode::AiGenerated);
        assert!(sel.uploaded().is_none());
        assert_eq!(ResumeSelection::default().mode(), ResumeMode::None);
    }

    #[tokio::test]
    async fn queued_authoring_writes_request() {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let authoring = QueuedResumeAuthoring::new(db.clone());

        let mut draft = ProfileDraft::new(Role::JobSeeker, &IdentityMetadata::default());
        draft.name = "Ada".into();
        authoring
            .begin_resume_authoring("user-1", &draft, &choose_ai_path())
            .await
            .unwrap();

        let stored = db
            .get_setting("user-1", settings_keys::RESUME_AUTHORING_REQUEST)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["profile"]["name"], "Ada");
        assert_eq!(stored["resume_mode"], "ai_generated");
    }
}
