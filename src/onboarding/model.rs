//! Profile draft and stored profile data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the marketplace the user signed up as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    JobSeeker,
    Employer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobSeeker => "job_seeker",
            Self::Employer => "employer",
        }
    }

    /// Human-readable form with its article.
    pub fn label(&self) -> &'static str {
        match self {
            Self::JobSeeker => "a job seeker",
            Self::Employer => "an employer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job_seeker" => Ok(Self::JobSeeker),
            "employer" => Ok(Self::Employer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Industry an employer operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Industry {
    Technology,
    Healthcare,
    Finance,
    Education,
    Marketing,
    Manufacturing,
    Other,
}

impl Industry {
    pub const ALL: [Industry; 7] = [
        Self::Technology,
        Self::Healthcare,
        Self::Finance,
        Self::Education,
        Self::Marketing,
        Self::Manufacturing,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technology => "Technology",
            Self::Healthcare => "Healthcare",
            Self::Finance => "Finance",
            Self::Education => "Education",
            Self::Marketing => "Marketing",
            Self::Manufacturing => "Manufacturing",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Industry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown industry: {s}"))
    }
}

/// A draft field that can be edited or reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Name,
    Phone,
    Location,
    Bio,
    Company,
    Industry,
}

impl std::fmt::Display for DraftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Location => "location",
            Self::Bio => "bio",
            Self::Company => "company",
            Self::Industry => "industry",
        };
        f.write_str(s)
    }
}

/// Identity metadata known at sign-up, used to seed the draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

/// In-memory profile data collected during onboarding.
///
/// The role is fixed at construction; there is no setter for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileDraft {
    role: Role,
    pub name: String,
    pub phone: String,
    pub location: String,
    /// Personal bio for job seekers, company description for employers.
    pub bio: String,
    pub company: Option<String>,
    pub industry: Option<Industry>,
}

impl ProfileDraft {
    pub fn new(role: Role, identity: &IdentityMetadata) -> Self {
        Self {
            role,
            name: identity.name.clone().unwrap_or_default(),
            phone: String::new(),
            location: String::new(),
            bio: String::new(),
            company: match role {
                Role::Employer => identity.company.clone(),
                Role::JobSeeker => None,
            },
            industry: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Set a text field from user input.
    ///
    /// Industry values must name one of the fixed set; anything else clears it.
    /// Company and industry are ignored for job seekers.
    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) {
        let value = value.into();
        match field {
            DraftField::Name => self.name = value,
            DraftField::Phone => self.phone = value,
            DraftField::Location => self.location = value,
            DraftField::Bio => self.bio = value,
            DraftField::Company if self.role == Role::Employer => {
                self.company = Some(value);
            }
            DraftField::Industry if self.role == Role::Employer => {
                self.industry = value.parse().ok();
            }
            DraftField::Company | DraftField::Industry => {}
        }
    }
}

/// The upsert sent to the profile store when onboarding completes.
///
/// `updated_at` is assigned by the store, so retries carry an identical payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: String,
    pub location: String,
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<Industry>,
    pub role: Role,
    pub onboarding_completed: bool,
}

impl ProfileUpdate {
    pub fn completed_from(draft: &ProfileDraft) -> Self {
        Self {
            name: draft.name.trim().to_string(),
            phone: draft.phone.trim().to_string(),
            location: draft.location.trim().to_string(),
            bio: draft.bio.trim().to_string(),
            company: draft.company.as_ref().map(|c| c.trim().to_string()),
            industry: draft.industry,
            role: draft.role,
            onboarding_completed: true,
        }
    }
}

/// Profile row inserted at sign-up, before onboarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// A profile as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<Industry>,
    pub role: Role,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settings keys used alongside profiles.
pub mod settings_keys {
    /// Prefix for per-feature boolean flags (e.g. tour completion).
    pub const FLAG_PREFIX: &str = "flag.";
    /// Key for a pending AI resume-authoring request.
    pub const RESUME_AUTHORING_REQUEST: &str = "resume_authoring_request";
}
