//! Request and response types for the portal auth API. `AuthResponse` and
//! `RefreshResponse` carry token material, so they must never be logged.

use serde::{Deserialize, Serialize};

/// Academic title as stored on the user profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcademicTitle {
    #[default]
    #[serde(rename = "")]
    Unset,
    #[serde(rename = "prof")]
    Professor,
    #[serde(rename = "assoc_prof")]
    AssociateProfessor,
    #[serde(rename = "asst_prof")]
    AssistantProfessor,
    #[serde(rename = "dr")]
    Doctor,
    #[serde(rename = "lecturer")]
    Lecturer,
    #[serde(rename = "researcher")]
    Researcher,
    #[serde(rename = "phd_student")]
    PhdStudent,
    #[serde(rename = "msc_student")]
    MscStudent,
    #[serde(rename = "other")]
    Other,
}

impl AcademicTitle {
    pub const ALL: [AcademicTitle; 10] = [
        AcademicTitle::Unset,
        AcademicTitle::Professor,
        AcademicTitle::AssociateProfessor,
        AcademicTitle::AssistantProfessor,
        AcademicTitle::Doctor,
        AcademicTitle::Lecturer,
        AcademicTitle::Researcher,
        AcademicTitle::PhdStudent,
        AcademicTitle::MscStudent,
        AcademicTitle::Other,
    ];

    /// Wire value used by the API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AcademicTitle::Unset => "",
            AcademicTitle::Professor => "prof",
            AcademicTitle::AssociateProfessor => "assoc_prof",
            AcademicTitle::AssistantProfessor => "asst_prof",
            AcademicTitle::Doctor => "dr",
            AcademicTitle::Lecturer => "lecturer",
            AcademicTitle::Researcher => "researcher",
            AcademicTitle::PhdStudent => "phd_student",
            AcademicTitle::MscStudent => "msc_student",
            AcademicTitle::Other => "other",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AcademicTitle::Unset => "Select",
            AcademicTitle::Professor => "Professor",
            AcademicTitle::AssociateProfessor => "Associate Professor",
            AcademicTitle::AssistantProfessor => "Assistant Professor",
            AcademicTitle::Doctor => "Doctor",
            AcademicTitle::Lecturer => "Lecturer",
            AcademicTitle::Researcher => "Researcher",
            AcademicTitle::PhdStudent => "PhD Student",
            AcademicTitle::MscStudent => "MSc Student",
            AcademicTitle::Other => "Other",
        }
    }

    /// Parses the wire value, as accepted on the command line.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|title| title.as_str() == value)
    }
}

/// Full user object returned by the profile, callback and sync endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,

    pub orcid_id: String,
    pub orcid_url: String,
    pub last_orcid_sync: Option<String>,

    pub email: Option<String>,
    pub full_name: String,
    pub given_name: String,
    pub family_name: String,
    pub display_name: String,

    pub phone: String,
    pub country: String,
    pub city: String,
    pub address: String,

    pub title: AcademicTitle,
    pub institution: String,
    pub department: String,
    pub expertise_areas: Vec<String>,
    pub bio: String,
    pub website: String,

    pub is_reviewer: bool,
    pub is_editor: bool,
    pub is_chief_editor: bool,
    pub reviewer_interests: Vec<String>,

    pub is_active: bool,
    pub email_verified: bool,
    pub profile_completed: bool,

    pub date_joined: String,
    pub last_login: Option<String>,
}

/// Editable profile fields. Absent fields are left untouched by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<AcademicTitle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise_areas: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_interests: Option<Vec<String>>,
}

impl UserProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct OrcidLoginResponse {
    pub authorization_url: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrcidCallbackRequest<'a> {
    pub code: &'a str,
}

#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Standard portal response envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    /// Field-level failures. The portal sends `null` when there are none.
    #[serde(default)]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}
