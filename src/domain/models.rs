use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label shown wherever a referenced user record no longer exists.
pub const DELETED_USER_LABEL: &str = "Deleted user";

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[sqlx(type_name = "employee_class", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmployeeClass {
    #[serde(alias = "office")]
    Salaried,
    #[serde(alias = "operator")]
    Hourly,
}

impl EmployeeClass {
    pub const ALL: [EmployeeClass; 2] = [EmployeeClass::Salaried, EmployeeClass::Hourly];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeClass::Salaried => "salaried",
            EmployeeClass::Hourly => "hourly",
        }
    }

    /// Upper bound of the rating scale; used for presentation ratios only.
    pub fn scale_max(&self) -> u8 {
        match self {
            EmployeeClass::Salaried => 5,
            EmployeeClass::Hourly => 3,
        }
    }

    pub fn requires_development_suggestion(&self) -> bool {
        matches!(self, EmployeeClass::Salaried)
    }
}

impl TryFrom<&str> for EmployeeClass {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "salaried" | "office" => Ok(EmployeeClass::Salaried),
            "hourly" | "operator" => Ok(EmployeeClass::Hourly),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Employee,
}

/// Administrative actions gated by role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    ManageQuestions,
    ManageAssignments,
    ManageUsers,
    ExportResults,
    ReadAppFeedback,
}

impl UserRole {
    pub fn can(&self, capability: Capability) -> bool {
        match (self, capability) {
            (UserRole::Admin, _) => true,
            (UserRole::Employee, _) => false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalariedProfile {
    pub organization: String,
    pub job_level: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub login_handle: String,
    pub class: EmployeeClass,
    pub role: UserRole,
    pub employee_id: String,
    pub job_position: String,
    pub salaried_profile: Option<SalariedProfile>,
    pub app_feedback_submitted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub login_handle: String,
    pub secret: String,
    pub display_name: String,
    pub employee_id: String,
    pub job_position: String,
    pub class: EmployeeClass,
    pub organization: Option<String>,
    pub job_level: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub class: EmployeeClass,
    pub created_at: DateTime<Utc>,
}

/// An assignment with both ends resolved to display names.
#[derive(Clone, Debug, Serialize)]
pub struct AssignmentView {
    pub id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewer_name: String,
    pub reviewee_id: Uuid,
    pub reviewee_name: String,
    pub class: EmployeeClass,
}

/// One stored score, keyed by the raw question definition it answered.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntry {
    pub question: String,
    pub score: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSubmission {
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub scores: Vec<ScoreEntry>,
    pub comment: String,
    pub development_suggestion: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub scores: Vec<ScoreEntry>,
    pub comment: String,
    pub development_suggestion: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A submission as its reviewee may see it: the reviewer is never exposed.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ReceivedReview {
    pub id: Uuid,
    pub scores: Vec<ScoreEntry>,
    pub comment: String,
    pub development_suggestion: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl From<Submission> for ReceivedReview {
    fn from(s: Submission) -> Self {
        Self {
            id: s.id,
            scores: s.scores,
            comment: s.comment,
            development_suggestion: s.development_suggestion,
            submitted_at: s.submitted_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAppFeedback {
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: u8,
    pub suggestion: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppFeedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: u8,
    pub suggestion: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_accepts_legacy_names() {
        assert_eq!(EmployeeClass::try_from("Office"), Ok(EmployeeClass::Salaried));
        assert_eq!(EmployeeClass::try_from("operator"), Ok(EmployeeClass::Hourly));
        assert!(EmployeeClass::try_from("contractor").is_err());

        let parsed: EmployeeClass = serde_json::from_str("\"operator\"").unwrap();
        assert_eq!(parsed, EmployeeClass::Hourly);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"hourly\"");
    }

    #[test]
    fn scale_bounds_follow_class() {
        assert_eq!(EmployeeClass::Salaried.scale_max(), 5);
        assert_eq!(EmployeeClass::Hourly.scale_max(), 3);
        assert!(EmployeeClass::Salaried.requires_development_suggestion());
        assert!(!EmployeeClass::Hourly.requires_development_suggestion());
    }

    #[test]
    fn only_admins_hold_capabilities() {
        assert!(UserRole::Admin.can(Capability::ExportResults));
        assert!(!UserRole::Employee.can(Capability::ManageAssignments));
    }
}
