//! Identity types: users, roles and login payloads.

use serde::{Deserialize, Serialize};

use super::UserId;

/// Role of an account on the school backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Instructor,
    SchoolAdmin,
    Student,
    Admin,
    Parent,
    /// Any role this client does not know about.
    #[default]
    #[serde(other)]
    Unknown,
}

impl UserRole {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Instructor => "instructor",
            UserRole::SchoolAdmin => "school_admin",
            UserRole::Student => "student",
            UserRole::Admin => "admin",
            UserRole::Parent => "parent",
            UserRole::Unknown => "unknown",
        }
    }

    /// Whether the backend lets this role post messages.
    ///
    /// Parents and students only receive notifications.
    pub fn can_send(&self) -> bool {
        !matches!(self, UserRole::Parent | UserRole::Student)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub role: UserRole,

    /// Organizational scope the user belongs to. Accounts outside any
    /// school come back with `null`.
    #[serde(default, alias = "school_id")]
    pub school_id: Option<i64>,

    #[serde(default, alias = "first_name")]
    pub first_name: String,

    #[serde(default, alias = "last_name")]
    pub last_name: String,
}

impl User {
    /// Full name for display, falling back to the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// A user returned by the contact search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: UserId,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub role: UserRole,

    #[serde(default)]
    pub school_id: Option<i64>,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,
}

/// Body of the login request.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of the login response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub user: Option<User>,

    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /api/messaging/users/search` response.
#[derive(Debug, Deserialize)]
pub(crate) struct UsersResponse {
    #[serde(default)]
    pub users: Vec<Contact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_user() {
        let json = r#"{
            "success": true,
            "token": "abc.def",
            "user": {
                "id": 12,
                "username": "jane@school.test",
                "email": "jane@school.test",
                "role": "instructor",
                "schoolId": 3,
                "firstName": "Jane",
                "lastName": "Doe"
            },
            "message": "Login successful"
        }"#;

        let resp: LoginResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        let user = resp.user.unwrap();
        assert_eq!(user.role, UserRole::Instructor);
        assert_eq!(user.school_id, Some(3));
        assert_eq!(user.display_name(), "Jane Doe");
    }

    #[test]
    fn test_parse_snake_case_user() {
        let json = r#"{"id": 1, "username": "4411", "role": "parent", "school_id": 9}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.school_id, Some(9));
        assert_eq!(user.role, UserRole::Parent);
        assert_eq!(user.display_name(), "4411");
    }

    #[test]
    fn test_parse_user_without_school() {
        let json = r#"{"id": 1, "username": "root", "role": "admin", "schoolId": null,
            "firstName": "", "lastName": ""}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.school_id, None);
        assert_eq!(user.role, UserRole::Admin);

        let missing: User = serde_json::from_str(r#"{"id": 2, "role": "admin"}"#).unwrap();
        assert_eq!(missing.school_id, None);
    }

    #[test]
    fn test_unknown_role() {
        let role: UserRole = serde_json::from_str(r#""janitor""#).unwrap();
        assert_eq!(role, UserRole::Unknown);
        assert!(!UserRole::Parent.can_send());
        assert!(UserRole::SchoolAdmin.can_send());
        assert_eq!(UserRole::SchoolAdmin.to_string(), "school_admin");
    }
}
