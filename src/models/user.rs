//! User, role and permission models
//!
//! Users carry the names of their roles so authorization checks need no
//! further queries. Effective permissions are resolved separately by the role
//! repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EDITOR: &str = "editor";
pub const ROLE_AUTHOR: &str = "author";
pub const ROLE_REVIEWER: &str = "reviewer";

/// Registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Email address (unique, login identifier)
    pub email: String,
    pub full_name: Option<String>,
    /// Password hash (argon2 PHC string)
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub status: UserStatus,
    pub is_active: bool,
    pub is_superuser: bool,
    /// Base32 TOTP secret, present when MFA is enabled
    #[serde(skip_serializing)]
    pub mfa_secret: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    /// Names of the roles assigned to the user
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user holds any of the given roles.
    ///
    /// Superusers pass every role check.
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        self.is_superuser || self.roles.iter().any(|r| roles.contains(&r.as_str()))
    }

    /// Editors, admins and superusers may change anyone's content
    pub fn is_editor(&self) -> bool {
        self.has_any_role(&[ROLE_EDITOR, ROLE_ADMIN])
    }

    /// Check if the user can edit content created by `created_by`
    pub fn can_edit(&self, created_by: Option<i64>) -> bool {
        self.is_editor() || created_by == Some(self.id)
    }

    pub fn mfa_enabled(&self) -> bool {
        self.mfa_secret.is_some()
    }

    /// Active flag set and status `active`
    pub fn can_login(&self) -> bool {
        self.is_active && self.status == UserStatus::Active
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Pending,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Inactive => write!(f, "inactive"),
            UserStatus::Suspended => write!(f, "suspended"),
            UserStatus::Pending => write!(f, "pending"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            "pending" => Ok(UserStatus::Pending),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Role with the codes of the permissions it grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// Input for creating a user. The password must already be hashed.
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    pub email: String,
    pub full_name: Option<String>,
    pub hashed_password: String,
    pub status: UserStatus,
    pub is_superuser: bool,
    pub mfa_secret: Option<String>,
    pub role_ids: Vec<i64>,
}

/// Partial user update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    pub full_name: Option<String>,
    pub status: Option<UserStatus>,
    pub is_active: Option<bool>,
    /// Replaces the whole role set
    pub role_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateRoleInput {
    pub name: String,
    pub description: Option<String>,
    pub permission_codes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRoleInput {
    pub description: Option<String>,
    /// Replaces the whole permission set
    pub permission_codes: Option<Vec<String>>,
}
