use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Leader,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Leader => "leader",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Student)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "leader" => Ok(Role::Leader),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Frozen,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub leader_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the admin screens get to see of a profile.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub leader_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileSummary {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            phone: profile.phone,
            display_name: profile.display_name,
            role: profile.role,
            status: profile.status,
            leader_id: profile.leader_id,
            created_at: profile.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoleAuditLog {
    pub id: Uuid,
    pub target_id: Uuid,
    pub actor_id: Uuid,
    pub from_role: Role,
    pub to_role: Role,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginEvent {
    LoginPassword,
    LoginCode,
    Logout,
    PasswordReset,
}

impl LoginEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginEvent::LoginPassword => "login_password",
            LoginEvent::LoginCode => "login_code",
            LoginEvent::Logout => "logout",
            LoginEvent::PasswordReset => "password_reset",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordLoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRoleRequest {
    pub user_id: Uuid,
    pub role: Role,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub user_id: Uuid,
    pub status: AccountStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignLeaderRequest {
    pub user_id: Uuid,
    pub leader_id: Option<Uuid>,
}
