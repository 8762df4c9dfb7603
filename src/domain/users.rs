//! Blog users and their roles.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;
const FULL_NAME_MAX: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Blogger,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Blogger => "blogger",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }

    /// Moderators and admins may act on content they do not own.
    pub fn can_moderate(self) -> bool {
        matches!(self, UserRole::Moderator | UserRole::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: OffsetDateTime,
    pub last_activity: Option<OffsetDateTime>,
}

/// One rejected password attempt. Read back as a sliding window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLoginRecord {
    pub username: String,
    pub remote_address: String,
    pub attempted_at: OffsetDateTime,
}

/// Validated registration input. The password is still plain text here.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password: String,
}

impl NewUser {
    pub fn parse(
        username: &str,
        email: &str,
        full_name: Option<&str>,
        password: &str,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            username: parse_username(username)?,
            email: parse_email(email)?,
            full_name: parse_full_name(full_name)?,
            password: parse_password(password)?.to_string(),
        })
    }
}

/// Validated profile edit. Absent or blank fields leave the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn parse(
        full_name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            full_name: parse_full_name(full_name)?,
            email: present(email).map(parse_email).transpose()?,
            password: present(password)
                .map(|raw| parse_password(raw).map(str::to_string))
                .transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.filter(|value| !value.trim().is_empty())
}

/// Stored-form account changes. The password is already hashed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserRecord {
    pub fn apply(&mut self, changes: AccountChanges) {
        if let Some(full_name) = changes.full_name {
            self.full_name = Some(full_name);
        }
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            self.password_hash = password_hash;
        }
    }
}

pub fn parse_username(raw: &str) -> Result<String, DomainError> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(DomainError::validation(
            "username",
            format!("must be {USERNAME_MIN} to {USERNAME_MAX} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(DomainError::validation(
            "username",
            "may only contain letters, digits, `_`, `-` and `.`",
        ));
    }
    Ok(username.to_string())
}

pub fn parse_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_ascii_lowercase())
        }
        _ => Err(DomainError::validation("email", "must be a valid address")),
    }
}

pub fn parse_full_name(raw: Option<&str>) -> Result<Option<String>, DomainError> {
    let Some(name) = raw.map(str::trim).filter(|name| !name.is_empty()) else {
        return Ok(None);
    };
    if name.chars().count() > FULL_NAME_MAX {
        return Err(DomainError::validation(
            "full_name",
            format!("must be at most {FULL_NAME_MAX} characters"),
        ));
    }
    Ok(Some(name.to_string()))
}

pub fn parse_password(raw: &str) -> Result<&str, DomainError> {
    if raw.chars().count() < PASSWORD_MIN {
        return Err(DomainError::validation(
            "password",
            format!("must be at least {PASSWORD_MIN} characters"),
        ));
    }
    Ok(raw)
}
