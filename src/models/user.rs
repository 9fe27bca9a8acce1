use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account roles, least privileged first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Vendor,
    Admin,
}

impl UserRole {
    pub fn is_vendor_or_above(&self) -> bool {
        matches!(self, UserRole::Vendor | UserRole::Admin)
    }

    /// Parse a role coming from untyped provider metadata.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" | "buyer" => Some(UserRole::Customer),
            "vendor" | "seller" | "provider" => Some(UserRole::Vendor),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Where a user record came from.
///
/// Records written before the tag existed deserialize as `Local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOrigin {
    Remote,
    #[default]
    Local,
}

pub const DEFAULT_LANGUAGE: &str = "ar";

/// Identity-level user record, as cached locally and held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub is_verified: bool,
    pub phone: Option<String>,
    #[serde(default)]
    pub preferred_language: String,
    pub avatar: Option<String>,
    pub organization: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub origin: UserOrigin,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub phone_confirmed_at: Option<DateTime<Utc>>,
}

impl AuthenticatedUser {
    /// Bare local record, mostly useful for demos and tests
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            role: UserRole::default(),
            is_verified: false,
            phone: None,
            preferred_language: String::new(),
            avatar: None,
            organization: None,
            location: None,
            origin: UserOrigin::Local,
            email_confirmed_at: None,
            phone_confirmed_at: None,
        }
    }

    /// Merge a partial update. The id is never changed.
    pub fn apply(&mut self, update: &UserUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(location) = &update.location {
            self.location = Some(location.clone());
        }
        if let Some(avatar) = &update.avatar {
            self.avatar = Some(avatar.clone());
        }
        if let Some(organization) = &update.organization {
            self.organization = Some(organization.clone());
        }
        if let Some(language) = &update.preferred_language {
            self.preferred_language = language.clone();
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(verified) = update.is_verified {
            self.is_verified = verified;
        }
    }
}

/// Partial update accepted by `AuthStateStore::update_user`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub avatar: Option<String>,
    pub organization: Option<String>,
    pub preferred_language: Option<String>,
    pub role: Option<UserRole>,
    pub is_verified: Option<bool>,
}

impl UserUpdate {
    pub fn location(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Canonical shape for a user record.
///
/// Pure and idempotent: trims text, lower-cases the email, drops blank
/// optionals, fills the display name from the email local-part and the
/// language from [`DEFAULT_LANGUAGE`]. The origin tag is part of the type,
/// so it is always present.
pub fn normalize(mut user: AuthenticatedUser) -> AuthenticatedUser {
    user.id = user.id.trim().to_string();
    user.email = user.email.trim().to_lowercase();
    user.name = user.name.trim().to_string();
    if user.name.is_empty() {
        user.name = email_local_part(&user.email).trim().to_string();
    }

    user.preferred_language = user.preferred_language.trim().to_lowercase();
    if user.preferred_language.is_empty() {
        user.preferred_language = DEFAULT_LANGUAGE.to_string();
    }

    user.phone = non_blank(user.phone);
    user.avatar = non_blank(user.avatar);
    user.organization = non_blank(user.organization);
    user.location = non_blank(user.location);

    user
}

/// Text before the `@`, or the whole string when there is none
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
