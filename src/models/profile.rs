use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::{normalize, AuthenticatedUser, UserOrigin, UserRole, UserUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    System,
}

/// Role-specific part of a business profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoleDetails {
    Customer {
        #[serde(default)]
        saved_addresses: Vec<String>,
    },
    Vendor {
        store_name: String,
        #[serde(default)]
        categories: Vec<String>,
        commercial_registration: Option<String>,
    },
}

/// Business profile: the user plus presentation and role-specific fields.
///
/// Always carries the id and role of the user it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: AuthenticatedUser,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub location_city: Option<String>,
    pub location_region: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub theme: Theme,
    pub locale: String,
    pub details: Option<RoleDetails>,
}

impl UserProfile {
    /// Deterministic profile for a user with no persisted overrides.
    pub fn derive(user: &AuthenticatedUser) -> Self {
        let (first_name, last_name) = split_name(&user.name);
        let (location_city, location_region) = split_location(user.location.as_deref());

        Self {
            user: user.clone(),
            first_name,
            last_name,
            bio: None,
            location_city,
            location_region,
            avatar_url: user.avatar.clone(),
            theme: Theme::default(),
            locale: user.preferred_language.clone(),
            details: None,
        }
    }

    /// Re-derive the fields an update touches and keep everything else.
    pub fn refresh_from(&mut self, user: &AuthenticatedUser, update: &UserUpdate) {
        if update.name.is_some() {
            let (first, last) = split_name(&user.name);
            self.first_name = first;
            self.last_name = last;
        }
        if update.location.is_some() {
            let (city, region) = split_location(user.location.as_deref());
            self.location_city = city;
            self.location_region = region;
        }
        if update.avatar.is_some() {
            self.avatar_url = user.avatar.clone();
        }
        if update.preferred_language.is_some() {
            self.locale = user.preferred_language.clone();
        }
        // email, phone, role and the rest of the identity travel with the user
        self.user = user.clone();
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Split a display name into first name and the remainder.
pub fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Split "City, Region" on the first comma.
pub fn split_location(location: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(location) = location else {
        return (None, None);
    };
    let (city, region) = match location.split_once(',') {
        Some((city, region)) => (city, region),
        None => (location, ""),
    };
    let city = city.trim();
    let region = region.trim();
    (
        (!city.is_empty()).then(|| city.to_string()),
        (!region.is_empty()).then(|| region.to_string()),
    )
}

/// Row in the remote `profiles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub is_verified: bool,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub organization: Option<String>,
    pub preferred_language: Option<String>,
    pub theme: Option<Theme>,
    pub details: Option<RoleDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    /// Record seeded from an identity, as written right after signup
    pub fn for_user(user: &AuthenticatedUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: user.name.clone(),
            role: user.role,
            is_verified: user.is_verified,
            phone: user.phone.clone(),
            location: user.location.clone(),
            bio: None,
            avatar_url: user.avatar.clone(),
            organization: user.organization.clone(),
            preferred_language: Some(user.preferred_language.clone()),
            theme: None,
            details: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn to_user(&self) -> AuthenticatedUser {
        normalize(AuthenticatedUser {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.full_name.clone(),
            role: self.role,
            is_verified: self.is_verified,
            phone: self.phone.clone(),
            preferred_language: self.preferred_language.clone().unwrap_or_default(),
            avatar: self.avatar_url.clone(),
            organization: self.organization.clone(),
            location: self.location.clone(),
            origin: UserOrigin::Remote,
            email_confirmed_at: None,
            phone_confirmed_at: None,
        })
    }

    /// Profile for `user` with this record's persisted fields layered on top.
    pub fn overlay(&self, user: &AuthenticatedUser) -> UserProfile {
        let mut profile = UserProfile::derive(user);
        profile.bio = self.bio.clone();
        if let Some(theme) = self.theme {
            profile.theme = theme;
        }
        profile.details = self.details.clone();
        profile
    }
}

/// Partial update sent to the profile store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<RoleDetails>,
}

impl From<&ProfileRecord> for ProfilePatch {
    fn from(record: &ProfileRecord) -> Self {
        Self {
            email: Some(record.email.clone()),
            full_name: Some(record.full_name.clone()),
            role: Some(record.role),
            phone: record.phone.clone(),
            location: record.location.clone(),
            organization: record.organization.clone(),
            details: record.details.clone(),
        }
    }
}
