use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::{email_local_part, normalize, AuthenticatedUser, UserOrigin, UserRole};

/// Free-form metadata the provider stores alongside an identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// Identity as the provider reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub phone_confirmed_at: Option<DateTime<Utc>>,
}

impl SessionUser {
    /// Minimal user built from session metadata alone.
    ///
    /// Never waits on the business profile. Display name falls back
    /// full name, then name, then the email local-part; an unknown role
    /// falls back to the least privileged one.
    pub fn minimal_user(&self) -> AuthenticatedUser {
        let email = self.email.clone().unwrap_or_default();
        let meta = &self.user_metadata;
        let name = [meta.full_name.as_deref(), meta.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|n| !n.is_empty())
            .unwrap_or_else(|| email_local_part(email.trim()))
            .to_string();

        normalize(AuthenticatedUser {
            id: self.id.clone(),
            email,
            name,
            role: meta
                .role
                .as_deref()
                .and_then(UserRole::parse)
                .unwrap_or_default(),
            is_verified: self.email_confirmed_at.is_some() || self.phone_confirmed_at.is_some(),
            phone: self.phone.clone().or_else(|| meta.phone.clone()),
            preferred_language: meta.preferred_language.clone().unwrap_or_default(),
            avatar: meta.avatar_url.clone(),
            organization: meta.organization.clone(),
            location: None,
            origin: UserOrigin::Remote,
            email_confirmed_at: self.email_confirmed_at,
            phone_confirmed_at: self.phone_confirmed_at,
        })
    }
}

/// Proof from the identity provider that this browser context is signed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: SessionUser,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Session change notification from the identity provider
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}

/// Credentials plus metadata for a new account
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub metadata: UserMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_user(meta: UserMetadata) -> SessionUser {
        SessionUser {
            id: "u1".into(),
            email: Some("a@b.com".into()),
            phone: None,
            user_metadata: meta,
            email_confirmed_at: None,
            phone_confirmed_at: None,
        }
    }

    #[test]
    fn test_display_name_falls_back_to_email_local_part() {
        let user = session_user(UserMetadata::default()).minimal_user();
        assert_eq!(user.name, "a");
        assert_eq!(user.role, UserRole::Customer);
        assert_eq!(user.origin, UserOrigin::Remote);
    }

    #[test]
    fn test_display_name_prefers_full_name_then_name() {
        let user = session_user(UserMetadata {
            full_name: Some("Huda Al-Qahtani".into()),
            name: Some("huda".into()),
            ..UserMetadata::default()
        })
        .minimal_user();
        assert_eq!(user.name, "Huda Al-Qahtani");

        let user = session_user(UserMetadata {
            full_name: Some("  ".into()),
            name: Some("huda".into()),
            ..UserMetadata::default()
        })
        .minimal_user();
        assert_eq!(user.name, "huda");
    }

    #[test]
    fn test_unknown_role_falls_back_to_customer() {
        let user = session_user(UserMetadata {
            role: Some("superuser".into()),
            ..UserMetadata::default()
        })
        .minimal_user();
        assert_eq!(user.role, UserRole::Customer);
    }

    #[test]
    fn test_verified_from_confirmation_timestamp() {
        let mut su = session_user(UserMetadata::default());
        su.email_confirmed_at = Some(Utc::now());
        assert!(su.minimal_user().is_verified);
    }

    #[test]
    fn test_parses_provider_session() {
        let json = r#"{
            "access_token": "jwt",
            "refresh_token": "r1",
            "expires_at": "2026-01-01T00:00:00Z",
            "user": {
                "id": "u1",
                "email": "a@b.com",
                "phone": null,
                "user_metadata": {"full_name": "A B", "role": "vendor", "unknown": 1},
                "email_confirmed_at": "2025-12-01T10:00:00Z"
            }
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        let user = session.user.minimal_user();
        assert_eq!(user.role, UserRole::Vendor);
        assert!(user.is_verified);
        assert!(session.is_expired_at(Utc::now()));
    }
}
