use serde::{Deserialize, Serialize};

/// Role carried in the access token claims.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Vehicle receiver, registered through the receiver form.
    User,
    /// Client who owns the vehicles being delivered.
    Client,
    Admin,
}

impl Role {
    pub fn to_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Client => "client",
            Role::Admin => "admin",
        }
    }
}

/// Claims decoded from the payload segment of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub role: Role,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_onboarded: bool,
    /// Expiry as a Unix timestamp, if the issuer set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Bearer token pair returned by the credential exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Response of the refresh-token exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access: String,
}

/// # Session state
///
/// Snapshot of who is logged in and what they may do. [`Session::default()`] is the initial,
/// unauthenticated state; an unauthenticated session never carries a role or user id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub role: Option<Role>,
    pub is_authenticated: bool,
    pub user_id: Option<i64>,
    pub approved: bool,
    pub onboarded: bool,
    pub error_message: Option<String>,
    /// Set while a login or registration request is outstanding.
    pub authenticating: bool,
}

impl Session {
    /// Builds an authenticated session from decoded claims.
    #[must_use]
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            role: Some(claims.role),
            is_authenticated: true,
            user_id: Some(claims.user_id),
            approved: claims.is_approved,
            onboarded: claims.is_onboarded,
            error_message: None,
            authenticating: false,
        }
    }

    /// Builds an unauthenticated session carrying an error message.
    #[must_use]
    pub fn anonymous_with_error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (self.is_authenticated, self.role) {
            (true, Some(role)) if !self.approved => SessionPhase::PendingApproval(role),
            (true, Some(role)) if !self.onboarded => SessionPhase::Onboarding(role),
            (true, Some(role)) => SessionPhase::Active(role),
            _ if self.authenticating => SessionPhase::Authenticating,
            _ => SessionPhase::Anonymous,
        }
    }
}

/// Coarse position of a [`Session`] in the authorization state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    /// Authenticated, but an administrator has not approved the account yet.
    PendingApproval(Role),
    /// Approved, but the onboarding guide has not been acknowledged.
    Onboarding(Role),
    Active(Role),
}
