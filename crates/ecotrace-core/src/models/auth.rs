use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role. Every client route is gated on one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Consumer,
    Manufacturer,
    Transporter,
    Lab,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Consumer,
        Role::Manufacturer,
        Role::Transporter,
        Role::Lab,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consumer => "consumer",
            Role::Manufacturer => "manufacturer",
            Role::Transporter => "transporter",
            Role::Lab => "lab",
        }
    }

    /// Landing page after login and redirect target for foreign routes.
    pub fn dashboard_path(&self) -> String {
        format!("/{}/dashboard", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role '{0}'. Must be: consumer, manufacturer, transporter, or lab")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "consumer" => Ok(Role::Consumer),
            "manufacturer" => Ok(Role::Manufacturer),
            "transporter" => Ok(Role::Transporter),
            "lab" => Ok(Role::Lab),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Who is operating the client. Injected into controllers at construction;
/// nothing in the core looks credentials up on its own.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub role: Role,
    pub display_name: String,
    token: String,
}

impl AuthContext {
    pub fn new(role: Role, token: impl Into<String>) -> Self {
        Self {
            role,
            display_name: "User".to_string(),
            token: token.into(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("role", &self.role)
            .field("display_name", &self.display_name)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Body returned by `/auth/login` and `/auth/register`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub role: Role,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("role", &self.role)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl AuthResponse {
    pub fn into_context(self) -> AuthContext {
        let name = self
            .username
            .or(self.email)
            .unwrap_or_else(|| "User".to_string());
        AuthContext::new(self.role, self.access_token).with_display_name(name)
    }
}
