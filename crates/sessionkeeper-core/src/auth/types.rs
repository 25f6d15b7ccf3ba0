//! Wire types exchanged with the authentication endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Strategy used to exchange a refresh token for a new access token.
pub const REFRESH_STRATEGY: &str = "refreshToken";

/// Strategy used to re-validate a stored access token.
pub const JWT_STRATEGY: &str = "jwt";

/// Strategy used for username/password logins.
pub const LOCAL_STRATEGY: &str = "local";

/// Outgoing authentication request: `{strategy, ...credentials, deviceId?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    pub strategy: String,
    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub credentials: Map<String, Value>,
}

impl AuthenticationRequest {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            device_id: None,
            credentials: Map::new(),
        }
    }

    /// Email/password login against the `local` strategy.
    pub fn local(email: &str, password: &str) -> Self {
        Self::new(LOCAL_STRATEGY)
            .with("email", email)
            .with("password", password)
    }

    pub fn refresh(refresh_token: &str) -> Self {
        Self::new(REFRESH_STRATEGY).with("refreshToken", refresh_token)
    }

    pub fn access_token(strategy: &str, access_token: &str) -> Self {
        Self::new(strategy).with("accessToken", access_token)
    }

    /// Add a credential field to the request body.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.credentials.insert(field.to_string(), value.into());
        self
    }

    /// Attach the device identifier, replacing any caller-supplied `deviceId`.
    pub fn with_device_id(mut self, device_id: Option<String>) -> Self {
        self.credentials.remove("deviceId");
        self.device_id = device_id;
        self
    }
}

/// JWT claims of the issued access token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    #[serde(default)]
    pub payload: TokenPayload,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Raw success body from the endpoint, including the housekeeping fields
/// (`refreshToken`, `deviceId`) that the session persists and strips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub authentication: Authentication,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AuthenticationResponse {
    pub fn exp(&self) -> Option<i64> {
        self.authentication.payload.exp
    }

    pub fn access_token(&self) -> Option<&str> {
        self.fields.get("accessToken").and_then(Value::as_str)
    }

    /// Drop the housekeeping fields, keeping what callers are meant to see.
    pub fn into_result(self) -> AuthenticationResult {
        AuthenticationResult {
            authentication: self.authentication,
            fields: self.fields,
        }
    }
}

/// What callers receive from a successful authenticate or refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub authentication: Authentication,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AuthenticationResult {
    pub fn exp(&self) -> Option<i64> {
        self.authentication.payload.exp
    }

    pub fn access_token(&self) -> Option<&str> {
        self.fields.get("accessToken").and_then(Value::as_str)
    }

    /// Application-level field forwarded unchanged from the server (e.g. `user`).
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
