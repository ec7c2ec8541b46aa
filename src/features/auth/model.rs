use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Token subject; every tenant-scoped row stores it as `user_id`
    pub sub: String,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    /// Tenant key used to scope every query
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomClaims {
    #[serde(default)]
    pub roles: Vec<String>,
}
