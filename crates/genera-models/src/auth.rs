//! Login and session DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::profiles::Profile;
use crate::roles::{DataScope, RoleAssignment, RoleType};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Correo electrónico inválido"))]
    #[schema(example = "admin@genera.cl")]
    pub email: String,
    #[validate(length(min = 1, message = "La contraseña es obligatoria"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: &'static str,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: Profile,
}

/// The caller's profile, roles, and effective permissions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: Profile,
    pub roles: Vec<RoleAssignment>,
    pub highest_role: Option<RoleType>,
    /// Effective permission keys, including keys implied by wider scopes.
    pub permissions: Vec<String>,
    pub data_scope: Option<DataScope>,
}

/// Generic success message response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
