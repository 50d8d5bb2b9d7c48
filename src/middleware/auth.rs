use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::warn;

use genera_auth::{Claims, verify_token};
use genera_core::AppError;
use genera_db::StoreError;
use genera_models::ids::UserId;

use crate::authz::AccessContext;
use crate::metrics::{self, AccessEvent};
use crate::state::AppState;

/// Extractor that validates the bearer token and provides its claims.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> Result<UserId, AppError> {
        self.0.user_id().map(UserId::from)
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }
}

pub(crate) fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Falta el encabezado de autorización"))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("Formato de autorización inválido"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = verify_token(token, &state.jwt_config)?;
        metrics::record(AccessEvent::TokenAccepted);
        Ok(AuthUser(claims))
    }
}

/// Authenticated and approved caller, with roles and grants loaded.
///
/// Handlers take `Access` and ask it for decisions; see [`crate::authz`].
#[derive(Debug, Clone)]
pub struct Access(pub AccessContext);

impl std::ops::Deref for Access {
    type Target = AccessContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for Access {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        let user_id = UserId::from(claims.user_id()?);

        let profile = match state.store().get_profile(user_id).await {
            Ok(profile) => profile,
            Err(StoreError::NotFound(_)) => {
                warn!(user.id = %user_id, "Token subject has no profile");
                return Err(AppError::unauthorized("Token inválido o expirado"));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(message) = profile.approval_status.denial_message() {
            warn!(user.id = %user_id, status = %profile.approval_status, "Rejected token of unapproved user");
            return Err(AppError::forbidden(message));
        }

        let context = AccessContext::load(state.store(), profile).await?;
        Ok(Access(context))
    }
}
