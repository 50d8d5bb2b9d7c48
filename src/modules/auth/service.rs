use tracing::{info, instrument, warn};

use genera_auth::create_access_token;
use genera_config::JwtConfig;
use genera_core::{AppError, verify_password};
use genera_db::AccessStore;
use genera_models::auth::{LoginRequest, LoginResponse, MeResponse};
use genera_models::roles::{DataScope, RoleType};

use crate::authz::AccessContext;
use crate::metrics::{self, AccessEvent};

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Correo o contraseña incorrectos";

pub struct AuthService;

impl AuthService {
    /// Checks credentials and approval, then issues an access token.
    ///
    /// Unknown emails and wrong passwords get the same 401 so that the
    /// response does not reveal which accounts exist.
    #[instrument(skip(store, dto, jwt_config), fields(email = %dto.email))]
    pub async fn login(
        store: &dyn AccessStore,
        dto: LoginRequest,
        jwt_config: &JwtConfig,
    ) -> Result<LoginResponse, AppError> {
        let Some(credentials) = store.find_credentials(&dto.email).await? else {
            metrics::record(AccessEvent::LoginFailed { reason: "unknown_email" });
            warn!("Login attempt for unknown email");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS_MESSAGE));
        };

        if !verify_password(&dto.password, &credentials.password_hash)? {
            metrics::record(AccessEvent::LoginFailed { reason: "invalid_password" });
            warn!(user.id = %credentials.profile.id, "Login attempt with wrong password");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS_MESSAGE));
        }

        let profile = credentials.profile;
        if let Some(message) = profile.approval_status.denial_message() {
            metrics::record(AccessEvent::LoginFailed { reason: "not_approved" });
            warn!(user.id = %profile.id, status = %profile.approval_status, "Login of unapproved user");
            return Err(AppError::forbidden(message));
        }

        let access_token = create_access_token(profile.id.into_inner(), &profile.email, jwt_config)?;
        metrics::record(AccessEvent::LoginSucceeded);
        metrics::record(AccessEvent::TokenIssued);
        info!(user.id = %profile.id, "User logged in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer",
            expires_in: jwt_config.access_token_expiry,
            user: profile,
        })
    }

    pub fn me(access: &AccessContext) -> MeResponse {
        let roles = access.assignments().to_vec();
        MeResponse {
            user: access.profile().clone(),
            highest_role: RoleType::highest(roles.iter().map(|r| r.role_type)),
            permissions: access.effective_permissions(),
            data_scope: DataScope::resolve(access.user_id(), &roles),
            roles,
        }
    }
}
