use anyhow::anyhow;
use tracing::{info, instrument};

use genera_core::AppError;
use genera_core::permissions::{self as catalog, MANAGE_PERMISSIONS, VIEW_AUDIT_LOGS};
use genera_db::AccessStore;
use genera_models::audit::{AuditFilterParams, PaginatedAuditResponse};
use genera_models::permissions::{
    CatalogCategory, MatrixFilterParams, PermissionChange, PermissionChangeOutcome,
    PermissionCheckResponse, RolePermission, UpdatePermissionDto, catalog_by_category,
};
use genera_models::roles::RoleType;

use crate::authz::AccessContext;
use crate::metrics::{self, AccessEvent};

pub const ADMIN_LOCKOUT_MESSAGE: &str =
    "El rol administrador no puede perder el permiso manage_permissions";

fn require_known(key: &str) -> Result<(), AppError> {
    if catalog::is_known(key) {
        Ok(())
    } else {
        Err(AppError::bad_request(anyhow!("Permiso desconocido: {}", key)))
    }
}

pub struct PermissionService;

impl PermissionService {
    pub fn catalog() -> Vec<CatalogCategory> {
        catalog_by_category()
    }

    pub fn check(access: &AccessContext, key: &str) -> Result<PermissionCheckResponse, AppError> {
        require_known(key)?;
        Ok(PermissionCheckResponse {
            permission_key: key.to_string(),
            allowed: access.has_permission(key),
        })
    }

    #[instrument(skip(store, access))]
    pub async fn matrix(
        store: &dyn AccessStore,
        access: &AccessContext,
        filters: MatrixFilterParams,
    ) -> Result<Vec<RolePermission>, AppError> {
        access.require_permission(MANAGE_PERMISSIONS)?;
        Ok(store.list_permission_rows(&filters).await?)
    }

    /// Grants or revokes `key` for `role_type`. Takes effect on the next
    /// request of every user holding the role.
    #[instrument(skip(store, access, dto), fields(granted = dto.granted))]
    pub async fn update(
        store: &dyn AccessStore,
        access: &AccessContext,
        role_type: RoleType,
        key: &str,
        dto: UpdatePermissionDto,
    ) -> Result<PermissionChangeOutcome, AppError> {
        access.require_permission(MANAGE_PERMISSIONS)?;
        require_known(key)?;
        if role_type == RoleType::Admin && key == MANAGE_PERMISSIONS && !dto.granted {
            return Err(AppError::bad_request(anyhow!(ADMIN_LOCKOUT_MESSAGE)));
        }

        let outcome = store
            .set_permission(PermissionChange {
                role_type,
                permission_key: key.to_string(),
                granted: dto.granted,
                reason: dto.reason,
                performed_by: access.user_id(),
            })
            .await?;

        if outcome.changed {
            metrics::record(AccessEvent::PermissionChanged { granted: dto.granted });
            info!(
                role = %role_type,
                permission = key,
                previous = ?outcome.previous,
                performed_by = %access.user_id(),
                "Permission matrix updated"
            );
        }
        Ok(outcome)
    }

    #[instrument(skip(store, access))]
    pub async fn audit(
        store: &dyn AccessStore,
        access: &AccessContext,
        filters: AuditFilterParams,
    ) -> Result<PaginatedAuditResponse, AppError> {
        access.require_permission(VIEW_AUDIT_LOGS)?;
        let (data, total) = store.list_audit(&filters).await?;
        let meta = filters.pagination.meta(total, data.len());
        Ok(PaginatedAuditResponse { data, meta })
    }
}
