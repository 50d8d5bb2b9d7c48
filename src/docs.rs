use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use genera_core::permissions::Scope;
use genera_core::{PaginationMeta, PaginationParams};
use genera_models::audit::{AuditAction, AuditEntry, PaginatedAuditResponse};
use genera_models::auth::{LoginRequest, LoginResponse, MeResponse, MessageResponse};
use genera_models::consultants::{
    ConsultantAssignment, ConsultantScope, CreateConsultantAssignmentDto,
    UpdateConsultantAssignmentDto,
};
use genera_models::organizations::{
    Community, CreateCommunityDto, CreateGenerationDto, CreateNetworkDto, CreateSchoolDto,
    Generation, Network, NetworkMembership, NetworkWithSchools, PaginatedSchoolsResponse, School,
    UpdateNetworkDto, UpdateSchoolDto,
};
use genera_models::permissions::{
    CatalogCategory, CatalogEntry, PermissionChangeOutcome, PermissionCheckResponse,
    RolePermission, UpdatePermissionDto,
};
use genera_models::profiles::{
    ApprovalStatus, CreateUserDto, PaginatedProfilesResponse, Profile, ProfileWithRoles,
    UpdateApprovalDto, UpdateUserDto,
};
use genera_models::roles::{
    AssignRoleDto, DataScope, ReportingScope, RoleAssignment, RoleInfo, RoleRequirements,
    RoleType,
};

use crate::modules::auth::controller::ErrorResponse;
use crate::router::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::router::health_check,
        crate::modules::auth::controller::login_user,
        crate::modules::auth::controller::get_me,
        crate::modules::users::controller::get_users,
        crate::modules::users::controller::create_user,
        crate::modules::users::controller::get_user,
        crate::modules::users::controller::update_user,
        crate::modules::users::controller::update_approval,
        crate::modules::users::controller::delete_user,
        crate::modules::roles::controller::get_roles,
        crate::modules::roles::controller::get_user_roles,
        crate::modules::roles::controller::assign_role,
        crate::modules::roles::controller::remove_role,
        crate::modules::permissions::controller::get_catalog,
        crate::modules::permissions::controller::check_permission,
        crate::modules::permissions::controller::get_matrix,
        crate::modules::permissions::controller::update_permission,
        crate::modules::permissions::controller::get_audit,
        crate::modules::schools::controller::get_schools,
        crate::modules::schools::controller::create_school,
        crate::modules::schools::controller::get_school,
        crate::modules::schools::controller::update_school,
        crate::modules::schools::controller::get_generations,
        crate::modules::schools::controller::create_generation,
        crate::modules::schools::controller::get_communities,
        crate::modules::schools::controller::create_community,
        crate::modules::networks::controller::get_networks,
        crate::modules::networks::controller::create_network,
        crate::modules::networks::controller::update_network,
        crate::modules::networks::controller::delete_network,
        crate::modules::networks::controller::get_network_schools,
        crate::modules::networks::controller::add_network_school,
        crate::modules::networks::controller::remove_network_school,
        crate::modules::consultants::controller::get_assignments,
        crate::modules::consultants::controller::create_assignment,
        crate::modules::consultants::controller::update_assignment,
        crate::modules::consultants::controller::delete_assignment,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            MessageResponse,
            LoginRequest,
            LoginResponse,
            MeResponse,
            Profile,
            ApprovalStatus,
            CreateUserDto,
            UpdateUserDto,
            UpdateApprovalDto,
            PaginatedProfilesResponse,
            ProfileWithRoles,
            RoleType,
            RoleInfo,
            RoleRequirements,
            ReportingScope,
            RoleAssignment,
            AssignRoleDto,
            DataScope,
            Scope,
            CatalogCategory,
            CatalogEntry,
            RolePermission,
            UpdatePermissionDto,
            PermissionChangeOutcome,
            PermissionCheckResponse,
            AuditAction,
            AuditEntry,
            PaginatedAuditResponse,
            School,
            CreateSchoolDto,
            UpdateSchoolDto,
            PaginatedSchoolsResponse,
            Generation,
            CreateGenerationDto,
            Community,
            CreateCommunityDto,
            Network,
            CreateNetworkDto,
            UpdateNetworkDto,
            NetworkMembership,
            NetworkWithSchools,
            ConsultantScope,
            ConsultantAssignment,
            CreateConsultantAssignmentDto,
            UpdateConsultantAssignmentDto,
            PaginationMeta,
            PaginationParams,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and store connectivity"),
        (name = "Authentication", description = "Login and current session"),
        (name = "Users", description = "Profiles, approval, and soft deletion"),
        (name = "Roles", description = "Role catalog and role assignments"),
        (name = "Permissions", description = "Permission catalog, matrix editing, and audit trail"),
        (name = "Schools", description = "Schools, generations, and growth communities"),
        (name = "Networks", description = "School networks and their supervision"),
        (name = "Consultants", description = "Consultants assigned to students and organizations")
    ),
    info(
        title = "Genera Access API",
        version = "0.1.0",
        description = "Role-based, organization-scoped access control for the Genera learning platform.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/auth/login",
            "/api/users/{id}/roles/{assignment_id}",
            "/api/permissions/matrix/{role_type}/{permission_key}",
            "/api/schools/{id}/communities",
            "/api/networks/{id}",
            "/api/networks/{id}/schools/{school_id}",
            "/api/consultant-assignments/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
