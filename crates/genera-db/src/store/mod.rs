//! The access-control store.
//!
//! Every mutation that the audit trail records (matrix edits, role
//! assignments and removals, approval changes) is applied together with its
//! audit entry: in one transaction for Postgres, under one write lock in
//! memory.

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use genera_core::AppError;
use genera_models::audit::{AuditAction, AuditEntry, AuditFilterParams, NewAuditEntry};
use genera_models::consultants::{
    ConsultantAssignment, ConsultantAssignmentFilterParams, NewConsultantAssignment,
    UpdateConsultantAssignmentDto,
};
use genera_models::ids::{
    CommunityId, ConsultantAssignmentId, GenerationId, NetworkId, RoleAssignmentId, SchoolId,
    UserId,
};
use genera_models::organizations::{
    Community, Generation, Network, NetworkMembership, NetworkUpdate, NewCommunity, School,
    SchoolFilterParams, UpdateSchoolDto,
};
use genera_models::permissions::{
    MatrixFilterParams, PermissionChange, PermissionChangeOutcome, PermissionSeed, RolePermission,
    SeedReport,
};
use genera_models::profiles::{
    ApprovalStatus, NewProfile, Profile, ProfileCredentials, ProfileFilterParams, ProfileUpdate,
};
use genera_models::roles::{LeaderCommunity, NewRoleAssignment, RoleAssignment, RoleType};
use genera_models::visibility::Visibility;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::not_found(anyhow::Error::msg(msg)),
            StoreError::Conflict(msg) => AppError::conflict(msg),
            StoreError::Database(e) => AppError::internal(e),
            StoreError::Unexpected(e) => AppError::internal(e),
        }
    }
}

/// Approval status change of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalChange {
    pub user_id: UserId,
    pub status: ApprovalStatus,
    pub reason: Option<String>,
    pub performed_by: Option<UserId>,
}

/// Soft removal of a role assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRemoval {
    pub assignment_id: RoleAssignmentId,
    pub reason: Option<String>,
    pub performed_by: Option<UserId>,
}

pub(crate) const LAST_ADMIN_MESSAGE: &str = "No se puede quitar el rol al último administrador activo";
pub(crate) const DUPLICATE_ASSIGNMENT_MESSAGE: &str = "El usuario ya tiene este rol asignado";
pub(crate) const DUPLICATE_EMAIL_MESSAGE: &str = "Ya existe un usuario con este correo";
pub(crate) const DUPLICATE_SCHOOL_MESSAGE: &str = "Ya existe una escuela con este nombre";
pub(crate) const DUPLICATE_GENERATION_MESSAGE: &str =
    "Ya existe una generación con este nombre en la escuela";
pub(crate) const DUPLICATE_COMMUNITY_MESSAGE: &str = "Ya existe una comunidad con este nombre";
pub(crate) const DUPLICATE_NETWORK_MESSAGE: &str = "Ya existe una red con este nombre";
pub(crate) const ACTIVE_SUPERVISORS_MESSAGE: &str =
    "No se puede eliminar la red porque tiene supervisores activos asignados";
pub(crate) const DUPLICATE_CONSULTANT_MESSAGE: &str =
    "El consultor ya tiene una asignación activa para este destino";
pub(crate) const INACTIVE_ASSIGNMENT_MESSAGE: &str = "La asignación de rol ya está inactiva";

pub(crate) const USER_NOT_FOUND: &str = "Usuario no encontrado";
pub(crate) const SCHOOL_NOT_FOUND: &str = "Escuela no encontrada";
pub(crate) const GENERATION_NOT_FOUND: &str = "Generación no encontrada";
pub(crate) const COMMUNITY_NOT_FOUND: &str = "Comunidad no encontrada";
pub(crate) const NETWORK_NOT_FOUND: &str = "Red no encontrada";
pub(crate) const ASSIGNMENT_NOT_FOUND: &str = "Asignación de rol no encontrada";
pub(crate) const CONSULTANT_ASSIGNMENT_NOT_FOUND: &str = "Asignación de consultor no encontrada";
pub(crate) const MEMBERSHIP_NOT_FOUND: &str = "La escuela no pertenece a la red";

pub(crate) fn missing(msg: &str) -> StoreError {
    StoreError::NotFound(msg.to_string())
}

fn assignment_value(assignment: &RoleAssignment) -> Value {
    json!({
        "assignment_id": assignment.id,
        "role_type": assignment.role_type,
        "school_id": assignment.school_id,
        "generation_id": assignment.generation_id,
        "community_id": assignment.community_id,
        "network_id": assignment.network_id,
        "is_active": assignment.is_active,
    })
}

pub(crate) fn role_assigned_entry(assignment: &RoleAssignment) -> NewAuditEntry {
    NewAuditEntry::new(AuditAction::RoleAssigned)
        .role_type(assignment.role_type)
        .user(assignment.user_id)
        .values(None, assignment_value(assignment))
        .performed_by(assignment.assigned_by)
}

pub(crate) fn role_removed_entry(
    before: &RoleAssignment,
    after: &RoleAssignment,
    removal: &RoleRemoval,
) -> NewAuditEntry {
    NewAuditEntry::new(AuditAction::RoleRemoved)
        .role_type(before.role_type)
        .user(before.user_id)
        .values(Some(assignment_value(before)), assignment_value(after))
        .reason(removal.reason.clone())
        .performed_by(removal.performed_by)
}

pub(crate) fn approval_entry(previous: ApprovalStatus, change: &ApprovalChange) -> NewAuditEntry {
    NewAuditEntry::new(AuditAction::ApprovalChanged)
        .user(change.user_id)
        .values(
            Some(json!(previous.as_str())),
            json!(change.status.as_str()),
        )
        .reason(change.reason.clone())
        .performed_by(change.performed_by)
}

pub(crate) fn permission_entry(change: &PermissionChange, previous: Option<bool>) -> NewAuditEntry {
    NewAuditEntry::new(AuditAction::for_permission_change(previous, change.granted))
        .role_type(change.role_type)
        .permission_key(change.permission_key.clone())
        .values(previous.map(Value::Bool), Value::Bool(change.granted))
        .reason(change.reason.clone())
        .performed_by(Some(change.performed_by))
}

pub(crate) fn seeded_entry(seed: &PermissionSeed, performed_by: Option<UserId>) -> NewAuditEntry {
    NewAuditEntry::new(AuditAction::PermissionCreated)
        .role_type(seed.role_type)
        .permission_key(seed.permission_key.clone())
        .values(None, Value::Bool(seed.granted))
        .reason(Some("seed".to_string()))
        .performed_by(performed_by)
}

#[async_trait]
pub trait AccessStore: Send + Sync {
    // Profiles
    async fn create_profile(&self, profile: NewProfile) -> StoreResult<Profile>;
    async fn get_profile(&self, id: UserId) -> StoreResult<Profile>;
    /// Looks up a profile by email, ignoring case.
    async fn find_credentials(&self, email: &str) -> StoreResult<Option<ProfileCredentials>>;
    async fn list_profiles(
        &self,
        filter: &ProfileFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<(Vec<Profile>, i64)>;
    async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> StoreResult<Profile>;
    async fn change_approval(&self, change: ApprovalChange) -> StoreResult<Profile>;

    // Organizations
    async fn create_school(&self, name: &str, has_generations: bool) -> StoreResult<School>;
    async fn get_school(&self, id: SchoolId) -> StoreResult<School>;
    async fn list_schools(
        &self,
        filter: &SchoolFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<(Vec<School>, i64)>;
    async fn update_school(&self, id: SchoolId, update: UpdateSchoolDto) -> StoreResult<School>;
    /// Creates a generation and marks its school as organized in generations.
    async fn create_generation(
        &self,
        school_id: SchoolId,
        name: &str,
        grade_range: Option<&str>,
    ) -> StoreResult<Generation>;
    async fn get_generation(&self, id: GenerationId) -> StoreResult<Generation>;
    async fn list_generations(&self, school_id: SchoolId) -> StoreResult<Vec<Generation>>;
    async fn create_community(&self, community: NewCommunity) -> StoreResult<Community>;
    async fn get_community(&self, id: CommunityId) -> StoreResult<Community>;
    async fn list_communities(&self, school_id: SchoolId) -> StoreResult<Vec<Community>>;

    // Networks
    async fn create_network(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Option<UserId>,
    ) -> StoreResult<Network>;
    async fn get_network(&self, id: NetworkId) -> StoreResult<Network>;
    async fn list_networks(&self) -> StoreResult<Vec<Network>>;
    /// Fails with [`StoreError::Conflict`] when the new name is taken.
    async fn update_network(&self, id: NetworkId, update: NetworkUpdate) -> StoreResult<Network>;
    /// Deletes a network with its memberships. Fails with
    /// [`StoreError::Conflict`] while an active `supervisor_de_red`
    /// assignment points at it.
    async fn delete_network(&self, id: NetworkId) -> StoreResult<()>;
    /// Adding a school that is already a member returns the existing row.
    async fn add_network_school(
        &self,
        network_id: NetworkId,
        school_id: SchoolId,
        assigned_by: Option<UserId>,
    ) -> StoreResult<NetworkMembership>;
    async fn remove_network_school(
        &self,
        network_id: NetworkId,
        school_id: SchoolId,
    ) -> StoreResult<()>;
    async fn list_network_schools(&self, network_id: NetworkId) -> StoreResult<Vec<School>>;
    async fn network_ids_of_school(&self, school_id: SchoolId) -> StoreResult<Vec<NetworkId>>;

    // Role assignments
    async fn list_assignments(
        &self,
        user_id: UserId,
        include_inactive: bool,
    ) -> StoreResult<Vec<RoleAssignment>>;
    async fn list_active_assignments(&self) -> StoreResult<Vec<RoleAssignment>>;
    async fn get_assignment(&self, id: RoleAssignmentId) -> StoreResult<RoleAssignment>;
    /// Inserts an active assignment and its audit entry. When
    /// `leader_community` is given, the community is fetched or created first
    /// and the assignment is anchored to it.
    async fn assign_role(
        &self,
        assignment: NewRoleAssignment,
        leader_community: Option<LeaderCommunity>,
    ) -> StoreResult<RoleAssignment>;
    /// Deactivates an assignment and records the removal. Fails with
    /// [`StoreError::Conflict`] when it is the last active admin assignment.
    async fn remove_role(&self, removal: RoleRemoval) -> StoreResult<RoleAssignment>;

    // Consultant assignments
    /// Fails with [`StoreError::Conflict`] when the consultant already has an
    /// active assignment for the same student, or for the same anchors.
    async fn create_consultant_assignment(
        &self,
        assignment: NewConsultantAssignment,
    ) -> StoreResult<ConsultantAssignment>;
    async fn get_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
    ) -> StoreResult<ConsultantAssignment>;
    async fn list_consultant_assignments(
        &self,
        filter: &ConsultantAssignmentFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<Vec<ConsultantAssignment>>;
    async fn update_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
        update: UpdateConsultantAssignmentDto,
    ) -> StoreResult<ConsultantAssignment>;
    /// Marks the assignment inactive. Deactivating an inactive one is a no-op.
    async fn deactivate_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
    ) -> StoreResult<ConsultantAssignment>;

    // Permission matrix
    /// Every row (effective or not) for the given role types.
    async fn permission_rows(&self, role_types: &[RoleType]) -> StoreResult<Vec<RolePermission>>;
    async fn list_permission_rows(
        &self,
        filter: &MatrixFilterParams,
    ) -> StoreResult<Vec<RolePermission>>;
    /// Sets `granted` on the live rows of a (role type, key) pair, creating
    /// the row when there is none. Writes an audit entry when anything
    /// changed.
    async fn set_permission(&self, change: PermissionChange)
    -> StoreResult<PermissionChangeOutcome>;
    /// Inserts the seeds whose (role type, key) has no live row yet.
    async fn seed_permissions(
        &self,
        seeds: &[PermissionSeed],
        performed_by: Option<UserId>,
    ) -> StoreResult<SeedReport>;

    // Audit trail
    async fn list_audit(&self, filter: &AuditFilterParams) -> StoreResult<(Vec<AuditEntry>, i64)>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
