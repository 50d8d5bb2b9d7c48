//! In-memory store.
//!
//! Used by the test suite and for local runs without `DATABASE_URL`. All
//! state lives behind one `tokio::sync::RwLock`, so a mutation and its audit
//! entry are applied under the same write guard. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use genera_core::PaginationParams;
use genera_models::audit::{AuditEntry, AuditFilterParams, NewAuditEntry};
use genera_models::consultants::{
    ConsultantAssignment, ConsultantAssignmentFilterParams, NewConsultantAssignment,
    UpdateConsultantAssignmentDto,
};
use genera_models::ids::{
    CommunityId, ConsultantAssignmentId, GenerationId, NetworkId, RoleAssignmentId,
    RolePermissionId, SchoolId, UserId,
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
    NewProfile, Profile, ProfileCredentials, ProfileFilterParams, ProfileUpdate,
};
use genera_models::roles::{LeaderCommunity, NewRoleAssignment, RoleAssignment, RoleType};
use genera_models::visibility::Visibility;

use super::*;

#[derive(Default)]
struct State {
    profiles: HashMap<UserId, ProfileCredentials>,
    schools: HashMap<SchoolId, School>,
    generations: HashMap<GenerationId, Generation>,
    communities: HashMap<CommunityId, Community>,
    networks: HashMap<NetworkId, Network>,
    memberships: Vec<NetworkMembership>,
    assignments: HashMap<RoleAssignmentId, RoleAssignment>,
    consultants: HashMap<ConsultantAssignmentId, ConsultantAssignment>,
    permissions: Vec<RolePermission>,
    /// Oldest first.
    audit: Vec<AuditEntry>,
}

impl State {
    fn record(&mut self, entry: NewAuditEntry) {
        self.audit.push(entry.into_entry(Utc::now()));
    }

    fn profile(&self, id: UserId) -> StoreResult<&ProfileCredentials> {
        self.profiles.get(&id).ok_or_else(|| missing(USER_NOT_FOUND))
    }

    fn school(&self, id: SchoolId) -> StoreResult<&School> {
        self.schools.get(&id).ok_or_else(|| missing(SCHOOL_NOT_FOUND))
    }

    fn network(&self, id: NetworkId) -> StoreResult<&Network> {
        self.networks.get(&id).ok_or_else(|| missing(NETWORK_NOT_FOUND))
    }

    fn consultant_assignment(
        &mut self,
        id: ConsultantAssignmentId,
    ) -> StoreResult<&mut ConsultantAssignment> {
        self.consultants
            .get_mut(&id)
            .ok_or_else(|| missing(CONSULTANT_ASSIGNMENT_NOT_FOUND))
    }

    fn find_community(&self, community: &NewCommunity) -> Option<&Community> {
        self.communities.values().find(|c| {
            c.school_id == community.school_id
                && c.generation_id == community.generation_id
                && c.name == community.name
        })
    }

    fn insert_community(&mut self, community: NewCommunity) -> Community {
        let community = Community {
            id: CommunityId::new(),
            school_id: community.school_id,
            generation_id: community.generation_id,
            name: community.name,
            max_teachers: community.max_teachers,
            created_at: Utc::now(),
        };
        self.communities.insert(community.id, community.clone());
        community
    }

    /// Active, non-test rows of one matrix cell, oldest first.
    fn live_rows(&mut self, role_type: RoleType, key: &str) -> Vec<&mut RolePermission> {
        let mut rows: Vec<_> = self
            .permissions
            .iter_mut()
            .filter(|p| p.role_type == role_type && p.permission_key == key && p.active && !p.is_test)
            .collect();
        rows.sort_by_key(|p| p.created_at);
        rows
    }

    fn has_live_row(&self, role_type: RoleType, key: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.role_type == role_type && p.permission_key == key && p.active && !p.is_test)
    }

    fn push_permission(
        &mut self,
        role_type: RoleType,
        key: &str,
        granted: bool,
        reason: Option<String>,
        created_by: Option<UserId>,
    ) -> RolePermission {
        let now = Utc::now();
        let row = RolePermission {
            id: RolePermissionId::new(),
            role_type,
            permission_key: key.to_string(),
            granted,
            is_test: false,
            active: true,
            reason,
            expires_at: None,
            created_by,
            test_run_id: None,
            created_at: now,
            updated_at: now,
        };
        self.permissions.push(row.clone());
        row
    }
}

fn paginate<T>(items: Vec<T>, pagination: &PaginationParams) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit() as usize)
        .collect();
    (page, total)
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn create_profile(&self, profile: NewProfile) -> StoreResult<Profile> {
        let mut state = self.state.write().await;
        let email = profile.email.to_lowercase();
        if state
            .profiles
            .values()
            .any(|c| c.profile.email.to_lowercase() == email)
        {
            return Err(StoreError::Conflict(DUPLICATE_EMAIL_MESSAGE.into()));
        }
        let now = Utc::now();
        let created = Profile {
            id: UserId::new(),
            email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            school_id: profile.school_id,
            generation_id: profile.generation_id,
            community_id: profile.community_id,
            approval_status: profile.approval_status,
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(
            created.id,
            ProfileCredentials {
                profile: created.clone(),
                password_hash: profile.password_hash,
            },
        );
        Ok(created)
    }

    async fn get_profile(&self, id: UserId) -> StoreResult<Profile> {
        let state = self.state.read().await;
        Ok(state.profile(id)?.profile.clone())
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<ProfileCredentials>> {
        let email = email.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .profiles
            .values()
            .find(|c| c.profile.email == email)
            .cloned())
    }

    async fn list_profiles(
        &self,
        filter: &ProfileFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<(Vec<Profile>, i64)> {
        let state = self.state.read().await;
        let mut profiles: Vec<Profile> = state
            .profiles
            .values()
            .map(|c| &c.profile)
            .filter(|p| filter.matches(p) && visibility.allows_profile(p))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(paginate(profiles, &filter.pagination))
    }

    async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> StoreResult<Profile> {
        let mut state = self.state.write().await;
        let credentials = state
            .profiles
            .get_mut(&id)
            .ok_or_else(|| missing(USER_NOT_FOUND))?;
        update.apply(&mut credentials.profile);
        credentials.profile.updated_at = Utc::now();
        Ok(credentials.profile.clone())
    }

    async fn change_approval(&self, change: ApprovalChange) -> StoreResult<Profile> {
        let mut state = self.state.write().await;
        let previous = state.profile(change.user_id)?.profile.approval_status;
        if previous == change.status {
            return Ok(state.profile(change.user_id)?.profile.clone());
        }
        let profile = {
            let credentials = state
                .profiles
                .get_mut(&change.user_id)
                .ok_or_else(|| missing(USER_NOT_FOUND))?;
            credentials.profile.approval_status = change.status;
            credentials.profile.updated_at = Utc::now();
            credentials.profile.clone()
        };
        state.record(approval_entry(previous, &change));
        Ok(profile)
    }

    async fn create_school(&self, name: &str, has_generations: bool) -> StoreResult<School> {
        let mut state = self.state.write().await;
        if state.schools.values().any(|s| s.name == name) {
            return Err(StoreError::Conflict(DUPLICATE_SCHOOL_MESSAGE.into()));
        }
        let now = Utc::now();
        let school = School {
            id: SchoolId::new(),
            name: name.to_string(),
            has_generations,
            created_at: now,
            updated_at: now,
        };
        state.schools.insert(school.id, school.clone());
        Ok(school)
    }

    async fn get_school(&self, id: SchoolId) -> StoreResult<School> {
        let state = self.state.read().await;
        state.school(id).cloned()
    }

    async fn list_schools(
        &self,
        filter: &SchoolFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<(Vec<School>, i64)> {
        let state = self.state.read().await;
        let mut schools: Vec<School> = state
            .schools
            .values()
            .filter(|s| filter.matches(s) && visibility.allows_school(s))
            .cloned()
            .collect();
        schools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(schools, &filter.pagination))
    }

    async fn update_school(&self, id: SchoolId, update: UpdateSchoolDto) -> StoreResult<School> {
        let mut state = self.state.write().await;
        if let Some(name) = &update.name {
            if state.schools.values().any(|s| s.id != id && &s.name == name) {
                return Err(StoreError::Conflict(DUPLICATE_SCHOOL_MESSAGE.into()));
            }
        }
        let school = state
            .schools
            .get_mut(&id)
            .ok_or_else(|| missing(SCHOOL_NOT_FOUND))?;
        if let Some(name) = update.name {
            school.name = name;
        }
        if let Some(has_generations) = update.has_generations {
            school.has_generations = has_generations;
        }
        school.updated_at = Utc::now();
        Ok(school.clone())
    }

    async fn create_generation(
        &self,
        school_id: SchoolId,
        name: &str,
        grade_range: Option<&str>,
    ) -> StoreResult<Generation> {
        let mut state = self.state.write().await;
        state.school(school_id)?;
        if state
            .generations
            .values()
            .any(|g| g.school_id == school_id && g.name == name)
        {
            return Err(StoreError::Conflict(DUPLICATE_GENERATION_MESSAGE.into()));
        }
        let generation = Generation {
            id: GenerationId::new(),
            school_id,
            name: name.to_string(),
            grade_range: grade_range.map(str::to_string),
            created_at: Utc::now(),
        };
        state.generations.insert(generation.id, generation.clone());
        if let Some(school) = state.schools.get_mut(&school_id) {
            school.has_generations = true;
            school.updated_at = Utc::now();
        }
        Ok(generation)
    }

    async fn get_generation(&self, id: GenerationId) -> StoreResult<Generation> {
        let state = self.state.read().await;
        state
            .generations
            .get(&id)
            .cloned()
            .ok_or_else(|| missing(GENERATION_NOT_FOUND))
    }

    async fn list_generations(&self, school_id: SchoolId) -> StoreResult<Vec<Generation>> {
        let state = self.state.read().await;
        let mut generations: Vec<Generation> = state
            .generations
            .values()
            .filter(|g| g.school_id == school_id)
            .cloned()
            .collect();
        generations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(generations)
    }

    async fn create_community(&self, community: NewCommunity) -> StoreResult<Community> {
        let mut state = self.state.write().await;
        state.school(community.school_id)?;
        if state.find_community(&community).is_some() {
            return Err(StoreError::Conflict(DUPLICATE_COMMUNITY_MESSAGE.into()));
        }
        Ok(state.insert_community(community))
    }

    async fn get_community(&self, id: CommunityId) -> StoreResult<Community> {
        let state = self.state.read().await;
        state
            .communities
            .get(&id)
            .cloned()
            .ok_or_else(|| missing(COMMUNITY_NOT_FOUND))
    }

    async fn list_communities(&self, school_id: SchoolId) -> StoreResult<Vec<Community>> {
        let state = self.state.read().await;
        let mut communities: Vec<Community> = state
            .communities
            .values()
            .filter(|c| c.school_id == school_id)
            .cloned()
            .collect();
        communities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(communities)
    }

    async fn create_network(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Option<UserId>,
    ) -> StoreResult<Network> {
        let mut state = self.state.write().await;
        if state.networks.values().any(|n| n.name == name) {
            return Err(StoreError::Conflict(DUPLICATE_NETWORK_MESSAGE.into()));
        }
        let network = Network {
            id: NetworkId::new(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_by,
            created_at: Utc::now(),
        };
        state.networks.insert(network.id, network.clone());
        Ok(network)
    }

    async fn get_network(&self, id: NetworkId) -> StoreResult<Network> {
        let state = self.state.read().await;
        state.network(id).cloned()
    }

    async fn list_networks(&self) -> StoreResult<Vec<Network>> {
        let state = self.state.read().await;
        let mut networks: Vec<Network> = state.networks.values().cloned().collect();
        networks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(networks)
    }

    async fn update_network(&self, id: NetworkId, update: NetworkUpdate) -> StoreResult<Network> {
        let mut state = self.state.write().await;
        state.network(id)?;
        if let Some(name) = &update.name {
            if state.networks.values().any(|n| n.id != id && &n.name == name) {
                return Err(StoreError::Conflict(DUPLICATE_NETWORK_MESSAGE.into()));
            }
        }
        let network = state
            .networks
            .get_mut(&id)
            .ok_or_else(|| missing(NETWORK_NOT_FOUND))?;
        if let Some(name) = update.name {
            network.name = name;
        }
        if let Some(description) = update.description {
            network.description = description;
        }
        Ok(network.clone())
    }

    async fn delete_network(&self, id: NetworkId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.network(id)?;
        let supervised = state.assignments.values().any(|a| {
            a.is_active && a.role_type == RoleType::SupervisorDeRed && a.network_id == Some(id)
        });
        if supervised {
            return Err(StoreError::Conflict(ACTIVE_SUPERVISORS_MESSAGE.into()));
        }
        state.networks.remove(&id);
        state.memberships.retain(|m| m.network_id != id);
        state.assignments.retain(|_, a| a.network_id != Some(id));
        Ok(())
    }

    async fn add_network_school(
        &self,
        network_id: NetworkId,
        school_id: SchoolId,
        assigned_by: Option<UserId>,
    ) -> StoreResult<NetworkMembership> {
        let mut state = self.state.write().await;
        state.network(network_id)?;
        state.school(school_id)?;
        if let Some(existing) = state
            .memberships
            .iter()
            .find(|m| m.network_id == network_id && m.school_id == school_id)
        {
            return Ok(existing.clone());
        }
        let membership = NetworkMembership {
            network_id,
            school_id,
            assigned_by,
            assigned_at: Utc::now(),
        };
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn remove_network_school(
        &self,
        network_id: NetworkId,
        school_id: SchoolId,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.memberships.len();
        state
            .memberships
            .retain(|m| !(m.network_id == network_id && m.school_id == school_id));
        if state.memberships.len() == before {
            return Err(missing(MEMBERSHIP_NOT_FOUND));
        }
        Ok(())
    }

    async fn list_network_schools(&self, network_id: NetworkId) -> StoreResult<Vec<School>> {
        let state = self.state.read().await;
        state.network(network_id)?;
        let mut schools: Vec<School> = state
            .memberships
            .iter()
            .filter(|m| m.network_id == network_id)
            .filter_map(|m| state.schools.get(&m.school_id))
            .cloned()
            .collect();
        schools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schools)
    }

    async fn network_ids_of_school(&self, school_id: SchoolId) -> StoreResult<Vec<NetworkId>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.school_id == school_id)
            .map(|m| m.network_id)
            .collect())
    }

    async fn list_assignments(
        &self,
        user_id: UserId,
        include_inactive: bool,
    ) -> StoreResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        let mut assignments: Vec<RoleAssignment> = state
            .assignments
            .values()
            .filter(|a| a.user_id == user_id && (include_inactive || a.is_active))
            .cloned()
            .collect();
        assignments.sort_by_key(|a| (a.assigned_at, a.id));
        Ok(assignments)
    }

    async fn list_active_assignments(&self) -> StoreResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        let mut assignments: Vec<RoleAssignment> = state
            .assignments
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| (a.assigned_at, a.id));
        Ok(assignments)
    }

    async fn get_assignment(&self, id: RoleAssignmentId) -> StoreResult<RoleAssignment> {
        let state = self.state.read().await;
        state
            .assignments
            .get(&id)
            .cloned()
            .ok_or_else(|| missing(ASSIGNMENT_NOT_FOUND))
    }

    async fn assign_role(
        &self,
        assignment: NewRoleAssignment,
        leader_community: Option<LeaderCommunity>,
    ) -> StoreResult<RoleAssignment> {
        let mut state = self.state.write().await;
        state.profile(assignment.user_id)?;

        let mut scope = assignment.scope;
        if let Some(leader) = leader_community {
            let wanted = NewCommunity {
                school_id: leader.school_id,
                generation_id: leader.generation_id,
                name: leader.name,
                max_teachers: genera_models::organizations::DEFAULT_MAX_TEACHERS,
            };
            let community = match state.find_community(&wanted) {
                Some(existing) => existing.clone(),
                None => state.insert_community(wanted),
            };
            scope.community_id = Some(community.id);
        }

        let duplicate = state.assignments.values().any(|a| {
            a.is_active
                && a.user_id == assignment.user_id
                && a.role_type == assignment.role_type
                && a.scope() == scope
        });
        if duplicate {
            return Err(StoreError::Conflict(DUPLICATE_ASSIGNMENT_MESSAGE.into()));
        }

        let now = Utc::now();
        let created = RoleAssignment {
            id: RoleAssignmentId::new(),
            user_id: assignment.user_id,
            role_type: assignment.role_type,
            school_id: scope.school_id,
            generation_id: scope.generation_id,
            community_id: scope.community_id,
            network_id: scope.network_id,
            is_active: true,
            assigned_by: assignment.assigned_by,
            assigned_at: now,
            created_at: now,
        };
        state.assignments.insert(created.id, created.clone());
        state.record(role_assigned_entry(&created));
        Ok(created)
    }

    async fn remove_role(&self, removal: RoleRemoval) -> StoreResult<RoleAssignment> {
        let mut state = self.state.write().await;
        let before = state
            .assignments
            .get(&removal.assignment_id)
            .cloned()
            .ok_or_else(|| missing(ASSIGNMENT_NOT_FOUND))?;
        if !before.is_active {
            return Err(StoreError::Conflict(INACTIVE_ASSIGNMENT_MESSAGE.into()));
        }
        if before.role_type == RoleType::Admin {
            let other_admin = state.assignments.values().any(|a| {
                a.is_active && a.role_type == RoleType::Admin && a.id != before.id
            });
            if !other_admin {
                return Err(StoreError::Conflict(LAST_ADMIN_MESSAGE.into()));
            }
        }

        let mut after = before.clone();
        after.is_active = false;
        state.assignments.insert(after.id, after.clone());
        state.record(role_removed_entry(&before, &after, &removal));
        Ok(after)
    }

    async fn create_consultant_assignment(
        &self,
        assignment: NewConsultantAssignment,
    ) -> StoreResult<ConsultantAssignment> {
        let mut state = self.state.write().await;
        state.profile(assignment.consultant_id)?;
        if let Some(student) = assignment.student_id {
            state.profile(student)?;
        }
        if state
            .consultants
            .values()
            .any(|existing| existing.is_active && existing.target() == assignment.target())
        {
            return Err(StoreError::Conflict(DUPLICATE_CONSULTANT_MESSAGE.into()));
        }
        let now = Utc::now();
        let created = ConsultantAssignment {
            id: ConsultantAssignmentId::new(),
            consultant_id: assignment.consultant_id,
            student_id: assignment.student_id,
            assignment_scope: assignment.assignment_scope,
            assignment_type: assignment.assignment_type,
            can_view_progress: assignment.can_view_progress,
            can_assign_courses: assignment.can_assign_courses,
            can_message_student: assignment.can_message_student,
            school_id: assignment.school_id,
            generation_id: assignment.generation_id,
            community_id: assignment.community_id,
            starts_at: assignment.starts_at,
            ends_at: assignment.ends_at,
            is_active: true,
            assigned_by: assignment.assigned_by,
            created_at: now,
            updated_at: now,
        };
        state.consultants.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
    ) -> StoreResult<ConsultantAssignment> {
        let state = self.state.read().await;
        state
            .consultants
            .get(&id)
            .cloned()
            .ok_or_else(|| missing(CONSULTANT_ASSIGNMENT_NOT_FOUND))
    }

    async fn list_consultant_assignments(
        &self,
        filter: &ConsultantAssignmentFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<Vec<ConsultantAssignment>> {
        let state = self.state.read().await;
        let mut assignments: Vec<ConsultantAssignment> = state
            .consultants
            .values()
            .filter(|a| filter.matches(a) && visibility.allows_assignment(a))
            .cloned()
            .collect();
        assignments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(assignments)
    }

    async fn update_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
        update: UpdateConsultantAssignmentDto,
    ) -> StoreResult<ConsultantAssignment> {
        let mut state = self.state.write().await;
        let mut updated = state.consultant_assignment(id)?.clone();
        update.apply(&mut updated);
        if updated.is_active
            && state
                .consultants
                .values()
                .any(|other| other.id != id && other.is_active && other.target() == updated.target())
        {
            return Err(StoreError::Conflict(DUPLICATE_CONSULTANT_MESSAGE.into()));
        }
        updated.updated_at = Utc::now();
        state.consultants.insert(id, updated.clone());
        Ok(updated)
    }

    async fn deactivate_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
    ) -> StoreResult<ConsultantAssignment> {
        let mut state = self.state.write().await;
        let assignment = state.consultant_assignment(id)?;
        if assignment.is_active {
            assignment.is_active = false;
            assignment.updated_at = Utc::now();
        }
        Ok(assignment.clone())
    }

    async fn permission_rows(&self, role_types: &[RoleType]) -> StoreResult<Vec<RolePermission>> {
        let state = self.state.read().await;
        Ok(state
            .permissions
            .iter()
            .filter(|p| role_types.contains(&p.role_type))
            .cloned()
            .collect())
    }

    async fn list_permission_rows(
        &self,
        filter: &MatrixFilterParams,
    ) -> StoreResult<Vec<RolePermission>> {
        let state = self.state.read().await;
        let include_test = filter.include_test.unwrap_or(false);
        let mut rows: Vec<RolePermission> = state
            .permissions
            .iter()
            .filter(|p| filter.role_type.is_none_or(|r| r == p.role_type))
            .filter(|p| {
                filter
                    .permission_key
                    .as_deref()
                    .is_none_or(|k| k == p.permission_key)
            })
            .filter(|p| include_test || !p.is_test)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.role_type.priority(), &a.permission_key, a.created_at).cmp(&(
                b.role_type.priority(),
                &b.permission_key,
                b.created_at,
            ))
        });
        Ok(rows)
    }

    async fn set_permission(
        &self,
        change: PermissionChange,
    ) -> StoreResult<PermissionChangeOutcome> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let mut rows = state.live_rows(change.role_type, &change.permission_key);
        let Some(first) = rows.first() else {
            drop(rows);
            let permission = state.push_permission(
                change.role_type,
                &change.permission_key,
                change.granted,
                change.reason.clone(),
                Some(change.performed_by),
            );
            state.record(permission_entry(&change, None));
            return Ok(PermissionChangeOutcome {
                permission,
                previous: None,
                changed: true,
            });
        };

        let previous = first.granted;
        let changed = rows.iter().any(|r| r.granted != change.granted);
        if changed {
            for row in rows.iter_mut() {
                row.granted = change.granted;
                row.reason = change.reason.clone();
                row.updated_at = now;
            }
        }
        let permission = (*rows[0]).clone();
        drop(rows);
        if changed {
            state.record(permission_entry(&change, Some(previous)));
        }
        Ok(PermissionChangeOutcome {
            permission,
            previous: Some(previous),
            changed,
        })
    }

    async fn seed_permissions(
        &self,
        seeds: &[PermissionSeed],
        performed_by: Option<UserId>,
    ) -> StoreResult<SeedReport> {
        let mut state = self.state.write().await;
        let mut report = SeedReport::default();
        for seed in seeds {
            if state.has_live_row(seed.role_type, &seed.permission_key) {
                report.existing += 1;
                continue;
            }
            state.push_permission(
                seed.role_type,
                &seed.permission_key,
                seed.granted,
                None,
                performed_by,
            );
            state.record(seeded_entry(seed, performed_by));
            report.inserted += 1;
        }
        Ok(report)
    }

    async fn list_audit(&self, filter: &AuditFilterParams) -> StoreResult<(Vec<AuditEntry>, i64)> {
        let state = self.state.read().await;
        let entries: Vec<AuditEntry> = state
            .audit
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(paginate(entries, &filter.pagination))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genera_models::audit::AuditAction;
    use genera_models::consultants::ConsultantScope;
    use genera_models::profiles::ApprovalStatus;
    use genera_models::roles::AssignmentScope;

    fn new_profile(email: &str) -> NewProfile {
        NewProfile {
            email: email.to_string(),
            first_name: "Ana".into(),
            last_name: "Pérez".into(),
            password_hash: "hash".into(),
            school_id: None,
            generation_id: None,
            community_id: None,
            approval_status: ApprovalStatus::Approved,
        }
    }

    fn assignment(user_id: UserId, role_type: RoleType) -> NewRoleAssignment {
        NewRoleAssignment {
            user_id,
            role_type,
            scope: AssignmentScope::default(),
            assigned_by: None,
        }
    }

    #[tokio::test]
    async fn test_email_is_unique_ignoring_case() {
        let store = MemoryStore::new();
        store.create_profile(new_profile("Ana@Colegio.cl")).await.unwrap();

        let err = store
            .create_profile(new_profile("ana@colegio.cl"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let found = store.find_credentials("ANA@colegio.CL").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let store = MemoryStore::new();
        let seeds = vec![
            PermissionSeed {
                role_type: RoleType::Docente,
                permission_key: "view_users_own".into(),
                granted: true,
            },
            PermissionSeed {
                role_type: RoleType::Docente,
                permission_key: "view_users_all".into(),
                granted: false,
            },
        ];

        let first = store.seed_permissions(&seeds, None).await.unwrap();
        assert_eq!(first.inserted, 2);
        let second = store.seed_permissions(&seeds, None).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.existing, 2);

        let rows = store.permission_rows(&[RoleType::Docente]).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_set_permission_records_audit_only_on_change() {
        let store = MemoryStore::new();
        let admin = UserId::new();
        let change = |granted| PermissionChange {
            role_type: RoleType::Estudiante,
            permission_key: "view_courses_school".into(),
            granted,
            reason: Some("prueba".into()),
            performed_by: admin,
        };

        let created = store.set_permission(change(true)).await.unwrap();
        assert!(created.changed);
        assert_eq!(created.previous, None);

        let same = store.set_permission(change(true)).await.unwrap();
        assert!(!same.changed);

        let revoked = store.set_permission(change(false)).await.unwrap();
        assert!(revoked.changed);
        assert_eq!(revoked.previous, Some(true));
        assert!(!revoked.permission.granted);

        let (entries, total) = store
            .list_audit(&AuditFilterParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(entries[0].action, AuditAction::PermissionRevoked);
        assert_eq!(entries[1].action, AuditAction::PermissionCreated);
    }

    #[tokio::test]
    async fn test_duplicate_active_assignment_conflicts() {
        let store = MemoryStore::new();
        let user = store.create_profile(new_profile("a@b.cl")).await.unwrap();

        store
            .assign_role(assignment(user.id, RoleType::CommunityManager), None)
            .await
            .unwrap();
        let err = store
            .assign_role(assignment(user.id, RoleType::CommunityManager), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_removed() {
        let store = MemoryStore::new();
        let first = store.create_profile(new_profile("a@b.cl")).await.unwrap();
        let second = store.create_profile(new_profile("c@d.cl")).await.unwrap();

        let a1 = store
            .assign_role(assignment(first.id, RoleType::Admin), None)
            .await
            .unwrap();
        let a2 = store
            .assign_role(assignment(second.id, RoleType::Admin), None)
            .await
            .unwrap();

        let removal = |id| RoleRemoval {
            assignment_id: id,
            reason: None,
            performed_by: None,
        };
        let removed = store.remove_role(removal(a1.id)).await.unwrap();
        assert!(!removed.is_active);

        let err = store.remove_role(removal(a2.id)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let again = store.remove_role(removal(a1.id)).await.unwrap_err();
        assert!(matches!(again, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_leader_community_is_reused() {
        let store = MemoryStore::new();
        let school = store.create_school("Escuela Norte", false).await.unwrap();
        let user = store.create_profile(new_profile("lider@b.cl")).await.unwrap();
        let leader = || LeaderCommunity {
            school_id: school.id,
            generation_id: None,
            name: LeaderCommunity::name_for("Ana", "Pérez"),
        };
        let scoped = |role_type| NewRoleAssignment {
            user_id: user.id,
            role_type,
            scope: AssignmentScope {
                school_id: Some(school.id),
                ..Default::default()
            },
            assigned_by: None,
        };

        let first = store
            .assign_role(scoped(RoleType::LiderComunidad), Some(leader()))
            .await
            .unwrap();
        let removal = RoleRemoval {
            assignment_id: first.id,
            reason: None,
            performed_by: None,
        };
        store.remove_role(removal).await.unwrap();
        let second = store
            .assign_role(scoped(RoleType::LiderComunidad), Some(leader()))
            .await
            .unwrap();

        assert_eq!(first.community_id, second.community_id);
        assert_eq!(store.list_communities(school.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_marks_school() {
        let store = MemoryStore::new();
        let school = store.create_school("Liceo Sur", false).await.unwrap();
        store
            .create_generation(school.id, "Tractor", Some("1° a 4° básico"))
            .await
            .unwrap();
        assert!(store.get_school(school.id).await.unwrap().has_generations);

        let err = store
            .create_generation(school.id, "Tractor", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_network_membership_is_idempotent() {
        let store = MemoryStore::new();
        let network = store.create_network("Red Andina", None, None).await.unwrap();
        let school = store.create_school("Escuela A", false).await.unwrap();

        store
            .add_network_school(network.id, school.id, None)
            .await
            .unwrap();
        store
            .add_network_school(network.id, school.id, None)
            .await
            .unwrap();
        assert_eq!(store.list_network_schools(network.id).await.unwrap().len(), 1);
        assert_eq!(
            store.network_ids_of_school(school.id).await.unwrap(),
            vec![network.id]
        );

        store.remove_network_school(network.id, school.id).await.unwrap();
        assert!(
            store
                .remove_network_school(network.id, school.id)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_network_with_active_supervisor_cannot_be_deleted() {
        let store = MemoryStore::new();
        let network = store.create_network("Red Norte", None, None).await.unwrap();
        let school = store.create_school("Escuela N", false).await.unwrap();
        store.add_network_school(network.id, school.id, None).await.unwrap();
        let user = store.create_profile(new_profile("sup@red.cl")).await.unwrap();
        let supervisor = store
            .assign_role(
                NewRoleAssignment {
                    user_id: user.id,
                    role_type: RoleType::SupervisorDeRed,
                    scope: AssignmentScope {
                        network_id: Some(network.id),
                        ..Default::default()
                    },
                    assigned_by: None,
                },
                None,
            )
            .await
            .unwrap();

        let err = store.delete_network(network.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store
            .remove_role(RoleRemoval {
                assignment_id: supervisor.id,
                reason: None,
                performed_by: None,
            })
            .await
            .unwrap();
        store.delete_network(network.id).await.unwrap();
        assert!(store.network_ids_of_school(school.id).await.unwrap().is_empty());
        assert!(matches!(
            store.get_network(network.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_network_rename_keeps_names_unique() {
        let store = MemoryStore::new();
        let north = store.create_network("Red Norte", None, None).await.unwrap();
        store.create_network("Red Sur", None, None).await.unwrap();

        let rename = |name: &str| NetworkUpdate {
            name: Some(name.to_string()),
            description: None,
        };
        let err = store.update_network(north.id, rename("Red Sur")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let renamed = store.update_network(north.id, rename("Red Norte")).await.unwrap();
        assert_eq!(renamed.name, "Red Norte");
    }

    #[tokio::test]
    async fn test_approval_change_is_audited() {
        let store = MemoryStore::new();
        let user = store.create_profile(new_profile("p@q.cl")).await.unwrap();

        let change = ApprovalChange {
            user_id: user.id,
            status: ApprovalStatus::Disabled,
            reason: None,
            performed_by: None,
        };
        let updated = store.change_approval(change.clone()).await.unwrap();
        assert_eq!(updated.approval_status, ApprovalStatus::Disabled);
        store.change_approval(change).await.unwrap();

        let (entries, _) = store
            .list_audit(&AuditFilterParams::default())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::ApprovalChanged);
        assert_eq!(entries[0].user_id, Some(user.id));
    }

    fn individual(consultant: UserId, student: UserId) -> NewConsultantAssignment {
        NewConsultantAssignment {
            consultant_id: consultant,
            student_id: Some(student),
            assignment_scope: ConsultantScope::Individual,
            assignment_type: "comprehensive".into(),
            can_view_progress: true,
            can_assign_courses: false,
            can_message_student: true,
            school_id: None,
            generation_id: None,
            community_id: None,
            starts_at: Utc::now(),
            ends_at: None,
            assigned_by: None,
        }
    }

    #[tokio::test]
    async fn test_consultant_assignment_is_unique_while_active() {
        let store = MemoryStore::new();
        let consultant = store.create_profile(new_profile("c@genera.cl")).await.unwrap();
        let student = store.create_profile(new_profile("e@genera.cl")).await.unwrap();

        let first = store
            .create_consultant_assignment(individual(consultant.id, student.id))
            .await
            .unwrap();
        let err = store
            .create_consultant_assignment(individual(consultant.id, student.id))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let removed = store.deactivate_consultant_assignment(first.id).await.unwrap();
        assert!(!removed.is_active);
        let again = store.deactivate_consultant_assignment(first.id).await.unwrap();
        assert_eq!(again.updated_at, removed.updated_at);

        store
            .create_consultant_assignment(individual(consultant.id, student.id))
            .await
            .unwrap();

        let reactivate = UpdateConsultantAssignmentDto {
            is_active: Some(true),
            ..Default::default()
        };
        let err = store
            .update_consultant_assignment(first.id, reactivate)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_consultant_listing_hides_inactive_by_default() {
        let store = MemoryStore::new();
        let consultant = store.create_profile(new_profile("c@genera.cl")).await.unwrap();
        let student = store.create_profile(new_profile("e@genera.cl")).await.unwrap();
        let created = store
            .create_consultant_assignment(individual(consultant.id, student.id))
            .await
            .unwrap();
        store.deactivate_consultant_assignment(created.id).await.unwrap();

        let active = ConsultantAssignmentFilterParams::default();
        let all = ConsultantAssignmentFilterParams {
            include_inactive: Some(true),
            ..Default::default()
        };
        assert!(
            store
                .list_consultant_assignments(&active, &Visibility::Everything)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            store
                .list_consultant_assignments(&all, &Visibility::Everything)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(matches!(
            store
                .get_consultant_assignment(ConsultantAssignmentId::new())
                .await
                .unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
