use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use genera_core::AppError;
use genera_core::permissions::{self, PermissionKey, Scope, scoped_key};
use genera_db::{AccessStore, StoreResult};
use genera_models::ids::{CommunityId, GenerationId, NetworkId, SchoolId, UserId};
use genera_models::permissions::RolePermission;
use genera_models::profiles::Profile;
use genera_models::roles::{RoleAssignment, RoleType};
use genera_models::visibility::Visibility;

use super::{NO_PERMISSION_MESSAGE, OUT_OF_SCOPE_MESSAGE, ResourceScope};
use crate::metrics::{self, AccessEvent};

/// Organizations reached by the assignments of one role type.
#[derive(Debug, Clone, Default)]
struct Coverage {
    schools: BTreeSet<SchoolId>,
    generations: BTreeSet<GenerationId>,
    communities: BTreeSet<CommunityId>,
    networks: BTreeSet<NetworkId>,
    network_schools: BTreeSet<SchoolId>,
}

impl Coverage {
    /// An assignment without a school is anchored on the profile's
    /// affiliation as a whole; anchors are never mixed between the two.
    fn add(&mut self, assignment: &RoleAssignment, profile: &Profile) {
        let (school, generation, community) = if assignment.school_id.is_some() {
            (assignment.school_id, assignment.generation_id, assignment.community_id)
        } else {
            (profile.school_id, profile.generation_id, profile.community_id)
        };
        self.schools.extend(school);
        self.generations.extend(generation);
        self.communities.extend(community);
        self.networks.extend(assignment.network_id);
    }
}

/// Why a scoped check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Denial {
    NoPermission,
    OutOfScope,
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        AppError::forbidden(match denial {
            Denial::NoPermission => NO_PERMISSION_MESSAGE,
            Denial::OutOfScope => OUT_OF_SCOPE_MESSAGE,
        })
    }
}

/// Everything needed to authorize one caller: profile, active assignments,
/// and the effective grants of their role types.
///
/// Built once per request by the [`Access`](crate::middleware::auth::Access)
/// extractor; nothing is cached across requests.
#[derive(Debug, Clone)]
pub struct AccessContext {
    profile: Profile,
    assignments: Vec<RoleAssignment>,
    /// Effective key -> role types granting it.
    grants: BTreeMap<String, BTreeSet<RoleType>>,
    coverage: HashMap<RoleType, Coverage>,
}

impl AccessContext {
    /// Builds the context from already loaded rows. Network coverage starts
    /// empty; see [`AccessContext::load`].
    pub fn from_parts(
        profile: Profile,
        assignments: Vec<RoleAssignment>,
        rows: &[RolePermission],
        now: DateTime<Utc>,
    ) -> Self {
        let assignments: Vec<RoleAssignment> =
            assignments.into_iter().filter(|a| a.is_active).collect();
        let role_types: BTreeSet<RoleType> = assignments.iter().map(|a| a.role_type).collect();

        let mut grants: BTreeMap<String, BTreeSet<RoleType>> = BTreeMap::new();
        for row in rows
            .iter()
            .filter(|r| role_types.contains(&r.role_type) && r.is_effective(now))
        {
            grants
                .entry(row.permission_key.clone())
                .or_default()
                .insert(row.role_type);
        }

        let mut coverage: HashMap<RoleType, Coverage> = HashMap::new();
        for assignment in &assignments {
            coverage
                .entry(assignment.role_type)
                .or_default()
                .add(assignment, &profile);
        }

        Self {
            profile,
            assignments,
            grants,
            coverage,
        }
    }

    /// Loads assignments and grants for `profile`, then resolves the schools
    /// reachable through networks for role types holding `_network` grants.
    pub async fn load(store: &dyn AccessStore, profile: Profile) -> StoreResult<Self> {
        let assignments = store.list_assignments(profile.id, false).await?;
        let role_types: Vec<RoleType> = assignments
            .iter()
            .map(|a| a.role_type)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rows = if role_types.is_empty() {
            Vec::new()
        } else {
            store.permission_rows(&role_types).await?
        };

        let mut context = Self::from_parts(profile, assignments, &rows, Utc::now());

        for role in context.network_roles() {
            let mut networks = context
                .coverage
                .get(&role)
                .map(|c| c.networks.clone())
                .unwrap_or_default();
            let schools: Vec<SchoolId> = context
                .coverage
                .get(&role)
                .map(|c| c.schools.iter().copied().collect())
                .unwrap_or_default();
            for school in schools {
                networks.extend(store.network_ids_of_school(school).await?);
            }

            let mut reachable = BTreeSet::new();
            for network in &networks {
                for school in store.list_network_schools(*network).await? {
                    reachable.insert(school.id);
                }
            }
            context = context.with_network(role, networks, reachable);
        }

        Ok(context)
    }

    /// Sets the networks and member schools reached by `role`.
    pub fn with_network(
        mut self,
        role: RoleType,
        networks: BTreeSet<NetworkId>,
        schools: BTreeSet<SchoolId>,
    ) -> Self {
        let coverage = self.coverage.entry(role).or_default();
        coverage.networks.extend(networks);
        coverage.network_schools = schools;
        self
    }

    /// Role types holding at least one `_network` grant.
    fn network_roles(&self) -> BTreeSet<RoleType> {
        self.grants
            .iter()
            .filter(|(key, _)| PermissionKey::parse(key).scope == Some(Scope::Network))
            .flat_map(|(_, roles)| roles.iter().copied())
            .collect()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn user_id(&self) -> UserId {
        self.profile.id
    }

    /// Active assignments.
    pub fn assignments(&self) -> &[RoleAssignment] {
        &self.assignments
    }

    pub fn role_types(&self) -> BTreeSet<RoleType> {
        self.assignments.iter().map(|a| a.role_type).collect()
    }

    pub fn is_admin(&self) -> bool {
        self.assignments.iter().any(|a| a.role_type == RoleType::Admin)
    }

    pub fn has_any_role(&self, allowed: &[RoleType]) -> bool {
        let allowed_role = self
            .assignments
            .iter()
            .any(|a| allowed.contains(&a.role_type));
        self.record("role", allowed_role);
        allowed_role
    }

    pub fn require_any_role(&self, allowed: &[RoleType]) -> Result<(), AppError> {
        if self.has_any_role(allowed) {
            Ok(())
        } else {
            Err(AppError::forbidden(NO_PERMISSION_MESSAGE))
        }
    }

    /// Whether `key` is held directly or through a wider scope of its base.
    fn holds(&self, key: &str) -> bool {
        let parsed = PermissionKey::parse(key);
        match parsed.scope {
            None => self.grants.contains_key(key),
            Some(scope) => Scope::ORDERED
                .into_iter()
                .filter(|s| s.implies(scope))
                .any(|s| self.grants.contains_key(&scoped_key(parsed.base, s))),
        }
    }

    pub fn has_permission(&self, key: &str) -> bool {
        let allowed = self.holds(key);
        self.record(key, allowed);
        allowed
    }

    pub fn require_permission(&self, key: &str) -> Result<(), AppError> {
        if self.has_permission(key) {
            Ok(())
        } else {
            Err(AppError::forbidden(NO_PERMISSION_MESSAGE))
        }
    }

    /// Every catalog key the caller holds, including implied ones.
    pub fn effective_permissions(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = permissions::all_keys()
            .into_iter()
            .filter(|k| self.holds(k))
            .collect();
        keys.extend(self.grants.keys().cloned());
        keys.into_iter().collect()
    }

    /// Granted scopes of `base`, widest first, with the role types granting
    /// each.
    fn granted_scopes(&self, base: &str) -> Vec<(Scope, &BTreeSet<RoleType>)> {
        Scope::ORDERED
            .into_iter()
            .rev()
            .filter_map(|scope| {
                self.grants
                    .get(&scoped_key(base, scope))
                    .map(|roles| (scope, roles))
            })
            .collect()
    }

    fn covers(&self, role: RoleType, scope: Scope, resource: &ResourceScope) -> bool {
        let Some(coverage) = self.coverage.get(&role) else {
            return scope == Scope::All
                || (scope == Scope::Own && resource.owner_id == Some(self.profile.id));
        };
        let in_schools = |schools: &BTreeSet<SchoolId>| {
            resource.school_id.is_some_and(|s| schools.contains(&s))
        };
        match scope {
            Scope::All => true,
            Scope::Network => in_schools(&coverage.network_schools),
            Scope::School => in_schools(&coverage.schools),
            Scope::Generation => resource
                .generation_id
                .is_some_and(|g| coverage.generations.contains(&g)),
            Scope::Community => resource
                .community_id
                .is_some_and(|c| coverage.communities.contains(&c)),
            Scope::Own => {
                resource.owner_id == Some(self.profile.id)
                    || (resource.is_school_record && in_schools(&coverage.schools))
            }
        }
    }

    /// Checks that the caller holds `base` at a scope covering `resource`
    /// and returns that scope.
    ///
    /// # Errors
    ///
    /// 403 with [`NO_PERMISSION_MESSAGE`] when `base` is not granted at any
    /// scope, or with [`OUT_OF_SCOPE_MESSAGE`] when no grant covers the
    /// resource.
    pub fn authorize(&self, base: &str, resource: &ResourceScope) -> Result<Scope, AppError> {
        Ok(self.check(base, resource)?)
    }

    /// Like [`AccessContext::authorize`], accepting any of `bases`. A scope
    /// denial on any base wins over missing grants.
    pub fn authorize_any(&self, bases: &[&str], resource: &ResourceScope) -> Result<Scope, AppError> {
        let mut denial = Denial::NoPermission;
        for base in bases {
            match self.check(base, resource) {
                Ok(scope) => return Ok(scope),
                Err(reason) => denial = denial.max(reason),
            }
        }
        Err(denial.into())
    }

    fn check(&self, base: &str, resource: &ResourceScope) -> Result<Scope, Denial> {
        let granted = self.granted_scopes(base);
        let Some(&(widest, _)) = granted.first() else {
            self.record(base, false);
            return Err(Denial::NoPermission);
        };

        if self.is_admin() {
            self.record(base, true);
            return Ok(widest);
        }

        for (scope, roles) in &granted {
            let covered = roles
                .iter()
                .any(|role| scope.implied().any(|s| self.covers(*role, s, resource)));
            if covered {
                self.record(base, true);
                return Ok(*scope);
            }
        }

        self.record(base, false);
        Err(Denial::OutOfScope)
    }

    /// Whether a role granting `key` is assigned to `network`.
    pub fn covers_network(&self, key: &str, network: NetworkId) -> bool {
        let Some(roles) = self.grants.get(key) else {
            self.record(key, false);
            return false;
        };
        let covered = self.is_admin()
            || roles.iter().any(|role| {
                self.coverage
                    .get(role)
                    .is_some_and(|c| c.networks.contains(&network))
            });
        self.record(key, covered);
        covered
    }

    /// Row filter for lists gated by `base`.
    ///
    /// # Errors
    ///
    /// 403 when `base` is not granted at any scope.
    pub fn visibility(&self, base: &str) -> Result<Visibility, AppError> {
        let granted = self.granted_scopes(base);
        if granted.is_empty() {
            self.record(base, false);
            return Err(AppError::forbidden(NO_PERMISSION_MESSAGE));
        }
        self.record(base, true);

        if self.is_admin() || granted.iter().any(|(scope, _)| *scope == Scope::All) {
            return Ok(Visibility::Everything);
        }

        let mut school_ids: BTreeSet<SchoolId> = BTreeSet::new();
        let mut generation_ids: BTreeSet<GenerationId> = BTreeSet::new();
        let mut community_ids: BTreeSet<CommunityId> = BTreeSet::new();
        let mut user_id = None;

        for (scope, roles) in granted {
            for role in roles {
                let coverage = self.coverage.get(role).cloned().unwrap_or_default();
                for implied in scope.implied() {
                    match implied {
                        Scope::All => return Ok(Visibility::Everything),
                        Scope::Network => school_ids.extend(coverage.network_schools.iter()),
                        Scope::School => school_ids.extend(coverage.schools.iter()),
                        Scope::Generation => generation_ids.extend(coverage.generations.iter()),
                        Scope::Community => community_ids.extend(coverage.communities.iter()),
                        Scope::Own => user_id = Some(self.profile.id),
                    }
                }
            }
        }

        Ok(Visibility::Restricted {
            school_ids,
            generation_ids,
            community_ids,
            user_id,
        })
    }

    fn record(&self, subject: &str, allowed: bool) {
        if allowed {
            debug!(user.id = %self.profile.id, permission = subject, "Access granted");
        } else {
            warn!(user.id = %self.profile.id, permission = subject, "Access denied");
        }
        metrics::record(AccessEvent::AuthorizationChecked { key: subject, allowed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use genera_models::ids::{RoleAssignmentId, RolePermissionId};
    use genera_models::profiles::ApprovalStatus;

    const SCHOOL_A: SchoolId = SchoolId::from_u128(1);
    const SCHOOL_B: SchoolId = SchoolId::from_u128(2);
    const SCHOOL_C: SchoolId = SchoolId::from_u128(3);
    const GENERATION_A: GenerationId = GenerationId::from_u128(11);
    const NETWORK: NetworkId = NetworkId::from_u128(21);

    fn profile(school_id: Option<SchoolId>) -> Profile {
        Profile {
            id: UserId::from_u128(100),
            email: "persona@colegio.cl".into(),
            first_name: "Ana".into(),
            last_name: "Rojas".into(),
            school_id,
            generation_id: None,
            community_id: None,
            approval_status: ApprovalStatus::Approved,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assignment(role_type: RoleType, school_id: Option<SchoolId>) -> RoleAssignment {
        RoleAssignment {
            id: RoleAssignmentId::new(),
            user_id: UserId::from_u128(100),
            role_type,
            school_id,
            generation_id: None,
            community_id: None,
            network_id: None,
            is_active: true,
            assigned_by: None,
            assigned_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    fn row(role_type: RoleType, key: &str) -> RolePermission {
        RolePermission {
            id: RolePermissionId::new(),
            role_type,
            permission_key: key.into(),
            granted: true,
            is_test: false,
            active: true,
            reason: None,
            expires_at: None,
            created_by: None,
            test_run_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn context(assignments: Vec<RoleAssignment>, rows: Vec<RolePermission>) -> AccessContext {
        AccessContext::from_parts(profile(Some(SCHOOL_A)), assignments, &rows, Utc::now())
    }

    fn status(result: Result<Scope, AppError>) -> (u16, String) {
        let err = result.unwrap_err();
        (err.status.as_u16(), err.error.to_string())
    }

    #[test]
    fn test_no_roles_denies_everything() {
        let ctx = context(vec![], vec![row(RoleType::Admin, "view_users_all")]);
        assert!(!ctx.has_permission("view_users_all"));
        assert!(ctx.require_permission("view_dashboard").is_err());
    }

    #[test]
    fn test_wider_scope_implies_narrower() {
        let ctx = context(
            vec![assignment(RoleType::Consultor, Some(SCHOOL_A))],
            vec![row(RoleType::Consultor, "view_reports_all")],
        );
        assert!(ctx.has_permission("view_reports_all"));
        assert!(ctx.has_permission("view_reports_network"));
        assert!(ctx.has_permission("view_reports_school"));
        assert!(!ctx.has_permission("edit_reports_school"));
    }

    #[test]
    fn test_narrow_scope_does_not_imply_wider() {
        let ctx = context(
            vec![assignment(RoleType::EquipoDirectivo, Some(SCHOOL_A))],
            vec![row(RoleType::EquipoDirectivo, "view_users_school")],
        );
        assert!(ctx.has_permission("view_users_own"));
        assert!(!ctx.has_permission("view_users_all"));
    }

    #[test]
    fn test_ineffective_rows_never_grant() {
        let mut revoked = row(RoleType::Docente, "view_courses_own");
        revoked.granted = false;
        let mut inactive = row(RoleType::Docente, "view_news_all");
        inactive.active = false;
        let mut test_row = row(RoleType::Docente, "view_events_all");
        test_row.is_test = true;
        let mut expired = row(RoleType::Docente, "view_dashboard");
        expired.expires_at = Some(Utc::now() - Duration::hours(1));

        let ctx = context(
            vec![assignment(RoleType::Docente, Some(SCHOOL_A))],
            vec![revoked, inactive, test_row, expired],
        );
        for key in [
            "view_courses_own",
            "view_news_all",
            "view_events_all",
            "view_dashboard",
        ] {
            assert!(!ctx.has_permission(key), "{key} should not be granted");
        }
    }

    #[test]
    fn test_rows_of_other_roles_are_ignored() {
        let ctx = context(
            vec![assignment(RoleType::Estudiante, Some(SCHOOL_A))],
            vec![row(RoleType::Admin, "manage_permissions")],
        );
        assert!(!ctx.has_permission("manage_permissions"));
    }

    #[test]
    fn test_multiple_roles_are_or_combined() {
        let ctx = context(
            vec![
                assignment(RoleType::Docente, Some(SCHOOL_A)),
                assignment(RoleType::CommunityManager, None),
            ],
            vec![
                row(RoleType::Docente, "view_courses_own"),
                row(RoleType::CommunityManager, "create_news_all"),
            ],
        );
        assert!(ctx.has_permission("view_courses_own"));
        assert!(ctx.has_permission("create_news_all"));
    }

    #[test]
    fn test_role_checks() {
        let ctx = context(vec![assignment(RoleType::Docente, Some(SCHOOL_A))], vec![]);
        assert!(ctx.has_any_role(&[RoleType::Admin, RoleType::Docente]));
        assert!(ctx.require_any_role(&[RoleType::Admin]).is_err());
        assert!(!ctx.is_admin());
    }

    #[test]
    fn test_school_scope_is_limited_to_assigned_school() {
        let ctx = context(
            vec![assignment(RoleType::EquipoDirectivo, Some(SCHOOL_A))],
            vec![row(RoleType::EquipoDirectivo, "edit_users_school")],
        );
        assert_eq!(
            ctx.authorize("edit_users", &ResourceScope::within_school(Some(SCHOOL_A)))
                .unwrap(),
            Scope::School
        );
        assert_eq!(
            status(ctx.authorize("edit_users", &ResourceScope::within_school(Some(SCHOOL_B)))),
            (403, OUT_OF_SCOPE_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_missing_base_is_no_permission() {
        let ctx = context(vec![assignment(RoleType::Docente, Some(SCHOOL_A))], vec![]);
        assert_eq!(
            status(ctx.authorize("delete_users", &ResourceScope::global())),
            (403, NO_PERMISSION_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_school_assignment_falls_back_to_profile_school() {
        let ctx = context(
            vec![assignment(RoleType::EquipoDirectivo, None)],
            vec![row(RoleType::EquipoDirectivo, "view_users_school")],
        );
        assert!(
            ctx.authorize("view_users", &ResourceScope::within_school(Some(SCHOOL_A)))
                .is_ok()
        );
    }

    #[test]
    fn test_all_scope_covers_anything() {
        let ctx = context(
            vec![assignment(RoleType::Consultor, Some(SCHOOL_A))],
            vec![row(RoleType::Consultor, "view_users_all")],
        );
        assert_eq!(
            ctx.authorize("view_users", &ResourceScope::within_school(Some(SCHOOL_C)))
                .unwrap(),
            Scope::All
        );
        assert_eq!(ctx.visibility("view_users").unwrap(), Visibility::Everything);
    }

    #[test]
    fn test_network_scope_covers_member_schools_only() {
        let mut supervisor = assignment(RoleType::SupervisorDeRed, None);
        supervisor.network_id = Some(NETWORK);
        let ctx = AccessContext::from_parts(
            profile(None),
            vec![supervisor],
            &[row(RoleType::SupervisorDeRed, "view_users_network")],
            Utc::now(),
        )
        .with_network(
            RoleType::SupervisorDeRed,
            BTreeSet::from([NETWORK]),
            BTreeSet::from([SCHOOL_A, SCHOOL_B]),
        );

        assert!(
            ctx.authorize("view_users", &ResourceScope::within_school(Some(SCHOOL_B)))
                .is_ok()
        );
        assert!(
            ctx.authorize("view_users", &ResourceScope::within_school(Some(SCHOOL_C)))
                .is_err()
        );
        assert!(ctx.covers_network("view_users_network", NETWORK));
        assert!(!ctx.covers_network("view_users_network", NetworkId::from_u128(99)));

        match ctx.visibility("view_users").unwrap() {
            Visibility::Restricted { school_ids, .. } => {
                assert_eq!(school_ids, BTreeSet::from([SCHOOL_A, SCHOOL_B]));
            }
            Visibility::Everything => panic!("network scope must be restricted"),
        }
    }

    #[test]
    fn test_own_scope_covers_own_profile_and_own_school_record() {
        let ctx = context(
            vec![assignment(RoleType::EquipoDirectivo, Some(SCHOOL_A))],
            vec![
                row(RoleType::EquipoDirectivo, "edit_users_own"),
                row(RoleType::EquipoDirectivo, "edit_schools_own"),
            ],
        );
        let me = profile(Some(SCHOOL_A));
        let mut other = profile(Some(SCHOOL_A));
        other.id = UserId::from_u128(200);

        assert!(ctx.authorize("edit_users", &ResourceScope::profile(&me)).is_ok());
        assert!(ctx.authorize("edit_users", &ResourceScope::profile(&other)).is_err());
        assert!(ctx.authorize("edit_schools", &ResourceScope::school(SCHOOL_A)).is_ok());
        assert!(ctx.authorize("edit_schools", &ResourceScope::school(SCHOOL_B)).is_err());
    }

    #[test]
    fn test_generation_scope() {
        let mut lider = assignment(RoleType::LiderGeneracion, Some(SCHOOL_A));
        lider.generation_id = Some(GENERATION_A);
        let ctx = context(vec![lider], vec![row(RoleType::LiderGeneracion, "view_reports_generation")]);

        let inside = ResourceScope {
            school_id: Some(SCHOOL_A),
            generation_id: Some(GENERATION_A),
            ..ResourceScope::default()
        };
        let outside = ResourceScope {
            school_id: Some(SCHOOL_A),
            generation_id: Some(GenerationId::from_u128(12)),
            ..ResourceScope::default()
        };
        assert_eq!(ctx.authorize("view_reports", &inside).unwrap(), Scope::Generation);
        assert!(ctx.authorize("view_reports", &outside).is_err());
    }

    #[test]
    fn test_admin_bypasses_coverage_but_needs_a_grant() {
        let ctx = context(
            vec![assignment(RoleType::Admin, None)],
            vec![row(RoleType::Admin, "edit_users_school")],
        );
        assert!(
            ctx.authorize("edit_users", &ResourceScope::within_school(Some(SCHOOL_C)))
                .is_ok()
        );
        assert!(ctx.authorize("delete_users", &ResourceScope::global()).is_err());
        assert_eq!(ctx.visibility("edit_users").unwrap(), Visibility::Everything);
    }

    #[test]
    fn test_authorize_any_reports_scope_denial() {
        let ctx = context(
            vec![assignment(RoleType::LiderComunidad, Some(SCHOOL_A))],
            vec![row(RoleType::LiderComunidad, "manage_communities_school")],
        );
        let err = ctx
            .authorize_any(
                &["view_schools", "manage_communities"],
                &ResourceScope::school(SCHOOL_B),
            )
            .unwrap_err();
        assert_eq!(err.error.to_string(), OUT_OF_SCOPE_MESSAGE);
        assert!(
            ctx.authorize_any(
                &["view_schools", "manage_communities"],
                &ResourceScope::school(SCHOOL_A),
            )
            .is_ok()
        );
    }

    #[test]
    fn test_check_reports_denial_kind() {
        let ctx = context(
            vec![assignment(RoleType::EquipoDirectivo, Some(SCHOOL_A))],
            vec![row(RoleType::EquipoDirectivo, "edit_users_school")],
        );
        let elsewhere = ResourceScope::within_school(Some(SCHOOL_B));
        assert_eq!(ctx.check("edit_users", &elsewhere), Err(Denial::OutOfScope));
        assert_eq!(ctx.check("delete_users", &elsewhere), Err(Denial::NoPermission));

        let err = ctx
            .authorize_any(&["edit_users", "delete_users"], &elsewhere)
            .unwrap_err();
        assert_eq!(err.error.to_string(), OUT_OF_SCOPE_MESSAGE);
        let err = ctx
            .authorize_any(&["delete_users", "manage_networks"], &elsewhere)
            .unwrap_err();
        assert_eq!(err.error.to_string(), NO_PERMISSION_MESSAGE);
    }

    #[test]
    fn test_school_assignment_anchors_are_not_mixed_with_profile() {
        let mut member = profile(Some(SCHOOL_A));
        member.generation_id = Some(GENERATION_A);
        member.community_id = Some(CommunityId::from_u128(31));
        let ctx = AccessContext::from_parts(
            member,
            vec![assignment(RoleType::LiderGeneracion, Some(SCHOOL_B))],
            &[
                row(RoleType::LiderGeneracion, "view_reports_generation"),
                row(RoleType::LiderGeneracion, "view_reports_school"),
            ],
            Utc::now(),
        );

        let profile_generation = ResourceScope {
            school_id: Some(SCHOOL_A),
            generation_id: Some(GENERATION_A),
            ..ResourceScope::default()
        };
        assert!(ctx.authorize("view_reports", &profile_generation).is_err());
        assert_eq!(
            ctx.authorize("view_reports", &ResourceScope::within_school(Some(SCHOOL_B)))
                .unwrap(),
            Scope::School
        );
    }

    #[test]
    fn test_unanchored_assignment_takes_whole_profile_affiliation() {
        let mut member = profile(Some(SCHOOL_A));
        member.generation_id = Some(GENERATION_A);
        let ctx = AccessContext::from_parts(
            member,
            vec![assignment(RoleType::LiderGeneracion, None)],
            &[row(RoleType::LiderGeneracion, "view_reports_generation")],
            Utc::now(),
        );
        let inside = ResourceScope {
            school_id: Some(SCHOOL_A),
            generation_id: Some(GENERATION_A),
            ..ResourceScope::default()
        };
        assert_eq!(ctx.authorize("view_reports", &inside).unwrap(), Scope::Generation);
    }

    #[test]
    fn test_own_visibility_is_only_the_caller() {
        let ctx = context(
            vec![assignment(RoleType::Estudiante, Some(SCHOOL_A))],
            vec![row(RoleType::Estudiante, "view_users_own")],
        );
        let visibility = ctx.visibility("view_users").unwrap();
        let me = profile(Some(SCHOOL_A));
        let mut classmate = profile(Some(SCHOOL_A));
        classmate.id = UserId::from_u128(300);
        assert!(visibility.allows_profile(&me));
        assert!(!visibility.allows_profile(&classmate));
    }

    #[test]
    fn test_effective_permissions_include_implied_keys() {
        let ctx = context(
            vec![assignment(RoleType::Consultor, Some(SCHOOL_A))],
            vec![row(RoleType::Consultor, "view_users_network")],
        );
        let keys = ctx.effective_permissions();
        assert!(keys.contains(&"view_users_network".to_string()));
        assert!(keys.contains(&"view_users_school".to_string()));
        assert!(keys.contains(&"view_users_own".to_string()));
        assert!(!keys.contains(&"view_users_all".to_string()));
    }
}
