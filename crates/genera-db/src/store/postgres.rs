//! Postgres store.
//!
//! Queries are built at runtime (`query_as` with `FromRow` models, and
//! `QueryBuilder` for filtered lists). Changes that carry an audit entry run
//! in one transaction with it. Races between concurrent writers are settled
//! by the schema: unique indexes for emails, names, communities, and active
//! assignments; row locks for the last-admin check; an advisory lock per
//! matrix cell.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use genera_models::audit::{AuditEntry, AuditFilterParams, NewAuditEntry};
use genera_models::consultants::{
    ConsultantAssignment, ConsultantAssignmentFilterParams, NewConsultantAssignment,
    UpdateConsultantAssignmentDto,
};
use genera_models::ids::{
    CommunityId, ConsultantAssignmentId, GenerationId, NetworkId, RoleAssignmentId, SchoolId,
    UserId,
};
use genera_models::organizations::{
    Community, DEFAULT_MAX_TEACHERS, Generation, Network, NetworkMembership, NetworkUpdate,
    NewCommunity, School, SchoolFilterParams, UpdateSchoolDto,
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

use super::*;

const PROFILE_COLUMNS: &str = "id, email, first_name, last_name, school_id, generation_id, \
     community_id, approval_status, created_at, updated_at";
const SCHOOL_COLUMNS: &str = "id, name, has_generations, created_at, updated_at";
const GENERATION_COLUMNS: &str = "id, school_id, name, grade_range, created_at";
const COMMUNITY_COLUMNS: &str = "id, school_id, generation_id, name, max_teachers, created_at";
const NETWORK_COLUMNS: &str = "id, name, description, created_by, created_at";
const ASSIGNMENT_COLUMNS: &str = "id, user_id, role_type, school_id, generation_id, \
     community_id, network_id, is_active, assigned_by, assigned_at, created_at";
const CONSULTANT_COLUMNS: &str = "id, consultant_id, student_id, assignment_scope, \
     assignment_type, can_view_progress, can_assign_courses, can_message_student, school_id, \
     generation_id, community_id, starts_at, ends_at, is_active, assigned_by, created_at, \
     updated_at";
const PERMISSION_COLUMNS: &str = "id, role_type, permission_key, granted, is_test, active, \
     reason, expires_at, created_by, test_run_id, created_at, updated_at";
const AUDIT_COLUMNS: &str = "id, action, role_type, permission_key, user_id, old_value, \
     new_value, diff, reason, performed_by, is_test, test_run_id, created_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn exists(&self, sql: &str, id: Uuid) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn require_school(&self, id: SchoolId) -> StoreResult<()> {
        if self
            .exists("SELECT EXISTS(SELECT 1 FROM schools WHERE id = $1)", id.into())
            .await?
        {
            Ok(())
        } else {
            Err(missing(SCHOOL_NOT_FOUND))
        }
    }

    async fn require_profile(&self, id: UserId) -> StoreResult<()> {
        if self
            .exists("SELECT EXISTS(SELECT 1 FROM profiles WHERE id = $1)", id.into())
            .await?
        {
            Ok(())
        } else {
            Err(missing(USER_NOT_FOUND))
        }
    }

    async fn require_network(&self, id: NetworkId) -> StoreResult<()> {
        if self
            .exists("SELECT EXISTS(SELECT 1 FROM networks WHERE id = $1)", id.into())
            .await?
        {
            Ok(())
        } else {
            Err(missing(NETWORK_NOT_FOUND))
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}

fn conflict_or(err: sqlx::Error, message: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(message.to_string())
    } else {
        StoreError::Database(err)
    }
}

async fn insert_audit(conn: &mut PgConnection, entry: NewAuditEntry) -> StoreResult<()> {
    sqlx::query(
        r#"INSERT INTO permission_audit_log
            (action, role_type, permission_key, user_id, old_value, new_value, diff, reason, performed_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(entry.action)
    .bind(entry.role_type)
    .bind(entry.permission_key)
    .bind(entry.user_id)
    .bind(entry.old_value)
    .bind(entry.new_value)
    .bind(entry.diff)
    .bind(entry.reason)
    .bind(entry.performed_by)
    .execute(conn)
    .await?;
    Ok(())
}

fn push_consultant_filters<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    filter: &'a ConsultantAssignmentFilterParams,
    visibility: &'a Visibility,
) {
    if let Some(consultant_id) = filter.consultant_id {
        qb.push(" AND consultant_id = ").push_bind(consultant_id);
    }
    if let Some(student_id) = filter.student_id {
        qb.push(" AND student_id = ").push_bind(student_id);
    }
    if !filter.include_inactive.unwrap_or(false) {
        qb.push(" AND is_active");
    }
    if let Visibility::Restricted {
        school_ids,
        generation_ids,
        community_ids,
        user_id,
    } = visibility
    {
        qb.push(" AND (FALSE");
        if let Some(user_id) = user_id {
            qb.push(" OR consultant_id = ")
                .push_bind(*user_id)
                .push(" OR student_id = ")
                .push_bind(*user_id);
        }
        if !school_ids.is_empty() {
            qb.push(" OR school_id = ANY(")
                .push_bind(school_ids.iter().copied().collect::<Vec<_>>())
                .push(")");
        }
        if !generation_ids.is_empty() {
            qb.push(" OR generation_id = ANY(")
                .push_bind(generation_ids.iter().copied().collect::<Vec<_>>())
                .push(")");
        }
        if !community_ids.is_empty() {
            qb.push(" OR community_id = ANY(")
                .push_bind(community_ids.iter().copied().collect::<Vec<_>>())
                .push(")");
        }
        qb.push(")");
    }
}

fn push_profile_filters<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    filter: &'a ProfileFilterParams,
    visibility: &'a Visibility,
) {
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(school_id) = filter.school_id {
        qb.push(" AND school_id = ").push_bind(school_id);
    }
    if let Some(status) = filter.approval_status {
        qb.push(" AND approval_status = ").push_bind(status);
    }
    if let Visibility::Restricted {
        school_ids,
        generation_ids,
        community_ids,
        user_id,
    } = visibility
    {
        qb.push(" AND (FALSE");
        if let Some(user_id) = user_id {
            qb.push(" OR id = ").push_bind(*user_id);
        }
        if !school_ids.is_empty() {
            qb.push(" OR school_id = ANY(")
                .push_bind(school_ids.iter().copied().collect::<Vec<_>>())
                .push(")");
        }
        if !generation_ids.is_empty() {
            qb.push(" OR generation_id = ANY(")
                .push_bind(generation_ids.iter().copied().collect::<Vec<_>>())
                .push(")");
        }
        if !community_ids.is_empty() {
            qb.push(" OR community_id = ANY(")
                .push_bind(community_ids.iter().copied().collect::<Vec<_>>())
                .push(")");
        }
        qb.push(")");
    }
}

fn push_school_filters<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    filter: &'a SchoolFilterParams,
    visibility: &'a Visibility,
) {
    if let Some(name) = &filter.name {
        qb.push(" AND name ILIKE ").push_bind(format!("%{}%", name));
    }
    if let Visibility::Restricted { school_ids, .. } = visibility {
        qb.push(" AND id = ANY(")
            .push_bind(school_ids.iter().copied().collect::<Vec<_>>())
            .push(")");
    }
}

fn push_audit_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a AuditFilterParams) {
    if let Some(action) = filter.action {
        qb.push(" AND action = ").push_bind(action);
    }
    if let Some(role_type) = filter.role_type {
        qb.push(" AND role_type = ").push_bind(role_type);
    }
    if let Some(key) = &filter.permission_key {
        qb.push(" AND permission_key = ").push_bind(key.as_str());
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(performed_by) = filter.performed_by {
        qb.push(" AND performed_by = ").push_bind(performed_by);
    }
}

#[async_trait]
impl AccessStore for PgStore {
    async fn create_profile(&self, profile: NewProfile) -> StoreResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"INSERT INTO profiles
                (email, first_name, last_name, password_hash, school_id, generation_id, community_id, approval_status)
            VALUES (LOWER($1), $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROFILE_COLUMNS}"#
        ))
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.password_hash)
        .bind(profile.school_id)
        .bind(profile.generation_id)
        .bind(profile.community_id)
        .bind(profile.approval_status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_EMAIL_MESSAGE))
    }

    async fn get_profile(&self, id: UserId) -> StoreResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing(USER_NOT_FOUND))
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<ProfileCredentials>> {
        Ok(sqlx::query_as::<_, ProfileCredentials>(&format!(
            "SELECT {PROFILE_COLUMNS}, password_hash FROM profiles WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_profiles(
        &self,
        filter: &ProfileFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<(Vec<Profile>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM profiles WHERE TRUE");
        push_profile_filters(&mut count, filter, visibility);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE TRUE"
        ));
        push_profile_filters(&mut query, filter, visibility);
        query
            .push(" ORDER BY last_name, first_name, id LIMIT ")
            .push_bind(filter.pagination.limit())
            .push(" OFFSET ")
            .push_bind(filter.pagination.offset());
        let profiles = query
            .build_query_as::<Profile>()
            .fetch_all(&self.pool)
            .await?;

        Ok((profiles, total))
    }

    async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> StoreResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"UPDATE profiles SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                school_id = COALESCE($4, school_id),
                generation_id = COALESCE($5, generation_id),
                community_id = COALESCE($6, community_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}"#
        ))
        .bind(id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.school_id)
        .bind(update.generation_id)
        .bind(update.community_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing(USER_NOT_FOUND))
    }

    async fn change_approval(&self, change: ApprovalChange) -> StoreResult<Profile> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, ApprovalStatus>(
            "SELECT approval_status FROM profiles WHERE id = $1 FOR UPDATE",
        )
        .bind(change.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| missing(USER_NOT_FOUND))?;

        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"UPDATE profiles SET approval_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}"#
        ))
        .bind(change.user_id)
        .bind(change.status)
        .fetch_one(&mut *tx)
        .await?;

        if previous != change.status {
            insert_audit(&mut tx, approval_entry(previous, &change)).await?;
        }

        tx.commit().await?;
        Ok(profile)
    }

    async fn create_school(&self, name: &str, has_generations: bool) -> StoreResult<School> {
        sqlx::query_as::<_, School>(&format!(
            "INSERT INTO schools (name, has_generations) VALUES ($1, $2) RETURNING {SCHOOL_COLUMNS}"
        ))
        .bind(name)
        .bind(has_generations)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_SCHOOL_MESSAGE))
    }

    async fn get_school(&self, id: SchoolId) -> StoreResult<School> {
        sqlx::query_as::<_, School>(&format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| missing(SCHOOL_NOT_FOUND))
    }

    async fn list_schools(
        &self,
        filter: &SchoolFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<(Vec<School>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM schools WHERE TRUE");
        push_school_filters(&mut count, filter, visibility);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE TRUE"));
        push_school_filters(&mut query, filter, visibility);
        query
            .push(" ORDER BY name LIMIT ")
            .push_bind(filter.pagination.limit())
            .push(" OFFSET ")
            .push_bind(filter.pagination.offset());
        let schools = query
            .build_query_as::<School>()
            .fetch_all(&self.pool)
            .await?;

        Ok((schools, total))
    }

    async fn update_school(&self, id: SchoolId, update: UpdateSchoolDto) -> StoreResult<School> {
        sqlx::query_as::<_, School>(&format!(
            r#"UPDATE schools SET
                name = COALESCE($2, name),
                has_generations = COALESCE($3, has_generations),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SCHOOL_COLUMNS}"#
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.has_generations)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_SCHOOL_MESSAGE))?
        .ok_or_else(|| missing(SCHOOL_NOT_FOUND))
    }

    async fn create_generation(
        &self,
        school_id: SchoolId,
        name: &str,
        grade_range: Option<&str>,
    ) -> StoreResult<Generation> {
        self.require_school(school_id).await?;
        let mut tx = self.pool.begin().await?;

        let generation = sqlx::query_as::<_, Generation>(&format!(
            r#"INSERT INTO generations (school_id, name, grade_range)
            VALUES ($1, $2, $3)
            RETURNING {GENERATION_COLUMNS}"#
        ))
        .bind(school_id)
        .bind(name)
        .bind(grade_range)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_GENERATION_MESSAGE))?;

        sqlx::query(
            "UPDATE schools SET has_generations = TRUE, updated_at = NOW() WHERE id = $1 AND NOT has_generations",
        )
        .bind(school_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(generation)
    }

    async fn get_generation(&self, id: GenerationId) -> StoreResult<Generation> {
        sqlx::query_as::<_, Generation>(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing(GENERATION_NOT_FOUND))
    }

    async fn list_generations(&self, school_id: SchoolId) -> StoreResult<Vec<Generation>> {
        Ok(sqlx::query_as::<_, Generation>(&format!(
            "SELECT {GENERATION_COLUMNS} FROM generations WHERE school_id = $1 ORDER BY name"
        ))
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_community(&self, community: NewCommunity) -> StoreResult<Community> {
        self.require_school(community.school_id).await?;
        sqlx::query_as::<_, Community>(&format!(
            r#"INSERT INTO growth_communities (school_id, generation_id, name, max_teachers)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMMUNITY_COLUMNS}"#
        ))
        .bind(community.school_id)
        .bind(community.generation_id)
        .bind(&community.name)
        .bind(community.max_teachers)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_COMMUNITY_MESSAGE))
    }

    async fn get_community(&self, id: CommunityId) -> StoreResult<Community> {
        sqlx::query_as::<_, Community>(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM growth_communities WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing(COMMUNITY_NOT_FOUND))
    }

    async fn list_communities(&self, school_id: SchoolId) -> StoreResult<Vec<Community>> {
        Ok(sqlx::query_as::<_, Community>(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM growth_communities WHERE school_id = $1 ORDER BY name"
        ))
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_network(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Option<UserId>,
    ) -> StoreResult<Network> {
        sqlx::query_as::<_, Network>(&format!(
            r#"INSERT INTO networks (name, description, created_by)
            VALUES ($1, $2, $3)
            RETURNING {NETWORK_COLUMNS}"#
        ))
        .bind(name)
        .bind(description)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_NETWORK_MESSAGE))
    }

    async fn get_network(&self, id: NetworkId) -> StoreResult<Network> {
        sqlx::query_as::<_, Network>(&format!(
            "SELECT {NETWORK_COLUMNS} FROM networks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing(NETWORK_NOT_FOUND))
    }

    async fn list_networks(&self) -> StoreResult<Vec<Network>> {
        Ok(sqlx::query_as::<_, Network>(&format!(
            "SELECT {NETWORK_COLUMNS} FROM networks ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_network(&self, id: NetworkId, update: NetworkUpdate) -> StoreResult<Network> {
        let clears_or_sets = update.description.is_some();
        sqlx::query_as::<_, Network>(&format!(
            r#"UPDATE networks SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END
            WHERE id = $1
            RETURNING {NETWORK_COLUMNS}"#
        ))
        .bind(id)
        .bind(update.name)
        .bind(clears_or_sets)
        .bind(update.description.flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_NETWORK_MESSAGE))?
        .ok_or_else(|| missing(NETWORK_NOT_FOUND))
    }

    async fn delete_network(&self, id: NetworkId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, NetworkId>("SELECT id FROM networks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| missing(NETWORK_NOT_FOUND))?;

        let supervised = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(
                SELECT 1 FROM user_roles
                WHERE network_id = $1 AND role_type = 'supervisor_de_red' AND is_active
            )"#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if supervised {
            return Err(StoreError::Conflict(ACTIVE_SUPERVISORS_MESSAGE.into()));
        }

        // Memberships and inactive assignments cascade.
        sqlx::query("DELETE FROM networks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add_network_school(
        &self,
        network_id: NetworkId,
        school_id: SchoolId,
        assigned_by: Option<UserId>,
    ) -> StoreResult<NetworkMembership> {
        self.require_network(network_id).await?;
        self.require_school(school_id).await?;
        Ok(sqlx::query_as::<_, NetworkMembership>(
            r#"INSERT INTO network_schools (network_id, school_id, assigned_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (network_id, school_id)
                DO UPDATE SET network_id = network_schools.network_id
            RETURNING network_id, school_id, assigned_by, assigned_at"#,
        )
        .bind(network_id)
        .bind(school_id)
        .bind(assigned_by)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn remove_network_school(
        &self,
        network_id: NetworkId,
        school_id: SchoolId,
    ) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM network_schools WHERE network_id = $1 AND school_id = $2")
                .bind(network_id)
                .bind(school_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(missing(MEMBERSHIP_NOT_FOUND));
        }
        Ok(())
    }

    async fn list_network_schools(&self, network_id: NetworkId) -> StoreResult<Vec<School>> {
        self.require_network(network_id).await?;
        Ok(sqlx::query_as::<_, School>(
            r#"SELECT s.id, s.name, s.has_generations, s.created_at, s.updated_at
            FROM schools s
            JOIN network_schools ns ON ns.school_id = s.id
            WHERE ns.network_id = $1
            ORDER BY s.name"#,
        )
        .bind(network_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn network_ids_of_school(&self, school_id: SchoolId) -> StoreResult<Vec<NetworkId>> {
        Ok(sqlx::query_scalar::<_, NetworkId>(
            "SELECT network_id FROM network_schools WHERE school_id = $1",
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_assignments(
        &self,
        user_id: UserId,
        include_inactive: bool,
    ) -> StoreResult<Vec<RoleAssignment>> {
        Ok(sqlx::query_as::<_, RoleAssignment>(&format!(
            r#"SELECT {ASSIGNMENT_COLUMNS} FROM user_roles
            WHERE user_id = $1 AND ($2 OR is_active)
            ORDER BY assigned_at, id"#
        ))
        .bind(user_id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_active_assignments(&self) -> StoreResult<Vec<RoleAssignment>> {
        Ok(sqlx::query_as::<_, RoleAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM user_roles WHERE is_active ORDER BY assigned_at, id"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_assignment(&self, id: RoleAssignmentId) -> StoreResult<RoleAssignment> {
        sqlx::query_as::<_, RoleAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM user_roles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing(ASSIGNMENT_NOT_FOUND))
    }

    async fn assign_role(
        &self,
        assignment: NewRoleAssignment,
        leader_community: Option<LeaderCommunity>,
    ) -> StoreResult<RoleAssignment> {
        if !self
            .exists(
                "SELECT EXISTS(SELECT 1 FROM profiles WHERE id = $1)",
                assignment.user_id.into(),
            )
            .await?
        {
            return Err(missing(USER_NOT_FOUND));
        }

        let mut tx = self.pool.begin().await?;
        let mut scope = assignment.scope;

        if let Some(leader) = leader_community {
            let community_id = sqlx::query_scalar::<_, CommunityId>(
                r#"INSERT INTO growth_communities (school_id, generation_id, name, max_teachers)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (
                    school_id,
                    (COALESCE(generation_id, '00000000-0000-0000-0000-000000000000'::uuid)),
                    name
                ) DO UPDATE SET name = EXCLUDED.name
                RETURNING id"#,
            )
            .bind(leader.school_id)
            .bind(leader.generation_id)
            .bind(&leader.name)
            .bind(DEFAULT_MAX_TEACHERS)
            .fetch_one(&mut *tx)
            .await?;
            scope.community_id = Some(community_id);
        }

        let created = sqlx::query_as::<_, RoleAssignment>(&format!(
            r#"INSERT INTO user_roles
                (user_id, role_type, school_id, generation_id, community_id, network_id, assigned_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ASSIGNMENT_COLUMNS}"#
        ))
        .bind(assignment.user_id)
        .bind(assignment.role_type)
        .bind(scope.school_id)
        .bind(scope.generation_id)
        .bind(scope.community_id)
        .bind(scope.network_id)
        .bind(assignment.assigned_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_ASSIGNMENT_MESSAGE))?;

        insert_audit(&mut tx, role_assigned_entry(&created)).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn remove_role(&self, removal: RoleRemoval) -> StoreResult<RoleAssignment> {
        let mut tx = self.pool.begin().await?;

        let before = sqlx::query_as::<_, RoleAssignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM user_roles WHERE id = $1 FOR UPDATE"
        ))
        .bind(removal.assignment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| missing(ASSIGNMENT_NOT_FOUND))?;

        if !before.is_active {
            return Err(StoreError::Conflict(INACTIVE_ASSIGNMENT_MESSAGE.into()));
        }

        if before.role_type == RoleType::Admin {
            // Locking every active admin row serializes concurrent removals.
            let admins = sqlx::query_scalar::<_, RoleAssignmentId>(
                "SELECT id FROM user_roles WHERE role_type = 'admin' AND is_active FOR UPDATE",
            )
            .fetch_all(&mut *tx)
            .await?;
            if !admins.iter().any(|id| *id != before.id) {
                return Err(StoreError::Conflict(LAST_ADMIN_MESSAGE.into()));
            }
        }

        let after = sqlx::query_as::<_, RoleAssignment>(&format!(
            "UPDATE user_roles SET is_active = FALSE WHERE id = $1 RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(before.id)
        .fetch_one(&mut *tx)
        .await?;

        insert_audit(&mut tx, role_removed_entry(&before, &after, &removal)).await?;
        tx.commit().await?;
        Ok(after)
    }

    async fn create_consultant_assignment(
        &self,
        assignment: NewConsultantAssignment,
    ) -> StoreResult<ConsultantAssignment> {
        self.require_profile(assignment.consultant_id).await?;
        if let Some(student) = assignment.student_id {
            self.require_profile(student).await?;
        }
        sqlx::query_as::<_, ConsultantAssignment>(&format!(
            r#"INSERT INTO consultant_assignments
                (consultant_id, student_id, assignment_scope, assignment_type, can_view_progress,
                 can_assign_courses, can_message_student, school_id, generation_id, community_id,
                 starts_at, ends_at, assigned_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {CONSULTANT_COLUMNS}"#
        ))
        .bind(assignment.consultant_id)
        .bind(assignment.student_id)
        .bind(assignment.assignment_scope)
        .bind(&assignment.assignment_type)
        .bind(assignment.can_view_progress)
        .bind(assignment.can_assign_courses)
        .bind(assignment.can_message_student)
        .bind(assignment.school_id)
        .bind(assignment.generation_id)
        .bind(assignment.community_id)
        .bind(assignment.starts_at)
        .bind(assignment.ends_at)
        .bind(assignment.assigned_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_CONSULTANT_MESSAGE))
    }

    async fn get_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
    ) -> StoreResult<ConsultantAssignment> {
        sqlx::query_as::<_, ConsultantAssignment>(&format!(
            "SELECT {CONSULTANT_COLUMNS} FROM consultant_assignments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing(CONSULTANT_ASSIGNMENT_NOT_FOUND))
    }

    async fn list_consultant_assignments(
        &self,
        filter: &ConsultantAssignmentFilterParams,
        visibility: &Visibility,
    ) -> StoreResult<Vec<ConsultantAssignment>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {CONSULTANT_COLUMNS} FROM consultant_assignments WHERE TRUE"
        ));
        push_consultant_filters(&mut query, filter, visibility);
        query.push(" ORDER BY created_at DESC, id");
        Ok(query
            .build_query_as::<ConsultantAssignment>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
        update: UpdateConsultantAssignmentDto,
    ) -> StoreResult<ConsultantAssignment> {
        sqlx::query_as::<_, ConsultantAssignment>(&format!(
            r#"UPDATE consultant_assignments SET
                assignment_type = COALESCE($2, assignment_type),
                can_view_progress = COALESCE($3, can_view_progress),
                can_assign_courses = COALESCE($4, can_assign_courses),
                can_message_student = COALESCE($5, can_message_student),
                starts_at = COALESCE($6, starts_at),
                ends_at = COALESCE($7, ends_at),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CONSULTANT_COLUMNS}"#
        ))
        .bind(id)
        .bind(update.assignment_type)
        .bind(update.can_view_progress)
        .bind(update.can_assign_courses)
        .bind(update.can_message_student)
        .bind(update.starts_at)
        .bind(update.ends_at)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_CONSULTANT_MESSAGE))?
        .ok_or_else(|| missing(CONSULTANT_ASSIGNMENT_NOT_FOUND))
    }

    async fn deactivate_consultant_assignment(
        &self,
        id: ConsultantAssignmentId,
    ) -> StoreResult<ConsultantAssignment> {
        sqlx::query_as::<_, ConsultantAssignment>(&format!(
            r#"UPDATE consultant_assignments SET
                updated_at = CASE WHEN is_active THEN NOW() ELSE updated_at END,
                is_active = FALSE
            WHERE id = $1
            RETURNING {CONSULTANT_COLUMNS}"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing(CONSULTANT_ASSIGNMENT_NOT_FOUND))
    }

    async fn permission_rows(&self, role_types: &[RoleType]) -> StoreResult<Vec<RolePermission>> {
        let names: Vec<&str> = role_types.iter().map(RoleType::as_str).collect();
        Ok(sqlx::query_as::<_, RolePermission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM role_permissions WHERE role_type = ANY($1)"
        ))
        .bind(names)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_permission_rows(
        &self,
        filter: &MatrixFilterParams,
    ) -> StoreResult<Vec<RolePermission>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PERMISSION_COLUMNS} FROM role_permissions WHERE TRUE"
        ));
        if let Some(role_type) = filter.role_type {
            query.push(" AND role_type = ").push_bind(role_type);
        }
        if let Some(key) = &filter.permission_key {
            query.push(" AND permission_key = ").push_bind(key.as_str());
        }
        if !filter.include_test.unwrap_or(false) {
            query.push(" AND NOT is_test");
        }
        query.push(" ORDER BY permission_key, created_at, id");

        let mut rows = query
            .build_query_as::<RolePermission>()
            .fetch_all(&self.pool)
            .await?;
        rows.sort_by_key(|r| r.role_type.priority());
        Ok(rows)
    }

    async fn set_permission(
        &self,
        change: PermissionChange,
    ) -> StoreResult<PermissionChangeOutcome> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || ':' || $2))")
            .bind(change.role_type)
            .bind(&change.permission_key)
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, RolePermission>(&format!(
            r#"SELECT {PERMISSION_COLUMNS} FROM role_permissions
            WHERE role_type = $1 AND permission_key = $2 AND active AND NOT is_test
            ORDER BY created_at, id
            FOR UPDATE"#
        ))
        .bind(change.role_type)
        .bind(&change.permission_key)
        .fetch_all(&mut *tx)
        .await?;

        let Some(first) = rows.first() else {
            let permission = sqlx::query_as::<_, RolePermission>(&format!(
                r#"INSERT INTO role_permissions (role_type, permission_key, granted, reason, created_by)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {PERMISSION_COLUMNS}"#
            ))
            .bind(change.role_type)
            .bind(&change.permission_key)
            .bind(change.granted)
            .bind(&change.reason)
            .bind(change.performed_by)
            .fetch_one(&mut *tx)
            .await?;

            insert_audit(&mut tx, permission_entry(&change, None)).await?;
            tx.commit().await?;
            return Ok(PermissionChangeOutcome {
                permission,
                previous: None,
                changed: true,
            });
        };

        let previous = first.granted;
        let changed = rows.iter().any(|r| r.granted != change.granted);
        if !changed {
            tx.commit().await?;
            return Ok(PermissionChangeOutcome {
                permission: first.clone(),
                previous: Some(previous),
                changed,
            });
        }

        sqlx::query(
            r#"UPDATE role_permissions SET granted = $3, reason = $4, updated_at = NOW()
            WHERE role_type = $1 AND permission_key = $2 AND active AND NOT is_test"#,
        )
        .bind(change.role_type)
        .bind(&change.permission_key)
        .bind(change.granted)
        .bind(&change.reason)
        .execute(&mut *tx)
        .await?;

        let permission = sqlx::query_as::<_, RolePermission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM role_permissions WHERE id = $1"
        ))
        .bind(first.id)
        .fetch_one(&mut *tx)
        .await?;

        insert_audit(&mut tx, permission_entry(&change, Some(previous))).await?;
        tx.commit().await?;
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
        let role_types: Vec<&str> = seeds.iter().map(|s| s.role_type.as_str()).collect();
        let keys: Vec<&str> = seeds.iter().map(|s| s.permission_key.as_str()).collect();
        let granted: Vec<bool> = seeds.iter().map(|s| s.granted).collect();

        let mut tx = self.pool.begin().await?;
        sqlx::query("LOCK TABLE role_permissions IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query_as::<_, (RoleType, String, bool)>(
            r#"INSERT INTO role_permissions (role_type, permission_key, granted, created_by)
            SELECT s.role_type, s.permission_key, s.granted, $4
            FROM UNNEST($1::text[], $2::text[], $3::bool[]) AS s(role_type, permission_key, granted)
            WHERE NOT EXISTS (
                SELECT 1 FROM role_permissions rp
                WHERE rp.role_type = s.role_type
                  AND rp.permission_key = s.permission_key
                  AND rp.active AND NOT rp.is_test
            )
            RETURNING role_type, permission_key, granted"#,
        )
        .bind(role_types)
        .bind(keys)
        .bind(granted)
        .bind(performed_by)
        .fetch_all(&mut *tx)
        .await?;

        for (role_type, permission_key, granted) in &inserted {
            let seed = PermissionSeed {
                role_type: *role_type,
                permission_key: permission_key.clone(),
                granted: *granted,
            };
            insert_audit(&mut tx, seeded_entry(&seed, performed_by)).await?;
        }

        tx.commit().await?;
        Ok(SeedReport {
            inserted: inserted.len() as u64,
            existing: (seeds.len() - inserted.len()) as u64,
        })
    }

    async fn list_audit(&self, filter: &AuditFilterParams) -> StoreResult<(Vec<AuditEntry>, i64)> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM permission_audit_log WHERE TRUE");
        push_audit_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {AUDIT_COLUMNS} FROM permission_audit_log WHERE TRUE"
        ));
        push_audit_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.pagination.limit())
            .push(" OFFSET ")
            .push_bind(filter.pagination.offset());
        let entries = query
            .build_query_as::<AuditEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok((entries, total))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
