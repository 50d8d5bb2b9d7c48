use anyhow::anyhow;
use tracing::{info, instrument};

use genera_core::permissions::{CREATE_USERS, DELETE_USERS, EDIT_USERS, VIEW_USERS};
use genera_core::{AppError, hash_password};
use genera_db::AccessStore;
use genera_db::store::ApprovalChange;
use genera_models::ids::UserId;
use genera_models::profiles::{
    ApprovalStatus, CreateUserDto, NewProfile, PaginatedProfilesResponse, Profile,
    ProfileFilterParams, ProfileUpdate, ProfileWithRoles, UpdateApprovalDto, UpdateUserDto,
};

use crate::authz::{AccessContext, ResourceScope};
use crate::metrics::{self, AccessEvent};
use crate::modules::schools::SchoolService;

pub const SELF_APPROVAL_MESSAGE: &str = "No puedes cambiar el estado de tu propia cuenta";
pub const DISABLE_THROUGH_DELETE_MESSAGE: &str =
    "Para deshabilitar un usuario usa DELETE /api/users/{id}";

pub struct UserService;

impl UserService {
    #[instrument(skip(store, access, filters))]
    pub async fn list_users(
        store: &dyn AccessStore,
        access: &AccessContext,
        filters: ProfileFilterParams,
    ) -> Result<PaginatedProfilesResponse, AppError> {
        let visibility = access.visibility(VIEW_USERS)?;
        let (data, total) = store.list_profiles(&filters, &visibility).await?;
        let meta = filters.pagination.meta(total, data.len());
        Ok(PaginatedProfilesResponse { data, meta })
    }

    /// Creates a profile inside the caller's reach. Staff-created accounts
    /// are approved unless the body says otherwise.
    #[instrument(skip(store, access, dto), fields(email = %dto.email))]
    pub async fn create_user(
        store: &dyn AccessStore,
        access: &AccessContext,
        dto: CreateUserDto,
    ) -> Result<Profile, AppError> {
        access.authorize(
            CREATE_USERS,
            &ResourceScope {
                generation_id: dto.generation_id,
                community_id: dto.community_id,
                ..ResourceScope::within_school(dto.school_id)
            },
        )?;
        SchoolService::check_affiliation(store, dto.school_id, dto.generation_id, dto.community_id)
            .await?;

        let password_hash = hash_password(&dto.password)?;
        let profile = store
            .create_profile(NewProfile {
                email: dto.email.trim().to_lowercase(),
                first_name: dto.first_name.trim().to_string(),
                last_name: dto.last_name.trim().to_string(),
                password_hash,
                school_id: dto.school_id,
                generation_id: dto.generation_id,
                community_id: dto.community_id,
                approval_status: dto.approval_status.unwrap_or(ApprovalStatus::Approved),
            })
            .await?;

        metrics::record(AccessEvent::UserCreated);
        info!(user.id = %profile.id, created_by = %access.user_id(), "User created");
        Ok(profile)
    }

    #[instrument(skip(store, access))]
    pub async fn get_user(
        store: &dyn AccessStore,
        access: &AccessContext,
        id: UserId,
    ) -> Result<ProfileWithRoles, AppError> {
        let profile = store.get_profile(id).await?;
        access.authorize(VIEW_USERS, &ResourceScope::profile(&profile))?;
        let roles = store.list_assignments(id, false).await?;
        Ok(ProfileWithRoles::new(profile, roles))
    }

    /// Edits a profile. Moving it to another school also needs `edit_users`
    /// over the destination.
    #[instrument(skip(store, access, dto))]
    pub async fn update_user(
        store: &dyn AccessStore,
        access: &AccessContext,
        id: UserId,
        dto: UpdateUserDto,
    ) -> Result<Profile, AppError> {
        let target = store.get_profile(id).await?;
        access.authorize(EDIT_USERS, &ResourceScope::profile(&target))?;

        let update = ProfileUpdate::from(dto);
        let mut merged = target.clone();
        update.apply(&mut merged);

        if merged.school_id != target.school_id {
            access.authorize(
                EDIT_USERS,
                &ResourceScope {
                    generation_id: merged.generation_id,
                    community_id: merged.community_id,
                    ..ResourceScope::within_school(merged.school_id)
                },
            )?;
        }
        SchoolService::check_affiliation(
            store,
            merged.school_id,
            merged.generation_id,
            merged.community_id,
        )
        .await?;

        let profile = store.update_profile(id, update).await?;
        info!(user.id = %id, "User updated");
        Ok(profile)
    }

    /// Approves, rejects, or re-opens a profile. Callers cannot change their
    /// own status, and disabling goes through [`UserService::disable_user`].
    #[instrument(skip(store, access, dto), fields(status = %dto.approval_status))]
    pub async fn update_approval(
        store: &dyn AccessStore,
        access: &AccessContext,
        id: UserId,
        dto: UpdateApprovalDto,
    ) -> Result<Profile, AppError> {
        if id == access.user_id() {
            return Err(AppError::bad_request(anyhow!(SELF_APPROVAL_MESSAGE)));
        }
        if dto.approval_status == ApprovalStatus::Disabled {
            return Err(AppError::bad_request(anyhow!(DISABLE_THROUGH_DELETE_MESSAGE)));
        }

        let target = store.get_profile(id).await?;
        access.authorize(EDIT_USERS, &ResourceScope::profile(&target))?;

        let profile = store
            .change_approval(ApprovalChange {
                user_id: id,
                status: dto.approval_status,
                reason: dto.reason,
                performed_by: Some(access.user_id()),
            })
            .await?;
        info!(user.id = %id, status = %profile.approval_status, "Approval status changed");
        Ok(profile)
    }

    /// Soft delete: the profile is kept with status `disabled`.
    #[instrument(skip(store, access))]
    pub async fn disable_user(
        store: &dyn AccessStore,
        access: &AccessContext,
        id: UserId,
    ) -> Result<(), AppError> {
        if id == access.user_id() {
            return Err(AppError::bad_request(anyhow!(SELF_APPROVAL_MESSAGE)));
        }

        let target = store.get_profile(id).await?;
        access.authorize(DELETE_USERS, &ResourceScope::profile(&target))?;

        store
            .change_approval(ApprovalChange {
                user_id: id,
                status: ApprovalStatus::Disabled,
                reason: None,
                performed_by: Some(access.user_id()),
            })
            .await?;
        info!(user.id = %id, "User disabled");
        Ok(())
    }
}
