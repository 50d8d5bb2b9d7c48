use anyhow::anyhow;
use tracing::{info, instrument};

use genera_core::AppError;
use genera_core::permissions::{
    CREATE_SCHOOLS_ALL, EDIT_SCHOOLS, MANAGE_COMMUNITIES, MANAGE_GENERATIONS, VIEW_SCHOOLS,
};
use genera_db::{AccessStore, StoreError, StoreResult};
use genera_models::ids::{CommunityId, GenerationId, SchoolId};
use genera_models::organizations::{
    Community, CreateCommunityDto, CreateGenerationDto, CreateSchoolDto, DEFAULT_MAX_TEACHERS,
    Generation, NewCommunity, PaginatedSchoolsResponse, School, SchoolFilterParams,
    UpdateSchoolDto,
};

use crate::authz::{AccessContext, ResourceScope};
use crate::metrics::{self, AccessEvent};

/// Turns a missing referenced record into a 400.
fn referenced<T>(result: StoreResult<T>, message: &'static str) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(StoreError::NotFound(_)) => Err(AppError::bad_request(anyhow!(message))),
        Err(e) => Err(e.into()),
    }
}

pub struct SchoolService;

impl SchoolService {
    #[instrument(skip(store, access, filters))]
    pub async fn list_schools(
        store: &dyn AccessStore,
        access: &AccessContext,
        filters: SchoolFilterParams,
    ) -> Result<PaginatedSchoolsResponse, AppError> {
        let visibility = access.visibility(VIEW_SCHOOLS)?;
        let (data, total) = store.list_schools(&filters, &visibility).await?;
        let meta = filters.pagination.meta(total, data.len());
        Ok(PaginatedSchoolsResponse { data, meta })
    }

    #[instrument(skip(store, access, dto), fields(name = %dto.name))]
    pub async fn create_school(
        store: &dyn AccessStore,
        access: &AccessContext,
        dto: CreateSchoolDto,
    ) -> Result<School, AppError> {
        access.require_permission(CREATE_SCHOOLS_ALL)?;
        let school = store
            .create_school(dto.name.trim(), dto.has_generations)
            .await?;
        metrics::record(AccessEvent::SchoolCreated);
        info!(school.id = %school.id, "School created");
        Ok(school)
    }

    #[instrument(skip(store, access))]
    pub async fn get_school(
        store: &dyn AccessStore,
        access: &AccessContext,
        id: SchoolId,
    ) -> Result<School, AppError> {
        let school = store.get_school(id).await?;
        access.authorize(VIEW_SCHOOLS, &ResourceScope::school_record(&school))?;
        Ok(school)
    }

    #[instrument(skip(store, access, dto))]
    pub async fn update_school(
        store: &dyn AccessStore,
        access: &AccessContext,
        id: SchoolId,
        dto: UpdateSchoolDto,
    ) -> Result<School, AppError> {
        let school = store.get_school(id).await?;
        access.authorize(EDIT_SCHOOLS, &ResourceScope::school_record(&school))?;
        Ok(store.update_school(id, dto).await?)
    }

    #[instrument(skip(store, access))]
    pub async fn list_generations(
        store: &dyn AccessStore,
        access: &AccessContext,
        school_id: SchoolId,
    ) -> Result<Vec<Generation>, AppError> {
        let school = store.get_school(school_id).await?;
        access.authorize_any(
            &[VIEW_SCHOOLS, MANAGE_GENERATIONS],
            &ResourceScope::school_record(&school),
        )?;
        Ok(store.list_generations(school_id).await?)
    }

    #[instrument(skip(store, access, dto), fields(name = %dto.name))]
    pub async fn create_generation(
        store: &dyn AccessStore,
        access: &AccessContext,
        school_id: SchoolId,
        dto: CreateGenerationDto,
    ) -> Result<Generation, AppError> {
        store.get_school(school_id).await?;
        access.authorize(MANAGE_GENERATIONS, &ResourceScope::within_school(Some(school_id)))?;
        let generation = store
            .create_generation(school_id, dto.name.trim(), dto.grade_range.as_deref())
            .await?;
        info!(generation.id = %generation.id, school.id = %school_id, "Generation created");
        Ok(generation)
    }

    #[instrument(skip(store, access))]
    pub async fn list_communities(
        store: &dyn AccessStore,
        access: &AccessContext,
        school_id: SchoolId,
    ) -> Result<Vec<Community>, AppError> {
        let school = store.get_school(school_id).await?;
        access.authorize_any(
            &[VIEW_SCHOOLS, MANAGE_COMMUNITIES],
            &ResourceScope::school_record(&school),
        )?;
        Ok(store.list_communities(school_id).await?)
    }

    /// Creates a community. Schools organized in generations require one,
    /// and it must belong to the same school.
    #[instrument(skip(store, access, dto), fields(name = %dto.name))]
    pub async fn create_community(
        store: &dyn AccessStore,
        access: &AccessContext,
        school_id: SchoolId,
        dto: CreateCommunityDto,
    ) -> Result<Community, AppError> {
        let school = store.get_school(school_id).await?;
        if school.has_generations && dto.generation_id.is_none() {
            return Err(AppError::bad_request(anyhow!(
                "La escuela se organiza por generaciones: indica la generación de la comunidad"
            )));
        }
        Self::check_affiliation(store, Some(school_id), dto.generation_id, None).await?;

        access.authorize(
            MANAGE_COMMUNITIES,
            &ResourceScope {
                generation_id: dto.generation_id,
                ..ResourceScope::within_school(Some(school_id))
            },
        )?;

        let community = store
            .create_community(NewCommunity {
                school_id,
                generation_id: dto.generation_id,
                name: dto.name.trim().to_string(),
                max_teachers: dto.max_teachers.unwrap_or(DEFAULT_MAX_TEACHERS),
            })
            .await?;
        info!(community.id = %community.id, school.id = %school_id, "Community created");
        Ok(community)
    }

    /// Checks that the referenced school, generation, and community exist and
    /// nest inside each other. Returns the school when one is given.
    pub async fn check_affiliation(
        store: &dyn AccessStore,
        school_id: Option<SchoolId>,
        generation_id: Option<GenerationId>,
        community_id: Option<CommunityId>,
    ) -> Result<Option<School>, AppError> {
        let Some(school_id) = school_id else {
            if generation_id.is_some() || community_id.is_some() {
                return Err(AppError::bad_request(anyhow!(
                    "La generación o comunidad requiere una escuela"
                )));
            }
            return Ok(None);
        };

        let school = referenced(store.get_school(school_id).await, "La escuela indicada no existe")?;

        if let Some(generation_id) = generation_id {
            let generation = referenced(
                store.get_generation(generation_id).await,
                "La generación indicada no existe",
            )?;
            if generation.school_id != school_id {
                return Err(AppError::bad_request(anyhow!(
                    "La generación no pertenece a la escuela indicada"
                )));
            }
        }

        if let Some(community_id) = community_id {
            let community = referenced(
                store.get_community(community_id).await,
                "La comunidad indicada no existe",
            )?;
            if community.school_id != school_id {
                return Err(AppError::bad_request(anyhow!(
                    "La comunidad no pertenece a la escuela indicada"
                )));
            }
            if generation_id.is_some() && community.generation_id != generation_id {
                return Err(AppError::bad_request(anyhow!(
                    "La comunidad no pertenece a la generación indicada"
                )));
            }
        }

        Ok(Some(school))
    }
}
