//! Schools, generations, growth communities, and school networks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use genera_core::{PaginationMeta, PaginationParams};

use crate::ids::{CommunityId, GenerationId, NetworkId, SchoolId, UserId};

pub const DEFAULT_MAX_TEACHERS: i32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    /// Whether the school groups its students by generation.
    pub has_generations: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSchoolDto {
    #[validate(length(min = 1, max = 200, message = "El nombre debe tener entre 1 y 200 caracteres"))]
    pub name: String,
    #[serde(default)]
    pub has_generations: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSchoolDto {
    #[validate(length(min = 1, max = 200, message = "El nombre debe tener entre 1 y 200 caracteres"))]
    pub name: Option<String>,
    pub has_generations: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SchoolFilterParams {
    pub name: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

impl SchoolFilterParams {
    pub fn matches(&self, school: &School) -> bool {
        self.name
            .as_deref()
            .map(str::to_lowercase)
            .is_none_or(|n| school.name.to_lowercase().contains(&n))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedSchoolsResponse {
    pub data: Vec<School>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Generation {
    pub id: GenerationId,
    pub school_id: SchoolId,
    pub name: String,
    /// Free-form grade range, e.g. `"1° a 4° básico"`.
    pub grade_range: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateGenerationDto {
    #[validate(length(min = 1, max = 100, message = "El nombre debe tener entre 1 y 100 caracteres"))]
    pub name: String,
    pub grade_range: Option<String>,
}

/// Growth community: a group of teachers inside a school and, when the
/// school uses them, a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Community {
    pub id: CommunityId,
    pub school_id: SchoolId,
    pub generation_id: Option<GenerationId>,
    pub name: String,
    pub max_teachers: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCommunityDto {
    #[validate(length(min = 1, max = 200, message = "El nombre debe tener entre 1 y 200 caracteres"))]
    pub name: String,
    pub generation_id: Option<GenerationId>,
    #[validate(range(min = 1, max = 100, message = "El máximo de docentes debe estar entre 1 y 100"))]
    pub max_teachers: Option<i32>,
}

/// Store input for a community.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommunity {
    pub school_id: SchoolId,
    pub generation_id: Option<GenerationId>,
    pub name: String,
    pub max_teachers: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Network {
    pub id: NetworkId,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateNetworkDto {
    #[validate(length(min = 1, max = 200, message = "El nombre debe tener entre 1 y 200 caracteres"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateNetworkDto {
    #[validate(length(min = 1, max = 200, message = "El nombre debe tener entre 1 y 200 caracteres"))]
    pub name: Option<String>,
    /// An empty description clears it.
    pub description: Option<String>,
}

/// Store input for a network edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

impl From<UpdateNetworkDto> for NetworkUpdate {
    fn from(dto: UpdateNetworkDto) -> Self {
        Self {
            name: dto
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            description: dto.description.map(|d| {
                let d = d.trim();
                (!d.is_empty()).then(|| d.to_string())
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct NetworkMembership {
    pub network_id: NetworkId,
    pub school_id: SchoolId,
    pub assigned_by: Option<UserId>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NetworkWithSchools {
    #[serde(flatten)]
    pub network: Network,
    pub schools: Vec<School>,
}
