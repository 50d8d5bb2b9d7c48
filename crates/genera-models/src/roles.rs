//! Role types and role assignments.
//!
//! A role type is one of a fixed set of tags. Users receive role types through
//! rows in `user_roles` (assignments), each optionally anchored to a school,
//! generation, growth community, or school network. Removing a role only
//! deactivates the assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use genera_core::serde::deserialize_optional_bool;

use crate::UnknownVariant;
use crate::ids::{CommunityId, GenerationId, NetworkId, RoleAssignmentId, SchoolId, UserId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    Admin,
    Consultor,
    EquipoDirectivo,
    LiderGeneracion,
    LiderComunidad,
    SupervisorDeRed,
    CommunityManager,
    Docente,
    Estudiante,
}

/// How far a role's reports reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportingScope {
    Individual,
    Community,
    Generation,
    School,
    Network,
    Global,
}

/// Organizational anchors a role type needs when it is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct RoleRequirements {
    pub requires_school: bool,
    /// Only enforced when the school is organized in generations.
    pub requires_generation: bool,
    pub requires_network: bool,
    /// A community is created for the leader when none is given.
    pub creates_community: bool,
}

impl RoleType {
    /// All role types, highest priority first.
    pub const ALL: [RoleType; 9] = [
        RoleType::Admin,
        RoleType::Consultor,
        RoleType::EquipoDirectivo,
        RoleType::LiderGeneracion,
        RoleType::LiderComunidad,
        RoleType::SupervisorDeRed,
        RoleType::CommunityManager,
        RoleType::Docente,
        RoleType::Estudiante,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Admin => "admin",
            RoleType::Consultor => "consultor",
            RoleType::EquipoDirectivo => "equipo_directivo",
            RoleType::LiderGeneracion => "lider_generacion",
            RoleType::LiderComunidad => "lider_comunidad",
            RoleType::SupervisorDeRed => "supervisor_de_red",
            RoleType::CommunityManager => "community_manager",
            RoleType::Docente => "docente",
            RoleType::Estudiante => "estudiante",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RoleType::Admin => "Administrador Global",
            RoleType::Consultor => "Consultor FNE",
            RoleType::EquipoDirectivo => "Equipo Directivo",
            RoleType::LiderGeneracion => "Líder de Generación",
            RoleType::LiderComunidad => "Líder de Comunidad",
            RoleType::SupervisorDeRed => "Supervisor de Red",
            RoleType::CommunityManager => "Community Manager",
            RoleType::Docente => "Docente",
            RoleType::Estudiante => "Estudiante",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RoleType::Admin => "Control total de la plataforma",
            RoleType::Consultor => "Consultor asignado a escuelas, con visibilidad de reportes",
            RoleType::EquipoDirectivo => "Gestión de su escuela",
            RoleType::LiderGeneracion => "Lidera una generación dentro de su escuela",
            RoleType::LiderComunidad => "Lidera una comunidad de crecimiento",
            RoleType::SupervisorDeRed => "Supervisa las escuelas de una red",
            RoleType::CommunityManager => "Gestiona contenidos y eventos de la comunidad",
            RoleType::Docente => "Profesor con acceso a sus cursos",
            RoleType::Estudiante => "Acceso a sus cursos y rutas de aprendizaje",
        }
    }

    /// Position in [`RoleType::ALL`]; lower is more privileged.
    pub fn priority(&self) -> usize {
        RoleType::ALL
            .iter()
            .position(|r| r == self)
            .unwrap_or(RoleType::ALL.len())
    }

    pub fn requirements(&self) -> RoleRequirements {
        match self {
            RoleType::Admin | RoleType::CommunityManager => RoleRequirements::default(),
            RoleType::Consultor
            | RoleType::EquipoDirectivo
            | RoleType::Docente
            | RoleType::Estudiante => RoleRequirements {
                requires_school: true,
                ..Default::default()
            },
            RoleType::LiderGeneracion => RoleRequirements {
                requires_school: true,
                requires_generation: true,
                ..Default::default()
            },
            RoleType::LiderComunidad => RoleRequirements {
                requires_school: true,
                creates_community: true,
                ..Default::default()
            },
            RoleType::SupervisorDeRed => RoleRequirements {
                requires_network: true,
                ..Default::default()
            },
        }
    }

    pub fn reporting_scope(&self) -> ReportingScope {
        match self {
            RoleType::Admin => ReportingScope::Global,
            RoleType::Consultor | RoleType::EquipoDirectivo => ReportingScope::School,
            RoleType::LiderGeneracion => ReportingScope::Generation,
            RoleType::LiderComunidad => ReportingScope::Community,
            RoleType::SupervisorDeRed => ReportingScope::Network,
            RoleType::CommunityManager | RoleType::Docente | RoleType::Estudiante => {
                ReportingScope::Individual
            }
        }
    }

    /// Highest-priority role among `roles`.
    pub fn highest<I>(roles: I) -> Option<RoleType>
    where
        I: IntoIterator<Item = RoleType>,
    {
        roles.into_iter().min_by_key(RoleType::priority)
    }
}

impl FromStr for RoleType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleType::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "role_type",
                value: s.to_string(),
            })
    }
}

text_column!(RoleType);

impl RoleRequirements {
    /// Checks the anchors of a prospective assignment.
    ///
    /// Returns the user-facing message for the first unmet requirement.
    pub fn check(
        &self,
        role: RoleType,
        scope: &AssignmentScope,
        school_has_generations: bool,
    ) -> Result<(), String> {
        if self.requires_school && scope.school_id.is_none() {
            return Err(format!(
                "El rol \"{}\" requiere una escuela asignada",
                role.display_name()
            ));
        }
        if self.requires_generation && school_has_generations && scope.generation_id.is_none() {
            return Err(format!(
                "El rol \"{}\" requiere una generación asignada",
                role.display_name()
            ));
        }
        if self.requires_network && scope.network_id.is_none() {
            return Err(format!(
                "El rol \"{}\" requiere una red asignada",
                role.display_name()
            ));
        }
        Ok(())
    }
}

/// Organizational anchors of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct AssignmentScope {
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    pub network_id: Option<NetworkId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RoleAssignment {
    pub id: RoleAssignmentId,
    pub user_id: UserId,
    pub role_type: RoleType,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    pub network_id: Option<NetworkId>,
    pub is_active: bool,
    pub assigned_by: Option<UserId>,
    pub assigned_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn scope(&self) -> AssignmentScope {
        AssignmentScope {
            school_id: self.school_id,
            generation_id: self.generation_id,
            community_id: self.community_id,
            network_id: self.network_id,
        }
    }
}

/// Store input for a new assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoleAssignment {
    pub user_id: UserId,
    pub role_type: RoleType,
    pub scope: AssignmentScope,
    pub assigned_by: Option<UserId>,
}

/// Community to get-or-create for a `lider_comunidad` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderCommunity {
    pub school_id: SchoolId,
    pub generation_id: Option<GenerationId>,
    pub name: String,
}

impl LeaderCommunity {
    pub fn name_for(first_name: &str, last_name: &str) -> String {
        format!("Comunidad de {} {}", first_name.trim(), last_name.trim())
            .trim_end()
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AssignRoleDto {
    pub role_type: RoleType,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
    pub network_id: Option<NetworkId>,
}

impl AssignRoleDto {
    pub fn scope(&self) -> AssignmentScope {
        AssignmentScope {
            school_id: self.school_id,
            generation_id: self.generation_id,
            community_id: self.community_id,
            network_id: self.network_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RoleAssignmentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub include_inactive: Option<bool>,
}

/// Catalog entry returned by `GET /api/roles`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleInfo {
    pub role_type: RoleType,
    pub name: &'static str,
    pub description: &'static str,
    pub priority: usize,
    pub reporting_scope: ReportingScope,
    #[serde(flatten)]
    pub requirements: RoleRequirements,
}

impl From<RoleType> for RoleInfo {
    fn from(role_type: RoleType) -> Self {
        Self {
            role_type,
            name: role_type.display_name(),
            description: role_type.description(),
            priority: role_type.priority(),
            reporting_scope: role_type.reporting_scope(),
            requirements: role_type.requirements(),
        }
    }
}

/// Reach of a user's reports, anchored on the organization it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DataScope {
    pub role_type: RoleType,
    pub scope: ReportingScope,
    /// Network, school, generation, community, or user id depending on `scope`;
    /// absent for global scope.
    pub context_id: Option<Uuid>,
}

impl DataScope {
    /// Data scope of the highest-priority active assignment.
    pub fn resolve(user_id: UserId, assignments: &[RoleAssignment]) -> Option<DataScope> {
        let assignment = assignments
            .iter()
            .filter(|a| a.is_active)
            .min_by_key(|a| a.role_type.priority())?;
        let scope = assignment.role_type.reporting_scope();
        let context_id = match scope {
            ReportingScope::Global => None,
            ReportingScope::Network => assignment.network_id.map(Uuid::from),
            ReportingScope::School => assignment.school_id.map(Uuid::from),
            ReportingScope::Generation => assignment.generation_id.map(Uuid::from),
            ReportingScope::Community => assignment.community_id.map(Uuid::from),
            ReportingScope::Individual => Some(user_id.into_inner()),
        };
        Some(DataScope {
            role_type: assignment.role_type,
            scope,
            context_id,
        })
    }
}
