//! Seed rows and the demo configuration.
//!
//! Ids are generated client-side so that profiles and assignments can point
//! at organizations before anything reaches the database.

use genera_models::ids::{CommunityId, GenerationId, SchoolId, UserId};
use genera_models::roles::RoleType;

/// Schools created by the seeder carry this name prefix.
pub const DEMO_SCHOOL_PREFIX: &str = "Demo ";

/// Profiles created by the seeder use this email domain.
pub const DEMO_EMAIL_DOMAIN: &str = "demo.genera.cl";

/// Audit reason recorded for seeded assignments.
pub const DEMO_AUDIT_REASON: &str = "seed-demo";

#[derive(Debug, Clone)]
pub struct SchoolSeed {
    pub id: SchoolId,
    pub name: String,
    pub has_generations: bool,
}

#[derive(Debug, Clone)]
pub struct GenerationSeed {
    pub id: GenerationId,
    pub school_id: SchoolId,
    pub name: String,
    pub grade_range: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommunitySeed {
    pub id: CommunityId,
    pub school_id: SchoolId,
    pub generation_id: Option<GenerationId>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ProfileSeed {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSeed {
    pub user_id: UserId,
    pub role_type: RoleType,
    pub school_id: Option<SchoolId>,
    pub generation_id: Option<GenerationId>,
    pub community_id: Option<CommunityId>,
}

/// Organizations generated for one run.
#[derive(Debug, Default)]
pub struct Organizations {
    pub schools: Vec<SchoolSeed>,
    pub generations: Vec<GenerationSeed>,
    pub communities: Vec<CommunitySeed>,
}

/// People generated for one run, with their assignments.
#[derive(Debug, Default)]
pub struct People {
    pub profiles: Vec<ProfileSeed>,
    pub roles: Vec<RoleSeed>,
}

/// How much demo data to generate.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub num_schools: usize,
    /// Generations per school, for schools organized by generation.
    pub generations_per_school: usize,
    /// Communities per generation, or per school when it has no generations.
    pub communities_per_group: usize,
    pub docentes_per_community: usize,
    pub estudiantes_per_community: usize,
    /// Shared password of every demo profile.
    pub password: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            num_schools: 3,
            generations_per_school: 2,
            communities_per_group: 2,
            docentes_per_community: 4,
            estudiantes_per_community: 10,
            password: "demo-password".to_string(),
        }
    }
}

impl DemoConfig {
    pub fn new(num_schools: usize) -> Self {
        Self {
            num_schools,
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_people(mut self, docentes: usize, estudiantes: usize) -> Self {
        self.docentes_per_community = docentes;
        self.estudiantes_per_community = estudiantes;
        self
    }
}
