//! Schools, generations and growth communities.

use fake::Fake;
use fake::faker::address::en::CityName;
use rayon::prelude::*;
use sqlx::{Postgres, QueryBuilder, Transaction};

use genera_models::ids::{CommunityId, GenerationId, SchoolId};

use super::models::{
    CommunitySeed, DEMO_SCHOOL_PREFIX, DemoConfig, GenerationSeed, Organizations, SchoolSeed,
};

const GRADE_RANGES: [&str; 4] = ["1° a 2° básico", "3° a 4° básico", "5° a 6° básico", "7° a 8° básico"];

/// Even-indexed schools are organized by generation, odd ones are not.
pub fn generate_organizations(config: &DemoConfig) -> Organizations {
    let schools: Vec<SchoolSeed> = (0..config.num_schools)
        .into_par_iter()
        .map(|idx| {
            let city: String = CityName().fake();
            SchoolSeed {
                id: SchoolId::new(),
                name: format!("{DEMO_SCHOOL_PREFIX}Colegio {city} {}", idx + 1),
                has_generations: idx % 2 == 0,
            }
        })
        .collect();

    let generations: Vec<GenerationSeed> = schools
        .par_iter()
        .filter(|school| school.has_generations)
        .flat_map_iter(|school| {
            (0..config.generations_per_school).map(move |idx| GenerationSeed {
                id: GenerationId::new(),
                school_id: school.id,
                name: format!("Generación {}", 2020 + idx),
                grade_range: Some(GRADE_RANGES[idx % GRADE_RANGES.len()].to_string()),
            })
        })
        .collect();

    let per_group = config.communities_per_group;
    let mut communities: Vec<CommunitySeed> = generations
        .par_iter()
        .flat_map_iter(|generation| {
            (0..per_group).map(move |idx| CommunitySeed {
                id: CommunityId::new(),
                school_id: generation.school_id,
                generation_id: Some(generation.id),
                name: format!("Comunidad {} {}", generation.name, idx + 1),
            })
        })
        .collect();
    communities.par_extend(
        schools
            .par_iter()
            .filter(|school| !school.has_generations)
            .flat_map_iter(|school| {
                (0..per_group).map(move |idx| CommunitySeed {
                    id: CommunityId::new(),
                    school_id: school.id,
                    generation_id: None,
                    name: format!("Comunidad {}", idx + 1),
                })
            }),
    );

    Organizations {
        schools,
        generations,
        communities,
    }
}

// Four binds per row keeps every chunk far below the 65535 parameter limit.
const BATCH_SIZE: usize = 1000;

pub async fn insert_organizations(
    tx: &mut Transaction<'_, Postgres>,
    organizations: &Organizations,
) -> Result<(), sqlx::Error> {
    for chunk in organizations.schools.chunks(BATCH_SIZE) {
        QueryBuilder::<Postgres>::new("INSERT INTO schools (id, name, has_generations) ")
            .push_values(chunk, |mut row, school| {
                row.push_bind(school.id)
                    .push_bind(school.name.clone())
                    .push_bind(school.has_generations);
            })
            .build()
            .execute(&mut **tx)
            .await?;
    }

    for chunk in organizations.generations.chunks(BATCH_SIZE) {
        QueryBuilder::<Postgres>::new(
            "INSERT INTO generations (id, school_id, name, grade_range) ",
        )
        .push_values(chunk, |mut row, generation| {
            row.push_bind(generation.id)
                .push_bind(generation.school_id)
                .push_bind(generation.name.clone())
                .push_bind(generation.grade_range.clone());
        })
        .build()
        .execute(&mut **tx)
        .await?;
    }

    for chunk in organizations.communities.chunks(BATCH_SIZE) {
        QueryBuilder::<Postgres>::new(
            "INSERT INTO growth_communities (id, school_id, generation_id, name) ",
        )
        .push_values(chunk, |mut row, community| {
            row.push_bind(community.id)
                .push_bind(community.school_id)
                .push_bind(community.generation_id)
                .push_bind(community.name.clone());
        })
        .build()
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
