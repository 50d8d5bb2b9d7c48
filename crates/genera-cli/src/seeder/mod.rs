//! Demo data seeding.
//!
//! Generates schools, generations, growth communities and approved profiles
//! with role assignments, and inserts them in a single transaction. Every
//! seeded row is marked (school name prefix, email domain) so that
//! [`clear_demo`] removes exactly what [`seed_demo`] created.

pub mod models;
pub mod organizations;
pub mod profiles;

use std::time::Instant;

use anyhow::Context;
use sqlx::PgPool;

use genera_core::hash_password;

pub use models::{DEMO_EMAIL_DOMAIN, DEMO_SCHOOL_PREFIX, DemoConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DemoReport {
    pub schools: usize,
    pub generations: usize,
    pub communities: usize,
    pub profiles: usize,
}

fn school_pattern() -> String {
    format!("{DEMO_SCHOOL_PREFIX}%")
}

fn email_pattern() -> String {
    format!("%@{DEMO_EMAIL_DOMAIN}")
}

/// Seeds one run of demo data. Refuses to run over an earlier seed.
pub async fn seed_demo(db: &PgPool, config: DemoConfig) -> anyhow::Result<DemoReport> {
    let start_time = Instant::now();

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schools WHERE name LIKE $1")
        .bind(school_pattern())
        .fetch_one(db)
        .await?;
    if existing > 0 {
        anyhow::bail!("Ya existen {existing} escuelas de demostración; ejecuta `clear-demo` primero");
    }

    let password_hash = hash_password(&config.password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e.error))?;

    println!("🏫 Generating {} schools...", config.num_schools);
    let organizations = organizations::generate_organizations(&config);
    let people = profiles::generate_people(&organizations, &config, &password_hash);
    println!(
        "   ✓ Generated {} generations, {} communities, {} profiles",
        organizations.generations.len(),
        organizations.communities.len(),
        people.profiles.len()
    );

    let mut tx = db.begin().await?;
    organizations::insert_organizations(&mut tx, &organizations)
        .await
        .context("Failed to insert organizations")?;
    profiles::insert_people(&mut tx, &people)
        .await
        .context("Failed to insert profiles")?;
    tx.commit().await?;

    println!("   ✓ Seeded demo data in {:?}", start_time.elapsed());

    Ok(DemoReport {
        schools: organizations.schools.len(),
        generations: organizations.generations.len(),
        communities: organizations.communities.len(),
        profiles: people.profiles.len(),
    })
}

/// Deletes demo profiles and schools. Generations, communities and
/// assignments go with them through cascades. Audit entries are kept.
pub async fn clear_demo(db: &PgPool) -> anyhow::Result<(u64, u64)> {
    let start_time = Instant::now();
    println!("🗑️  Clearing demo data...");

    let mut tx = db.begin().await?;
    let profiles = sqlx::query("DELETE FROM profiles WHERE email LIKE $1")
        .bind(email_pattern())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let schools = sqlx::query("DELETE FROM schools WHERE name LIKE $1")
        .bind(school_pattern())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;

    println!(
        "   ✓ Deleted {} profiles and {} schools in {:?}",
        profiles,
        schools,
        start_time.elapsed()
    );

    Ok((profiles, schools))
}
