use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;

use genera_cli::admin::{NewAdmin, create_admin};
use genera_cli::integrity::{assignment_violation, verify_matrix};
use genera_cli::seeder::{self, DemoConfig};
use genera_db::store::RoleRemoval;
use genera_db::{AccessStore, PgPool, PgStore, init_db_pool, run_migrations};
use genera_models::permissions::default_matrix;
use genera_models::roles::RoleType;

#[derive(Parser)]
#[command(name = "genera-cli")]
#[command(about = "Genera CLI - maintenance tools for the access-control database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert the default permission matrix rows that are missing
    SeedPermissions,
    /// Check the permission matrix invariants (exits non-zero on issues)
    VerifyPermissions,
    /// Report active role assignments that break their role's requirements
    AuditAssignments {
        /// Deactivate the offending assignments
        #[arg(long)]
        fix: bool,
    },
    /// Create an approved administrator account
    CreateAdmin {
        #[arg(short = 'f', long)]
        first_name: Option<String>,

        #[arg(short = 'l', long)]
        last_name: Option<String>,

        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Prompted securely if not provided
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
    /// Seed demo schools, generations, communities and users
    SeedDemo {
        /// Number of schools to create
        #[arg(short = 's', long, default_value = "3")]
        schools: usize,

        /// Docentes per growth community
        #[arg(long, default_value = "4")]
        docentes: usize,

        /// Estudiantes per growth community
        #[arg(long, default_value = "10")]
        estudiantes: usize,

        /// Shared password of the demo users
        #[arg(long, default_value = "demo-password")]
        password: String,
    },
    /// Delete the demo data created by `seed-demo`
    ClearDemo,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\n❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = init_db_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

async fn run(command: Commands) -> anyhow::Result<ExitCode> {
    let pool = connect().await?;
    let store = PgStore::new(pool.clone());

    match command {
        Commands::SeedPermissions => handle_seed_permissions(&store).await,
        Commands::VerifyPermissions => handle_verify_permissions(&store).await,
        Commands::AuditAssignments { fix } => handle_audit_assignments(&store, fix).await,
        Commands::CreateAdmin {
            first_name,
            last_name,
            email,
            password,
        } => handle_create_admin(&store, first_name, last_name, email, password).await,
        Commands::SeedDemo {
            schools,
            docentes,
            estudiantes,
            password,
        } => {
            let config = DemoConfig::new(schools)
                .with_people(docentes, estudiantes)
                .with_password(password);
            let report = seeder::seed_demo(&pool, config).await?;
            println!(
                "✅ Created {} schools, {} generations, {} communities and {} users",
                report.schools, report.generations, report.communities, report.profiles
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::ClearDemo => {
            seeder::clear_demo(&pool).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn handle_seed_permissions(store: &PgStore) -> anyhow::Result<ExitCode> {
    let report = store.seed_permissions(&default_matrix(), None).await?;
    println!(
        "✅ Inserted {} permission rows ({} already present)",
        report.inserted, report.existing
    );
    Ok(ExitCode::SUCCESS)
}

async fn handle_verify_permissions(store: &PgStore) -> anyhow::Result<ExitCode> {
    let rows = store.permission_rows(&RoleType::ALL).await?;
    let issues = verify_matrix(&rows, Utc::now());

    if issues.is_empty() {
        println!("✅ Permission matrix is consistent ({} rows)", rows.len());
        return Ok(ExitCode::SUCCESS);
    }

    for issue in &issues {
        println!("   ✗ {issue}");
    }
    eprintln!("\n❌ {} issue(s) found", issues.len());
    Ok(ExitCode::FAILURE)
}

async fn handle_audit_assignments(store: &PgStore, fix: bool) -> anyhow::Result<ExitCode> {
    let assignments = store.list_active_assignments().await?;
    let mut violations = 0;

    for assignment in &assignments {
        let has_generations = match assignment.school_id {
            Some(school_id) => store.get_school(school_id).await?.has_generations,
            None => false,
        };
        let Some(reason) = assignment_violation(assignment, has_generations) else {
            continue;
        };
        violations += 1;
        println!(
            "   ✗ {} {} ({}): {}",
            assignment.user_id, assignment.role_type, assignment.id, reason
        );

        if fix {
            store
                .remove_role(RoleRemoval {
                    assignment_id: assignment.id,
                    reason: Some(format!("audit-assignments: {reason}")),
                    performed_by: None,
                })
                .await
                .with_context(|| format!("Failed to deactivate assignment {}", assignment.id))?;
            println!("     → deactivated");
        }
    }

    if violations == 0 {
        println!("✅ {} active assignments checked", assignments.len());
        return Ok(ExitCode::SUCCESS);
    }
    if fix {
        println!("\n✅ Deactivated {violations} assignment(s)");
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!("\n❌ {violations} invalid assignment(s); rerun with --fix to deactivate them");
    Ok(ExitCode::FAILURE)
}

fn prompt(label: &str, value: Option<String>) -> anyhow::Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Input::<String>::new()
            .with_prompt(label)
            .interact_text()
            .with_context(|| format!("Failed to read {}", label.to_lowercase())),
    }
}

async fn handle_create_admin(
    store: &PgStore,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> anyhow::Result<ExitCode> {
    let first_name = prompt("First name", first_name)?;
    let last_name = prompt("Last name", last_name)?;
    let email = prompt("Email address", email)?;
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()
            .context("Failed to read password")?,
    };

    let (profile, _) = create_admin(
        store,
        NewAdmin {
            first_name,
            last_name,
            email,
            password,
        },
    )
    .await?;

    println!("\n✅ Administrator created successfully!");
    println!("   Email: {}", profile.email);
    println!("   Name: {} {}", profile.first_name, profile.last_name);
    Ok(ExitCode::SUCCESS)
}
