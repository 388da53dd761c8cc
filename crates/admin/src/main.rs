//! Access-control directory administration.
//!
//! Opens the SQLite-backed directory, applies startup seeding and runs one
//! operator command.

mod config;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use acl_directory::Directory;
use acl_directory::seed::SeedData;
use acl_directory::tenant::TenantId;

use config::{AdminConfig, Command};

#[cfg(feature = "sqlite")]
use acl_directory::backends::sqlite::SqliteBackend;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise both crates log at `level`.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("acl_directory={level},acl_admin={level}")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Opens the database and builds a directory over it.
#[cfg(feature = "sqlite")]
fn open_directory(config: &AdminConfig) -> anyhow::Result<Directory> {
    use std::sync::Arc;

    info!(database = %config.database_url, "Initializing SQLite backend");
    let backend = SqliteBackend::open(&config.database_url)
        .with_context(|| format!("opening {}", config.database_url))?;
    backend.init_schema()?;

    let backend = Arc::new(backend);
    Ok(Directory::new(
        backend.clone(),
        backend,
        config.directory_config(),
    ))
}

/// Fallback when sqlite feature is not enabled.
#[cfg(not(feature = "sqlite"))]
fn open_directory(_config: &AdminConfig) -> anyhow::Result<Directory> {
    anyhow::bail!(
        "acl-admin requires the 'sqlite' feature. \
         Build with: cargo build -p acl-admin --features sqlite"
    )
}

fn load_seed_data(config: &AdminConfig) -> anyhow::Result<SeedData> {
    match &config.seed_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading seed file {}", path.display()))?;
            SeedData::from_json(&text).with_context(|| format!("parsing seed file {}", path.display()))
        }
        None => Ok(SeedData::builtin()),
    }
}

async fn run(directory: &Directory, command: Command, seed: &SeedData) -> anyhow::Result<()> {
    match command {
        Command::ListTenants => {
            let tenants = directory.tenants().list().await?;
            println!("{}", serde_json::to_string_pretty(&tenants)?);
        }
        Command::ShowTenant { tenant_id } => {
            let tenant_id = TenantId::parse(&tenant_id)?;
            let tenants = directory.tenants();
            let tenant = tenants.get(&tenant_id).await?;
            let rulesets = tenants.get_rulesets(&tenant_id).await?;
            let output = serde_json::json!({ "tenant": tenant, "rulesets": rulesets });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Seed => {
            let report = directory.seed(seed).await?;
            println!(
                "tenants created: {}, skipped: {}; rulesets created: {}, skipped: {}; users granted: {}",
                report.tenants_created.len(),
                report.tenants_skipped.len(),
                report.rulesets_created.len(),
                report.rulesets_skipped.len(),
                report.reconcile.added.len(),
            );
        }
        Command::Repair { dry_run } => {
            let report = directory.repair().run(dry_run).await?;
            for repair in &report.repairs {
                println!(
                    "{}: add {:?}, remove {:?}",
                    repair.email, repair.added, repair.removed
                );
            }
            for tenant_id in &report.corrupted {
                println!("corrupted ruleset document: {tenant_id}");
            }
            println!(
                "{} tenant(s), {} user(s) checked, {} repair(s) {}",
                report.tenants_scanned,
                report.users_checked,
                report.repairs.len(),
                if report.applied { "applied" } else { "proposed" },
            );
            if !report.failed.is_empty() {
                anyhow::bail!("{} user record(s) could not be repaired", report.failed.len());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AdminConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        database = %config.database_url,
        concurrency = %config.concurrency,
        reconcile_failures = %config.reconcile_failures,
        "Starting acl-admin"
    );

    let directory = open_directory(&config)?;
    let seed = load_seed_data(&config)?;

    let seeding_command = matches!(config.command, Command::Seed);
    if config.skip_seed {
        warn!("Startup seeding skipped");
    } else if !seeding_command {
        let report = directory.seed(&seed).await?;
        if !report.is_noop() {
            info!(
                tenants = report.tenants_created.len(),
                rulesets = report.rulesets_created.len(),
                "Applied startup seed data"
            );
        }
    }

    run(&directory, config.command, &seed).await
}
