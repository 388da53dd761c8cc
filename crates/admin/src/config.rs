//! Command-line configuration for `acl-admin`.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ACL_DATABASE_URL` | acl-directory.db | SQLite database path, or `:memory:` |
//! | `ACL_LOG_LEVEL` | info | Log level |
//! | `ACL_SEED_FILE` | (built-in set) | JSON seed data applied at startup |
//! | `ACL_SKIP_SEED` | false | Skip startup seeding |
//! | `ACL_CONCURRENCY` | last_writer_wins | Ruleset write mode |
//! | `ACL_RECONCILE_FAILURES` | propagate | Handling of failed user updates |

use std::path::PathBuf;

use acl_directory::{ConcurrencyMode, DirectoryConfig, ReconcileFailurePolicy};
use clap::{Parser, Subcommand};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Operator configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "acl-admin")]
#[command(about = "Tenant access-control directory administration")]
pub struct AdminConfig {
    /// SQLite database path.
    #[arg(long, env = "ACL_DATABASE_URL", default_value = "acl-directory.db")]
    pub database_url: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "ACL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// JSON file with the tenants and rulesets to seed at startup.
    #[arg(long, env = "ACL_SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// Do not run startup seeding.
    #[arg(long, env = "ACL_SKIP_SEED")]
    pub skip_seed: bool,

    /// Ruleset write mode (last_writer_wins, optimistic).
    #[arg(long, env = "ACL_CONCURRENCY", default_value = "last_writer_wins")]
    pub concurrency: ConcurrencyMode,

    /// Handling of failed user directory updates (propagate, defer).
    #[arg(long, env = "ACL_RECONCILE_FAILURES", default_value = "propagate")]
    pub reconcile_failures: ReconcileFailurePolicy,

    #[command(subcommand)]
    pub command: Command,
}

/// Administrative commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List tenant identity records.
    ListTenants,
    /// Print a tenant's identity record and ruleset document.
    ShowTenant {
        /// Tenant identifier.
        tenant_id: String,
    },
    /// Apply seed data and print what was written.
    Seed,
    /// Re-derive user tenant lists from group membership.
    Repair {
        /// Report differences without writing them.
        #[arg(long)]
        dry_run: bool,
    },
}

impl AdminConfig {
    /// Builds the library configuration.
    pub fn directory_config(&self) -> DirectoryConfig {
        DirectoryConfig::default()
            .with_concurrency(self.concurrency)
            .with_reconcile_failures(self.reconcile_failures)
    }

    /// Validates the configuration, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database_url.trim().is_empty() {
            errors.push("Database URL cannot be empty".to_string());
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Log level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            ));
        }

        if let Some(path) = &self.seed_file
            && !path.is_file()
        {
            errors.push(format!("Seed file not found: {}", path.display()));
        }

        if let Err(directory_errors) = self.directory_config().validate() {
            errors.extend(directory_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdminConfig::parse_from(["acl-admin", "list-tenants"]);
        assert_eq!(config.database_url, "acl-directory.db");
        assert_eq!(config.concurrency, ConcurrencyMode::LastWriterWins);
        assert!(matches!(config.command, Command::ListTenants));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parses_modes_and_subcommand_flags() {
        let config = AdminConfig::parse_from([
            "acl-admin",
            "--concurrency",
            "optimistic",
            "--reconcile-failures",
            "defer",
            "repair",
            "--dry-run",
        ]);
        assert_eq!(config.concurrency, ConcurrencyMode::Optimistic);
        assert_eq!(config.reconcile_failures, ReconcileFailurePolicy::Defer);
        assert!(matches!(config.command, Command::Repair { dry_run: true }));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = AdminConfig::parse_from(["acl-admin", "seed"]);
        config.database_url = " ".to_string();
        config.log_level = "loud".to_string();
        config.seed_file = Some(PathBuf::from("/nonexistent/seed.json"));
        assert_eq!(config.validate().unwrap_err().len(), 3);
    }
}
