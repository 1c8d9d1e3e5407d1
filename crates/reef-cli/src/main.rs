use clap::{Parser, Subcommand};
use reef_core::Environment;
use std::path::PathBuf;

mod commands;

use commands::CommandContext;

#[derive(Parser, Debug)]
#[command(name = "reef", version, about = "Environment lifecycle orchestration")]
struct Cli {
    /// Path to the project configuration file.
    #[arg(long, global = true, default_value = "reef.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current stack status for an environment.
    Status { environment: Environment },

    /// Create an environment: certificate, stack, database schema,
    /// secrets and migrations.
    Create {
        environment: Environment,

        /// Container image running the application.
        #[arg(long)]
        application_image: String,

        /// Container image running the web server.
        #[arg(long)]
        webserver_image: String,

        #[arg(long, default_value = "db.t3.small")]
        db_instance_class: String,

        /// Database storage in gigabytes.
        #[arg(long, default_value_t = 20)]
        db_storage: u32,

        #[arg(long, default_value = "8.0.35")]
        db_engine_version: String,

        #[arg(long, default_value = "cache.t3.micro")]
        cache_node_type: String,

        #[arg(long, default_value = "256")]
        task_cpu: String,

        #[arg(long, default_value = "512")]
        task_memory: String,
    },

    /// Update changeable settings on an existing environment.
    Update {
        environment: Environment,

        /// Resubmit the stack unchanged, re-rendering the template
        /// against the currently stored secrets.
        #[arg(long, default_value_t = false, conflicts_with_all = [
            "domain", "certificate_arn", "db_storage", "db_instance_class",
            "cache_node_type", "task_cpu", "task_memory", "disable",
        ])]
        refresh: bool,

        /// New fully qualified domain; the root domain and hosted zone
        /// are derived from it.
        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        certificate_arn: Option<String>,

        /// Database storage in gigabytes.
        #[arg(long)]
        db_storage: Option<u32>,

        #[arg(long)]
        db_instance_class: Option<String>,

        #[arg(long)]
        cache_node_type: Option<String>,

        #[arg(long)]
        task_cpu: Option<String>,

        #[arg(long)]
        task_memory: Option<String>,

        /// Scale the environment's workloads down to zero.
        #[arg(long, default_value_t = false)]
        disable: bool,
    },

    /// Delete an environment's stack and its stored secrets.
    Delete { environment: Environment },

    /// Wait for an environment's in-flight operation to reach a terminal
    /// status.
    Wait {
        environment: Environment,

        /// Terminal status to require; any other terminal status becomes
        /// an error.
        #[arg(long)]
        expect: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Status { environment } => {
            let ctx = CommandContext::load(&cli.config, environment)?;
            commands::status::run(&ctx).await?;
        }

        Command::Create {
            environment,
            application_image,
            webserver_image,
            db_instance_class,
            db_storage,
            db_engine_version,
            cache_node_type,
            task_cpu,
            task_memory,
        } => {
            let ctx = CommandContext::load(&cli.config, environment)?;
            commands::create::run(
                &ctx,
                commands::create::CreateArgs {
                    application_image,
                    webserver_image,
                    db_instance_class,
                    db_storage,
                    db_engine_version,
                    cache_node_type,
                    task_cpu,
                    task_memory,
                },
            )
            .await?;
        }

        Command::Update {
            environment,
            refresh: _,
            domain,
            certificate_arn,
            db_storage,
            db_instance_class,
            cache_node_type,
            task_cpu,
            task_memory,
            disable,
        } => {
            // --refresh is the empty change set; clap already rejects
            // combining it with any field flag.
            let ctx = CommandContext::load(&cli.config, environment)?;
            commands::update::run(
                &ctx,
                commands::update::UpdateArgs {
                    domain,
                    certificate_arn,
                    db_storage,
                    db_instance_class,
                    cache_node_type,
                    task_cpu,
                    task_memory,
                    disable,
                },
            )
            .await?;
        }

        Command::Delete { environment } => {
            let ctx = CommandContext::load(&cli.config, environment)?;
            commands::delete::run(&ctx).await?;
        }

        Command::Wait { environment, expect } => {
            let ctx = CommandContext::load(&cli.config, environment)?;
            commands::wait::run(&ctx, expect.as_deref()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_a_create_invocation() {
        let cli = Cli::parse_from([
            "reef",
            "create",
            "stage",
            "--application-image",
            "repo/app:abc",
            "--webserver-image",
            "repo/web:abc",
            "--db-storage",
            "40",
        ]);
        match cli.cmd {
            Command::Create {
                environment,
                db_storage,
                db_instance_class,
                ..
            } => {
                assert_eq!(environment, Environment::Stage);
                assert_eq!(db_storage, 40);
                assert_eq!(db_instance_class, "db.t3.small");
            }
            other => panic!("parsed {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_environments() {
        assert!(Cli::try_parse_from(["reef", "status", "qa"]).is_err());
    }

    #[test]
    fn refresh_excludes_field_changes() {
        assert!(Cli::try_parse_from(["reef", "update", "stage", "--refresh"]).is_ok());
        assert!(
            Cli::try_parse_from(["reef", "update", "stage", "--refresh", "--task-cpu", "512"])
                .is_err()
        );
    }
}
