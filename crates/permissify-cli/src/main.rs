use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use permissify::core::ContentTypeKey;
use permissify::store::SqliteStore;
use permissify::{Permissify, PermissifyConfig, ProvisionedRole};

#[derive(Parser, Debug)]
#[command(name = "permissify")]
#[command(about = "Provision roles and models in a Permissify database")]
#[command(version)]
struct Cli {
    /// SQLite database to operate on
    #[arg(long, env = "PERMISSIFY_DATABASE", default_value = "permissify.db")]
    database: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a role if needed and replace its permission set
    AddRole {
        name: String,
        /// Permissions as `codename,app_label,model`
        #[arg(long, num_args = 1..)]
        permissions: Vec<String>,
    },
    /// Delete a role, its grants and its memberships
    RemoveRole { name: String },
    /// Register a model's content type and default permissions
    RegisterModel {
        app_label: String,
        model: String,
        /// Extra codenames beyond the default actions
        #[arg(long = "codename")]
        codenames: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(database = %cli.database.display(), "opening database");

    let store = SqliteStore::open(&cli.database)
        .with_context(|| format!("opening {}", cli.database.display()))?;
    let permissify = Permissify::new(store, PermissifyConfig::default());
    permissify
        .install_default_catalog()
        .await
        .context("installing default catalog")?;

    match cli.command {
        Command::AddRole { name, permissions } => {
            let provisioned = permissify
                .add_role(&name, permissions.as_slice())
                .await
                .with_context(|| format!("provisioning role {name}"))?;
            print_role(&provisioned, cli.json)?;
        }
        Command::RemoveRole { name } => {
            let removed = permissify
                .remove_role(&name)
                .await
                .with_context(|| format!("removing role {name}"))?;
            if cli.json {
                println!("{}", serde_json::json!({ "role": name, "removed": removed }));
            } else if removed {
                println!("Removed role {name}");
            } else {
                println!("No role named {name}");
            }
        }
        Command::RegisterModel {
            app_label,
            model,
            codenames,
        } => {
            let content_type = ContentTypeKey::new(app_label, model);
            let custom: Vec<&str> = codenames.iter().map(String::as_str).collect();
            let registered = permissify
                .register_model(&content_type, &custom)
                .await
                .with_context(|| format!("registering {content_type}"))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&registered)?);
            } else {
                for permission in &registered {
                    println!("{}", permission.full_name());
                }
            }
        }
    }

    Ok(())
}

fn print_role(provisioned: &ProvisionedRole, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(provisioned)?);
        return Ok(());
    }

    let verb = if provisioned.created { "Created" } else { "Updated" };
    println!(
        "{verb} role {} with {} permission(s)",
        provisioned.role.name,
        provisioned.permissions.len()
    );
    for permission in &provisioned.permissions {
        println!("  {}", permission.full_name());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_role() {
        let cli = Cli::try_parse_from([
            "permissify",
            "--database",
            "roles.db",
            "add-role",
            "editor",
            "--permissions",
            "change_group,auth,group",
            "view_group,auth,group",
        ])
        .unwrap();

        assert_eq!(cli.database, PathBuf::from("roles.db"));
        match cli.command {
            Command::AddRole { name, permissions } => {
                assert_eq!(name, "editor");
                assert_eq!(permissions, vec!["change_group,auth,group", "view_group,auth,group"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_remove_role_json() {
        let cli = Cli::try_parse_from(["permissify", "remove-role", "editor", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::RemoveRole { ref name } if name == "editor"));
    }

    #[test]
    fn test_parse_register_model() {
        let cli = Cli::try_parse_from([
            "permissify",
            "register-model",
            "blog",
            "post",
            "--codename",
            "publish_post",
        ])
        .unwrap();
        match cli.command {
            Command::RegisterModel {
                app_label,
                model,
                codenames,
            } => {
                assert_eq!((app_label.as_str(), model.as_str()), ("blog", "post"));
                assert_eq!(codenames, vec!["publish_post"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
