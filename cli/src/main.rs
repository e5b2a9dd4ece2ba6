use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

use commands::{acl, auth, config, serve};

/// Portcullis CLI - inspect and exercise an authentication/authorization configuration
#[derive(Parser)]
#[command(name = "pctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        env = settings::CONFIG_ENV,
        default_value = "portcullis.yaml"
    )]
    config: PathBuf,

    /// Also write daily-rotated log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect the access control list built from the configuration
    Acl {
        #[command(subcommand)]
        action: AclAction,
    },

    /// Exercise the authentication stage
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Serve the configured routes behind the pipeline
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3030)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Parse, validate and build every component
    Validate {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the configuration as parsed
    Show {
        /// Output format (json, yaml)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },
}

#[derive(Subcommand)]
enum AclAction {
    /// List roles, resources and rules
    List {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Ask whether a role may perform a method on a resource
    Check {
        /// Role name ("guest" for anonymous requests)
        #[arg(short, long)]
        role: String,

        /// Resource, e.g. "Users\Controller::collection"
        #[arg(long)]
        resource: String,

        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Run authentication dispatch over a synthetic request
    Probe {
        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request URI, including any query string
        #[arg(short, long, default_value = "/")]
        uri: String,

        /// Matched controller
        #[arg(long)]
        controller: Option<String>,

        /// Matched action
        #[arg(long)]
        action: Option<String>,

        /// Route parameter as name=value (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,

        /// Request header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body
        #[arg(long)]
        body: Option<String>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Commands::Serve { .. }, false) => "info",
        _ => "warn",
    };
    let _guard = logging::init_logging(default_level, cli.log_dir.as_deref())?;

    // Execute the command
    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Validate { format } => {
                config::validate(&cli.config, &format)?;
            }
            ConfigAction::Show { format } => {
                config::show(&cli.config, &format)?;
            }
        },
        Commands::Acl { action } => match action {
            AclAction::List { format } => {
                acl::list(&cli.config, &format)?;
            }
            AclAction::Check {
                role,
                resource,
                method,
                format,
            } => {
                acl::check(&cli.config, &role, &resource, &method, &format)?;
            }
        },
        Commands::Auth { action } => match action {
            AuthAction::Probe {
                method,
                uri,
                controller,
                action,
                params,
                headers,
                body,
                format,
            } => {
                let probe = auth::Probe {
                    method,
                    uri,
                    controller,
                    action,
                    params,
                    headers,
                    body,
                };
                auth::probe(&cli.config, &probe, &format)?;
            }
        },
        Commands::Serve { port, host } => {
            serve::execute(&cli.config, host, port).await?;
        }
    }

    Ok(())
}
