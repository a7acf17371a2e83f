//! Stockroom CLI - command-line client for the warehouse backend
//!
//! Signs in, checks route access the way the web client's guards do, and
//! makes authenticated reads. The session is kept in the durable store so it
//! survives between invocations.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stockroom_auth::{AuthContext, AuthError, FileStore, GuardOutcome, SessionBus};
use stockroom_core::{init_logging, LoggingConfig, StockroomConfig, StockroomError};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(about = "Command-line client for the Stockroom warehouse backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Sign out and forget the session
    Logout,

    /// Show the signed-in user
    Whoami {
        /// Also load and list the user's permission keys
        #[arg(long)]
        permissions: bool,
    },

    /// Check whether the signed-in user may open a route
    Check {
        /// Permission keys; any one of them grants access
        keys: Vec<String>,

        /// Route being opened
        #[arg(long, default_value = "/")]
        path: String,
    },

    /// Authenticated GET against the backend, printed as JSON
    Get {
        /// Path relative to the API base URL
        path: String,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(StockroomConfig::default_path);
    let config = StockroomConfig::load_or_default(&config_path)?;

    let logging = if cli.verbose {
        LoggingConfig {
            file: config.logging.file.clone(),
            ..LoggingConfig::verbose()
        }
    } else {
        config.logging.clone()
    };
    init_logging(&logging).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting Stockroom CLI v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration path {}", config_path.display());

    match cli.command {
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(&config, &config_path, show, init, validate),
        Commands::Login { email, password } => {
            handle_login(&build_context(&config)?, &email, &password).await
        }
        Commands::Logout => handle_logout(&build_context(&config)?),
        Commands::Whoami { permissions } => {
            handle_whoami(&build_context(&config)?, permissions).await
        }
        Commands::Check { keys, path } => {
            handle_check(&build_context(&config)?, &keys, &path).await
        }
        Commands::Get { path } => handle_get(&build_context(&config)?, &path).await,
    }
}

fn build_context(config: &StockroomConfig) -> anyhow::Result<AuthContext> {
    config.validate().inspect_err(StockroomError::log)?;

    let durable_path = config.storage.durable_path();
    debug!("Session store {}", durable_path.display());
    let durable = FileStore::open(&durable_path);

    AuthContext::from_config(config, Arc::new(durable), SessionBus::new()).map_err(explain)
}

/// Log an auth failure and attach the user-facing message
fn explain(e: AuthError) -> anyhow::Error {
    if let AuthError::Core(core) = &e {
        core.log();
        for suggestion in core.suggestions() {
            eprintln!("hint: {}", suggestion);
        }
    }
    if e.is_transient() {
        eprintln!("hint: this may be temporary; run the command again");
    }

    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

async fn handle_login(ctx: &AuthContext, email: &str, password: &str) -> anyhow::Result<()> {
    let session = ctx.login(email, password, true).await.map_err(explain)?;

    println!("Signed in as {}", session.user.display_string());
    if ctx.policy().is_admin(&session.user) {
        println!("Administrator: every permission check passes");
    }
    Ok(())
}

fn handle_logout(ctx: &AuthContext) -> anyhow::Result<()> {
    if !ctx.state().is_authenticated() {
        println!("Not signed in");
        return Ok(());
    }

    ctx.logout().map_err(explain)?;
    println!("Signed out");
    Ok(())
}

async fn handle_whoami(ctx: &AuthContext, show_permissions: bool) -> anyhow::Result<()> {
    let Some(session) = ctx.session() else {
        println!("Not signed in");
        return Ok(());
    };

    println!("User:      {}", session.user.display_string());
    if let Some(role_id) = session.user.effective_role_id() {
        println!("Role id:   {}", role_id);
    }
    println!("Signed in: {}", session.ts.to_rfc3339());

    if !show_permissions {
        return Ok(());
    }

    if ctx.policy().is_admin(&session.user) {
        println!("Permissions: all (administrator)");
        return Ok(());
    }

    ctx.refresh().await.map_err(explain)?;
    let state = ctx.permission_state();
    let mut keys: Vec<&String> = state.keys().into_iter().flatten().collect();
    keys.sort();

    if keys.is_empty() {
        println!("Permissions: none");
    } else {
        println!("Permissions:");
        for key in keys {
            println!("  {}", key);
        }
    }
    Ok(())
}

async fn handle_check(ctx: &AuthContext, keys: &[String], path: &str) -> anyhow::Result<()> {
    match ctx.auth_guard().resolve(path).await {
        GuardOutcome::Render => {}
        GuardOutcome::Redirect { to, .. } => bail!("{} requires sign-in (redirect to {})", path, to),
        GuardOutcome::Pending => bail!("Permissions for {} could not be resolved", path),
    }

    match ctx.permission_guard(keys.iter().cloned()).evaluate() {
        GuardOutcome::Render => {
            println!("Allowed: {}", path);
            Ok(())
        }
        GuardOutcome::Redirect { to, .. } => {
            bail!("Denied: {} (redirect to {})", path, to)
        }
        GuardOutcome::Pending => {
            bail!("Permissions could not be loaded; access to {} stays closed", path)
        }
    }
}

async fn handle_get(ctx: &AuthContext, path: &str) -> anyhow::Result<()> {
    let body = ctx.authorized_get(path).await.map_err(explain)?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn handle_config(
    config: &StockroomConfig,
    config_path: &Path,
    show: bool,
    init: bool,
    validate: bool,
) -> anyhow::Result<()> {
    if init {
        if config_path.exists() {
            bail!(
                "Configuration already exists at {}; remove it first to start over",
                config_path.display()
            );
        }
        StockroomConfig::default().save_to_file(config_path)?;
        println!("Configuration initialized at: {}", config_path.display());
    }

    if show {
        println!("# {}", config_path.display());
        println!("{}", toml::to_string_pretty(config)?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                println!("Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    if !(show || init || validate) {
        println!("Nothing to do; pass --show, --init or --validate");
    }

    Ok(())
}
