// ABOUTME: CLI commands that drive a full session through the security facade
// ABOUTME: Sign-in or registration against the simulated backend, plus the security event log

use anyhow::{Context, Result};
use campus_cli::{events_table, mask_header_value};
use campus_config::SecurityConfig;
use campus_session::SecurityFacade;
use clap::Subcommand;
use colored::*;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Walk through sign-in, secure headers, token refresh, and logout
    Demo {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Register a new account instead of signing in
        #[arg(long)]
        register: bool,
        /// Display name used with --register
        #[arg(long, default_value = "Campus Student")]
        name: String,
    },
    /// Show the most recent persisted security events
    Events {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

impl SessionCommands {
    pub async fn execute(&self) -> Result<()> {
        let config = SecurityConfig::from_env().context("Invalid security configuration")?;

        match self {
            SessionCommands::Demo {
                email,
                password,
                register,
                name,
            } => demo_command(config, email, password, *register, name).await,
            SessionCommands::Events { limit } => events_command(config, *limit),
        }
    }
}

async fn demo_command(
    config: SecurityConfig,
    email: &str,
    password: &str,
    register: bool,
    name: &str,
) -> Result<()> {
    let facade = SecurityFacade::with_defaults(config)
        .context("Failed to open security storage")?;
    facade.initialize_application_security();

    let user = if register {
        println!("{}", "Registering...".bold().cyan());
        facade.register(name, email, password).await?
    } else {
        println!("{}", "Signing in...".bold().cyan());
        facade.sign_in(email, password).await?
    };

    println!(
        "{} Signed in as {} <{}> ({})",
        "✓".green().bold(),
        user.name.bold(),
        user.email,
        user.id
    );
    println!();

    print_headers(&facade);

    println!("{}", "Refreshing tokens...".bold().cyan());
    if facade.refresh_session().await {
        println!("{} Tokens refreshed", "✓".green().bold());
        print_headers(&facade);
    } else {
        println!("{} Refresh failed; session ended", "✗".red().bold());
    }

    facade.logout();
    println!("{} Logged out", "✓".green().bold());

    Ok(())
}

fn print_headers(facade: &SecurityFacade) {
    // Sorted for stable output
    let headers: BTreeMap<String, String> = facade.get_secure_headers().into_iter().collect();

    println!("{}", "Secure request headers:".bold());
    for (name, value) in headers {
        println!("  {}: {}", name, mask_header_value(&value));
    }
    println!();
}

fn events_command(config: SecurityConfig, limit: usize) -> Result<()> {
    let facade = SecurityFacade::with_defaults(config)
        .context("Failed to open security storage")?;
    let events = facade.recent_events(limit);
    debug!(count = events.len(), limit, "Loaded persisted security events");

    if events.is_empty() {
        println!("{}", "No security events recorded.".yellow());
        return Ok(());
    }

    println!("{}", events_table(&events));
    Ok(())
}
