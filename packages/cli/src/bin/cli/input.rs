// ABOUTME: CLI commands for sanitizing and validating untrusted input
// ABOUTME: Runs the same sanitizer and validators the UI layer uses

use anyhow::Result;
use campus_cli::{validation_report, ValidationKind};
use campus_config::SecurityConfig;
use campus_security::{scan_threats, Sanitizer, Validator};
use clap::Subcommand;
use colored::*;

#[derive(Subcommand)]
pub enum InputCommands {
    /// Sanitize a string and report any injection patterns it contained
    Sanitize {
        /// Untrusted input
        input: String,
    },
    /// Validate a value as an email, password, URL, name, or free text
    Validate {
        #[arg(value_enum)]
        kind: ValidationKind,
        value: String,
    },
}

impl InputCommands {
    pub fn execute(&self) -> Result<()> {
        let config = SecurityConfig::from_env()?;

        match self {
            InputCommands::Sanitize { input } => sanitize_command(&config, input),
            InputCommands::Validate { kind, value } => validate_command(&config, *kind, value),
        }
    }
}

fn sanitize_command(config: &SecurityConfig, input: &str) -> Result<()> {
    let outcome = Sanitizer::new(config.max_input_length).sanitize(input);

    println!("{}", outcome.value);

    if let Some(error) = &outcome.error {
        eprintln!("{} {}", "⚠".yellow().bold(), error);
    }

    let threats = scan_threats(input);
    if !threats.is_empty() {
        eprintln!("{}", "Threats found in input:".yellow().bold());
        for threat in threats {
            eprintln!("  • {}", threat.message());
        }
    }

    Ok(())
}

fn validate_command(config: &SecurityConfig, kind: ValidationKind, value: &str) -> Result<()> {
    let validator = Validator::new(config.max_input_length);
    let result = kind.validate(&validator, value);

    let report = validation_report(kind, &result);
    if result.is_valid {
        println!("{} {}", "✓".green().bold(), report);
        Ok(())
    } else {
        println!("{} {}", "✗".red().bold(), report);
        anyhow::bail!("validation failed")
    }
}
