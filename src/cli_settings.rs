//! Admin command line tool for the settings collection.
//!
//! Works against the same storage the server would pick for the given
//! `--db-path` / `--data-dir`, including the fallback to JSON files.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use media_catalog_server::catalog::{fingerprint, SettingsRepository, MASTER_PASSWORD_KEY};
use media_catalog_server::{resolve_backend, StorageSettings};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite database file.
    #[clap(long, env = "DB_PATH", value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Directory of the JSON collection files.
    #[clap(long, default_value = "data", value_parser = parse_path)]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints the value of a setting.
    Get { key: String },

    /// Stores a raw value for a setting, replacing any previous one.
    Set { key: String, value: String },

    /// Stores the fingerprint of the admin password.
    SetPassword { password: String },

    /// Verifies a password against the stored fingerprint without changing
    /// anything.
    CheckPassword { password: String },

    /// Shows which storage backend is in use and where it keeps its data.
    Where,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let resolved = resolve_backend(&StorageSettings {
        db_path: cli_args.db_path.clone(),
        data_dir: cli_args.data_dir.clone(),
        read_pool_size: 1,
        seed: false,
    });
    let settings = SettingsRepository::new(resolved.backend.clone());

    match cli_args.command {
        Command::Get { key } => match settings.get(&key)? {
            Some(value) => println!("{}", value),
            None => bail!("Setting {} is not set", key),
        },
        Command::Set { key, value } => {
            settings
                .put(&key, &value)
                .with_context(|| format!("Failed to store {}", key))?;
            println!("Stored {}", key);
        }
        Command::SetPassword { password } => {
            if password.is_empty() {
                bail!("The password cannot be empty");
            }
            settings.put(MASTER_PASSWORD_KEY, &fingerprint(&password))?;
            println!("Password updated");
        }
        Command::CheckPassword { password } => {
            if settings.verify(MASTER_PASSWORD_KEY, &password)? {
                println!("Password matches");
            } else {
                bail!("Password does not match");
            }
        }
        Command::Where => {
            println!(
                "{} backend at {}",
                resolved.mode,
                resolved.backend.location()
            );
        }
    }

    Ok(())
}
