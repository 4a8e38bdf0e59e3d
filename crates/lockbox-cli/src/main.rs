use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use lockbox_core::{Lockbox, StartupState, VaultError, VaultSession};
use std::io::{self, BufRead, Write};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lockbox")]
#[command(about = "Local encrypted secrets vault", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show storage locations and whether an app password is set
    Status,

    /// Set or replace the app password
    SetPassword,

    /// List entry keys
    List,

    /// Print the value stored under a key
    Get { key: String },

    /// Add a new entry
    Add { key: String },

    /// Change the value of an existing entry
    Update { key: String },

    /// Delete an entry
    Delete {
        key: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Copy the key and vault files to the backup location
    Sync,

    /// Delete the vault, key, backups and app password
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();
    let lockbox = Lockbox::open_default().context("load lockbox")?;
    let state = lockbox.startup().map_err(explain)?;
    debug!(?state, command = ?cli.command, "dispatching command");

    match cli.command {
        Commands::Status => status(&lockbox, state),
        Commands::SetPassword => set_password(&lockbox, state),
        Commands::Reset { yes } => reset(&lockbox, yes),
        Commands::Sync => {
            login(&lockbox, state)?;
            let report = lockbox.sync_backups().map_err(explain)?;
            println!(
                "Backups synced (key: {}, vault: {})",
                report.key_copied, report.vault_copied
            );
            Ok(())
        }
        command => {
            login(&lockbox, state)?;
            let mut session = VaultSession::open(&lockbox).map_err(explain)?;
            run_entry_command(&mut session, command)
        }
    }
}

fn run_entry_command(session: &mut VaultSession<'_>, command: Commands) -> Result<()> {
    match command {
        Commands::List => {
            for key in session.keys()? {
                println!("{key}");
            }
        }
        Commands::Get { key } => match session.get(&key)? {
            Some(value) => println!("{value}"),
            None => bail!("no entry named '{key}'"),
        },
        Commands::Add { key } => {
            let value = rpassword::prompt_password("Value: ")?;
            let repeat = rpassword::prompt_password("Repeat value: ")?;
            session.add(&key, &value, &repeat)?;
            println!("New info saved");
        }
        Commands::Update { key } => {
            let value = rpassword::prompt_password("New value: ")?;
            let repeat = rpassword::prompt_password("Repeat new value: ")?;
            session.update(&key, &value, &repeat)?;
            println!("Updated successfully");
        }
        Commands::Delete { key, yes } => {
            let confirmed = yes || confirm(&format!("Delete '{key}'?"))?;
            session.delete(&key, confirmed)?;
            println!("Deleted '{key}'");
        }
        _ => unreachable!("handled before the session is opened"),
    }
    Ok(())
}

fn status(lockbox: &Lockbox, state: StartupState) -> Result<()> {
    let paths = lockbox.paths();
    println!("Key file:     {}", paths.key_file().display());
    println!("Vault file:   {}", paths.vault_file().display());
    println!("Backup dir:   {}", paths.backup_dir.display());
    println!(
        "App password: {}",
        match state {
            StartupState::Locked => "set",
            StartupState::NeedsPassword => "not set",
        }
    );
    Ok(())
}

fn set_password(lockbox: &Lockbox, state: StartupState) -> Result<()> {
    if state == StartupState::Locked {
        login(lockbox, state)?;
    }
    let password = rpassword::prompt_password("New app password: ")?;
    let confirm = rpassword::prompt_password("Repeat app password: ")?;
    lockbox.gate().validate_new_password(&password, &confirm)?;
    if !lockbox.set_app_password(&password)? {
        bail!("app password was not changed");
    }
    println!("App password set");
    Ok(())
}

fn reset(lockbox: &Lockbox, yes: bool) -> Result<()> {
    if !yes && !confirm("Delete every stored secret and the app password?")? {
        println!("Aborted");
        return Ok(());
    }
    lockbox.reset_all()?;
    println!("Lockbox reset");
    Ok(())
}

fn login(lockbox: &Lockbox, state: StartupState) -> Result<()> {
    if state == StartupState::NeedsPassword {
        bail!("no app password set; run `lockbox set-password` first");
    }
    let password = rpassword::prompt_password("App password: ")?;
    if !lockbox.verify_app_password(&password)? {
        bail!("incorrect app password");
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn explain(err: VaultError) -> anyhow::Error {
    match err {
        VaultError::DecryptionFailed => anyhow!(
            "the master key cannot be decrypted on this machine. The key file was \
             written on a different device (or the hardware identity changed), so \
             the vault cannot be opened here. This is not a wrong app password."
        ),
        other => other.into(),
    }
}
