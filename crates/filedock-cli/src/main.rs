mod render;
mod shell;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filedock_core::{
    open_store, ApiClient, ClientConfig, Controller, MemoryStore, SessionStore, SessionStoreKind,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliController = Controller<ApiClient, Box<dyn SessionStore>>;

#[derive(Parser, Debug)]
#[command(name = "filedock", author, version, about = "Client for the filedock storage API", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory holding the persisted session
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Keep the session in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account and start a session
    Register(CredentialArgs),
    /// Start a session with an existing account
    Login(CredentialArgs),
    /// End the session and forget the stored token
    Logout,
    /// Show session state
    Status,
    /// Upload a file
    Upload { path: Option<PathBuf> },
    /// Download a file by hash
    Download {
        hash: Option<String>,
        /// Write the payload here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a file by hash
    Delete { hash: Option<String> },
    /// Replace the content behind a hash with a new file
    Update {
        hash: Option<String>,
        path: Option<PathBuf>,
    },
    /// Search file names
    Search { query: Option<String> },
    /// List your files
    List,
    /// Interactive session
    Shell,
}

#[derive(clap::Args, Debug)]
struct CredentialArgs {
    #[arg(short, long, default_value = "")]
    username: String,
    /// Prompted for on a terminal when omitted
    #[arg(short, long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    debug!(api = %config.api_base_url, store = ?config.session_store, "configuration loaded");

    let store: Box<dyn SessionStore> = if cli.ephemeral {
        Box::new(MemoryStore::default())
    } else {
        open_store(&config)?
    };
    let api = ApiClient::new(&config)?;
    let ctl = Controller::new(api, store);

    run_command(&cli, &config, &ctl).await
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::layered(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if cli.ephemeral {
        config.session_store = SessionStoreKind::Memory;
    }
    config.validate()?;
    Ok(config)
}

async fn run_command(cli: &Cli, config: &ClientConfig, ctl: &CliController) -> Result<()> {
    match &cli.command {
        Commands::Register(args) | Commands::Login(args) => {
            ctl.set_user_id(args.username.clone());
            ctl.set_password(read_password(args)?);
            if matches!(cli.command, Commands::Register(_)) {
                ctl.register().await?;
            } else {
                ctl.login().await?;
            }
            println!("Welcome, {}!", ctl.state().user_id);
        }
        Commands::Logout => {
            ctl.logout()?;
            println!("Logged out.");
        }
        Commands::Status => {
            let state = ctl.state();
            if cli.json {
                let status = serde_json::json!({
                    "logged_in": state.is_logged_in,
                    "api_base_url": config.api_base_url,
                    "session_store": config.session_store,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else if state.is_logged_in {
                println!("Logged in to {}.", config.api_base_url);
            } else {
                println!("Not logged in ({}).", config.api_base_url);
            }
        }
        Commands::Upload { path } => {
            if let Some(path) = path {
                ctl.select_file(path).await?;
            }
            let uploaded = ctl.upload().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&uploaded)?);
            } else {
                println!("Uploaded {}: {}", uploaded.file_name, uploaded.file_hash);
            }
        }
        Commands::Download { hash, output } => {
            ctl.set_file_hash(hash.clone().unwrap_or_default());
            let file = ctl.download().await?;
            match output {
                Some(path) => {
                    tokio::fs::write(path, file.data.as_bytes())
                        .await
                        .with_context(|| format!("write {}", path.display()))?;
                    println!("Saved {} to {}", file.file_hash, path.display());
                }
                None if cli.json => println!("{}", serde_json::to_string_pretty(&file)?),
                None => println!("Downloaded: {}", file.data),
            }
        }
        Commands::Delete { hash } => {
            ctl.set_file_hash(hash.clone().unwrap_or_default());
            let files = ctl.delete().await?;
            println!("Deleted.");
            print_entries(cli, &files)?;
        }
        Commands::Update { hash, path } => {
            ctl.set_file_hash(hash.clone().unwrap_or_default());
            if let Some(path) = path {
                ctl.select_file(path).await?;
            }
            let files = ctl.update().await?;
            println!("Updated.");
            print_entries(cli, &files)?;
        }
        Commands::Search { query } => {
            ctl.set_search_query(query.clone().unwrap_or_default());
            let results = ctl.search().await?;
            print_entries(cli, &results)?;
        }
        Commands::List => {
            let files = ctl.list().await?;
            print_entries(cli, &files)?;
        }
        Commands::Shell => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            shell::run(ctl, stdin, tokio::io::stdout()).await?;
        }
    }
    Ok(())
}

fn read_password(args: &CredentialArgs) -> Result<String> {
    match &args.password {
        Some(password) => Ok(password.clone()),
        None if std::io::stdin().is_terminal() => {
            rpassword::prompt_password("Password: ").context("read password")
        }
        None => Ok(String::new()),
    }
}

fn print_entries(cli: &Cli, entries: &[filedock_core::FileEntry]) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else {
        print!("{}", render::entries(entries));
    }
    Ok(())
}
