//! CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;
use sessiongate_client::messages::{login_error_message, registration_error_messages};
use sessiongate_client::storage::FileStorage;
use sessiongate_client::{AuthClient, LoginCredentials, RegistrationProfile};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{self, Settings};

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "SESSIONGATE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Configuration file (defaults to <data-dir>/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create an account. Sign in afterwards with `login`.
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "SESSIONGATE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Repeat the password; defaults to --password
        #[arg(long)]
        password_confirmation: Option<String>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Clear the stored session
    Logout {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the stored session
    Status {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// GET an API path with the stored session and print the JSON response
    Get {
        /// Path relative to the base URL, e.g. /plans/
        path: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Configuration file operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a default configuration file
    Init {
        /// Output file path (defaults to <data-dir>/config.toml)
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    pub async fn execute(self, data_dir: PathBuf) -> Result<()> {
        match self {
            Self::Login {
                username,
                password,
                config,
            } => {
                let client = open_client(&data_dir, config.as_deref())?;
                login(&client, username, password).await
            }
            Self::Register {
                username,
                email,
                password,
                password_confirmation,
                config,
            } => {
                let client = open_client(&data_dir, config.as_deref())?;
                let profile = RegistrationProfile {
                    username,
                    email,
                    password_confirmation: password_confirmation.unwrap_or_else(|| password.clone()),
                    password,
                };
                register(&client, &profile).await
            }
            Self::Logout { config } => {
                let client = open_client(&data_dir, config.as_deref())?;
                client.logout();
                println!("Logged out");
                Ok(())
            }
            Self::Status { config } => {
                let client = open_client(&data_dir, config.as_deref())?;
                print_status(&client);
                Ok(())
            }
            Self::Get { path, config } => {
                let client = open_client(&data_dir, config.as_deref())?;
                let body: serde_json::Value = client
                    .get(&path)
                    .await
                    .with_context(|| format!("GET {path} failed"))?;
                println!("{}", serde_json::to_string_pretty(&body)?);
                Ok(())
            }
            Self::Config { command } => command.execute(data_dir),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, data_dir: PathBuf) -> Result<()> {
        match self {
            Self::Init { output } => {
                let config_path = output.unwrap_or_else(|| data_dir.join(config::CONFIG_FILE));

                // Create parent directory if it doesn't exist
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                config::generate_default_config(&config_path)?;
                println!("Generated configuration at: {}", config_path.display());
                Ok(())
            }
            Self::Show { config } => {
                let settings = Settings::load(&data_dir, config.as_deref())?;
                println!("{}", toml::to_string_pretty(&settings)?);
                Ok(())
            }
        }
    }
}

/// Build a client over the file-backed session in `data_dir` and restore it
fn open_client(data_dir: &Path, config_file: Option<&Path>) -> Result<AuthClient> {
    let settings = Settings::load(data_dir, config_file)?;
    let storage = FileStorage::in_dir(data_dir, &settings.api.storage_key);
    debug!(path = %storage.path().display(), "Using session file");

    let client = AuthClient::builder()
        .config(settings.api)
        .storage(storage)
        .build()?;
    client.restore_from_persistence();
    Ok(client)
}

async fn login(client: &AuthClient, username: String, password: String) -> Result<()> {
    let credentials = LoginCredentials { username, password };
    match client.login(&credentials).await {
        Ok(()) => {
            let user = client.session().user();
            let name = user
                .as_ref()
                .map_or(credentials.username.as_str(), |u| u.display_name());
            println!("Signed in as {name}");
            Ok(())
        }
        Err(e) => {
            info!(error = %e, "Login rejected");
            anyhow::bail!(login_error_message(&e))
        }
    }
}

async fn register(client: &AuthClient, profile: &RegistrationProfile) -> Result<()> {
    match client.register(profile).await {
        Ok(()) => {
            println!("Registration successful. Please log in.");
            Ok(())
        }
        Err(e) => {
            info!(error = %e, "Registration rejected");
            let messages = registration_error_messages(&e);
            for (field, message) in &messages {
                eprintln!("{field}: {message}");
            }
            anyhow::bail!("Registration failed")
        }
    }
}

fn print_status(client: &AuthClient) {
    let session = client.session();
    if !session.is_authenticated() {
        println!("Not signed in");
        if session.refresh_token().is_some() {
            println!("A refresh token is stored; the next API call will try to renew it");
        }
        return;
    }

    match session.user() {
        Some(user) => println!("Signed in as {}", user.display_name()),
        None => println!("Signed in"),
    }
    println!("API: {}", client.base_url());
}
