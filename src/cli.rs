//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;

use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{error, info};
use uuid::Uuid;

use crate::ServerConfig;
use crate::db::{Database, NewUser};
use crate::password::hash_password;
use crate::store::{MemoryTokenStore, TokenStore};
use crate::validation::validate_username;

const MIN_JWT_SECRET_LENGTH: usize = 32;

const TEMPORARY_PASSWORD_LENGTH: usize = 16;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// Refresh token records in the SQLite database (survive restarts)
    #[default]
    Sqlite,
    /// Refresh token records in process memory (lost on restart)
    Memory,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rallypoint",
    about = "Group activity backend with cookie sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "RALLYPOINT_PORT", default_value = "3001")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "RALLYPOINT_DATABASE", default_value = "rallypoint.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Set the Secure flag on session cookies (enable when served over HTTPS)
    #[arg(long, env = "RALLYPOINT_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Where refresh token records are kept
    #[arg(long, value_enum, default_value = "sqlite")]
    pub token_store: TokenStoreKind,

    /// Read the client IP from this header (e.g. X-Forwarded-For) instead of the socket address
    #[arg(long)]
    pub ip_header: Option<String>,

    /// Create an admin user with this username and print a temporary password
    #[arg(long, value_name = "USERNAME")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

fn generate_temporary_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Handle the --create-admin flag: create an admin that must change the
/// printed temporary password on first login.
pub async fn handle_create_admin(db: &Database, username: &str) {
    if let Err(msg) = validate_username(username) {
        error!(username = %username, "Invalid admin username: {}", msg);
        std::process::exit(1);
    }

    match db.users().get_by_username(username).await {
        Ok(Some(existing)) => {
            println!();
            println!("User already exists: {}", existing.username);
            println!();
        }
        Ok(None) => {
            let password = generate_temporary_password();
            let password_hash = match hash_password(&password) {
                Ok(hash) => hash,
                Err(e) => {
                    error!(error = %e, "Failed to hash temporary password");
                    std::process::exit(1);
                }
            };
            let id = Uuid::new_v4().to_string();

            let result = db
                .users()
                .create(NewUser {
                    id: &id,
                    username,
                    password_hash: &password_hash,
                    is_admin: true,
                    must_change_password: true,
                })
                .await;

            match result {
                Ok(()) => {
                    println!();
                    println!("Admin user created: {}", username);
                    println!("Temporary password: {}", password);
                    println!("The password must be changed on first login.");
                    println!();
                }
                Err(e) => {
                    error!(error = %e, "Failed to create admin user");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to check for existing user");
            std::process::exit(1);
        }
    }
}

/// Pick the refresh token backend.
pub fn select_token_store(kind: TokenStoreKind, db: &Database) -> Arc<dyn TokenStore> {
    match kind {
        TokenStoreKind::Sqlite => Arc::new(db.tokens()),
        TokenStoreKind::Memory => {
            info!("Using in-memory token store; sessions will not survive a restart");
            Arc::new(MemoryTokenStore::new())
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    jwt_secret: String,
    secure_cookies: bool,
    token_store: TokenStoreKind,
    ip_header: Option<String>,
) -> ServerConfig {
    let token_store = select_token_store(token_store, &db);

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        secure_cookies,
        token_store,
        ip_header,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
