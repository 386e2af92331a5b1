/// QuickSwap: a small marketplace web application
///
/// Users register, log in, post items for sale with pictures, browse a
/// paginated listing of everyone's items and reset forgotten passwords
/// through emailed links.
///
/// ### Modules
///
/// - `db`: Database connection management
/// - `models`: Users, items and item pictures
/// - `repo`: Repository layer for database operations
/// - `schema`: Database schema definitions
/// - `handlers`: Route handlers
/// - `auth`, `flash`, `tokens`: Sessions, flash messages and reset tokens
/// - `images`, `mail`: Picture storage and outgoing mail
///
/// ### Routes
///
/// - `GET /`, `GET /index`: Newest items, five per page
/// - `GET /about`: About page
/// - `GET|POST /register`, `GET|POST /login`, `GET /logout`
/// - `GET|POST /account`: Account details and profile picture
/// - `GET|POST /item/new`: Post an item
/// - `GET /item/{id}`: One item
/// - `GET|POST /item/{id}/update`, `POST /item/{id}/delete`, `POST /item/{id}/images`
/// - `GET /user/{username}`: One seller's items
/// - `GET|POST /reset_password`, `GET|POST /reset_password/{token}`
/// - `GET /static/*`: Uploaded pictures and other static files

/// Password hashing, sessions and the user extractors
pub mod auth;

/// Configuration module
pub mod config;

/// Database connection module
pub mod db;

/// Forms and query parameters
pub mod dto;

/// Error types for the web layer
pub mod errors;

/// Flash messages
pub mod flash;

/// Route handlers
pub mod handlers;

/// Picture uploads
pub mod images;

/// Outgoing mail
pub mod mail;

/// Data models module
pub mod models;

/// Repository module for database operations
pub mod repo;

/// Database schema module
pub mod schema;

/// Password-reset tokens
pub mod tokens;

/// JSON page views
pub mod views;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::Key;
use rand::Rng;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::DbPool;
use crate::images::ImageStore;
use crate::mail::Mailer;
use crate::tokens::ResetTokens;

/// Largest accepted request body, enough for a picture upload
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<DbPool>,
    pub cookie_key: Key,
    pub reset_tokens: ResetTokens,
    pub mailer: Mailer,
    pub images: ImageStore,
    pub public_url: String,
    pub remember_days: u32,
}

impl AppState {
    /// Builds the state from the configuration and an initialised pool
    ///
    /// Without a configured `secret_key` a random one is generated, so
    /// sessions and reset links do not survive a restart.
    ///
    /// ### Errors
    ///
    /// Returns an error if the secret is too short or the mail sender
    /// address cannot be parsed.
    pub fn new(config: &Config, pool: Arc<DbPool>) -> anyhow::Result<Self> {
        config.validate()?;

        let secret = match config.secret_key.as_deref() {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                warn!("No secret_key configured, generating a random one; sessions end on restart");
                let mut secret = vec![0u8; 64];
                rand::rng().fill(&mut secret[..]);
                secret
            }
        };

        let expiry = i64::try_from(config.reset_token_expiry().as_secs()).unwrap_or(i64::MAX);

        Ok(Self {
            pool,
            cookie_key: Key::derive_from(&secret),
            reset_tokens: ResetTokens::new(&secret, expiry),
            mailer: Mailer::from_config(config)?,
            images: ImageStore::new(&config.static_dir),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            remember_days: config.remember_days,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl FromRef<AppState> for Arc<DbPool> {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

/// Creates the application router with all routes
///
/// ### Arguments
///
/// * `state` - The shared application state
///
/// ### Returns
///
/// An Axum Router configured with all routes, the static file service and
/// request tracing
pub fn create_app(state: AppState) -> Router {
    use handlers::*;

    let static_files = ServeDir::new(state.images.root());

    Router::new()
        // Listings
        .route("/", get(home_handler))
        .route("/index", get(home_handler))
        .route("/about", get(about_handler))
        .route("/user/{username}", get(user_items_handler))
        // Accounts
        .route("/register", get(register_page_handler).post(register_handler))
        .route("/login", get(login_page_handler).post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/account", get(account_page_handler).post(update_account_handler))
        .route("/reset_password", get(reset_request_page_handler).post(reset_request_handler))
        .route("/reset_password/{token}", get(reset_token_page_handler).post(reset_token_handler))
        // Items
        .route("/item/new", get(new_item_page_handler).post(create_item_handler))
        .route("/item/{id}", get(item_page_handler))
        .route("/item/{id}/update", get(update_item_page_handler).post(update_item_handler))
        .route("/item/{id}/delete", post(delete_item_handler))
        .route("/item/{id}/images", post(add_item_image_handler))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs pending database migrations
///
/// ### Errors
///
/// Returns an error if a migration fails to apply
pub fn run_migrations(
    conn: &mut diesel::SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    // Define the embedded migrations
    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    if !applied.is_empty() {
        info!("Applied {} migration(s)", applied.len());
    }
    Ok(())
}
