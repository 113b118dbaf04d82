use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use time;

use crate::config::Config;
use crate::services::PhotoService;
use crate::store::{CsvStore, RowStore};

pub mod auth;
mod error;
mod insurance;
mod register;
mod types;
mod users;
pub mod validation;

pub use error::{ApiError, FormError};
pub use types::*;

/// Headroom on top of the photo cap for the text fields and multipart
/// framing that travel in the same request body.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    config: Config,

    store: Arc<dyn RowStore>,

    photos: Arc<PhotoService>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn RowStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn photos(&self) -> &PhotoService {
        &self.photos
    }
}

/// Wires the storage and photo services into the shared state. The record
/// table is NOT created here; `kartoteka init` or the first registration
/// does that, and reads against a missing table keep the "file not found"
/// behavior the frontend expects.
#[must_use]
pub fn create_app_state(config: Config) -> Arc<AppState> {
    let store = Arc::new(CsvStore::new(&config.storage.table_path));
    let photos = Arc::new(PhotoService::new(
        &config.uploads.dir,
        config.uploads.max_photo_bytes,
    ));

    Arc::new(AppState {
        config,
        store,
        photos,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();
    let web_root = config.web.root.clone();
    let uploads_dir = config.uploads.dir.clone();
    let cors_origins = config.server.cors_allowed_origins.clone();
    let secure_cookies = config.server.secure_cookies;
    let session_minutes = config.server.session_minutes;
    let body_limit = usize::try_from(config.uploads.max_photo_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_SLACK);

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            session_minutes,
        )));

    let api_router = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/flash", get(auth::login_flash))
        .route("/auth/me", get(auth::me))
        .route("/register", post(register::register))
        .route("/register/flash", get(register::register_flash))
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", post(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/insurance", get(insurance::overview))
        .route("/insurance", post(insurance::toggle))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(session_layer)
        .with_state(state);

    let cors_layer = if cors_origins.is_empty() || cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .nest_service(
            "/uploads",
            tower_http::services::ServeDir::new(uploads_dir),
        )
        .fallback_service(tower_http::services::ServeDir::new(web_root))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
