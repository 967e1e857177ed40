use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::{IdentityProvider, LocalIdentityProvider, RemoteIdentityProvider, TokenVerifier};
use crate::config::{AppConfig, ConfigError, IdentityBackend, SecurityConfig, StoreBackend};
use crate::database::models::{Announcement, CommunityDocument, Event, GalleryImage};
use crate::database::{DocumentStore, MemoryStore, PgStore, UserStore};
use crate::handlers::{protected, public, system};
use crate::middleware::{require_admin, require_authenticated};

/// Everything a request needs, built once at startup and shared by reference.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub verifier: TokenVerifier,
    postgres: Option<PgStore>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ConfigError> {
        let verifier = TokenVerifier::new(identity.clone(), &config)?;
        Ok(Self { config: Arc::new(config), users, documents, identity, verifier, postgres: None })
    }

    /// In-memory stores behind both capability traits.
    pub fn in_memory(config: AppConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self, ConfigError> {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store, identity)
    }

    /// Select backends from configuration. Postgres is connected and migrated here.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let identity: Arc<dyn IdentityProvider> = match config.identity.provider {
            IdentityBackend::Local => {
                if config.identity.token_secret.is_none() {
                    warn!("IDENTITY_TOKEN_SECRET not set; local provider uses the development secret");
                }
                Arc::new(LocalIdentityProvider::new(config.token_secret(), config.identity.token_ttl_secs))
            }
            IdentityBackend::Remote => Arc::new(
                RemoteIdentityProvider::new(&config.identity).context("failed to build remote identity provider")?,
            ),
        };

        match config.database.backend {
            StoreBackend::Memory => {
                info!("Using in-memory store");
                Ok(Self::in_memory(config, identity)?)
            }
            StoreBackend::Postgres => {
                let store = PgStore::connect(&config.database)
                    .await
                    .context("failed to connect to database")?;
                store.migrate().await.context("failed to migrate database")?;
                let shared = Arc::new(store.clone());
                let mut state = Self::new(config, shared.clone(), shared, identity)?;
                state.postgres = Some(store);
                Ok(state)
            }
        }
    }

    /// Release backend resources after the server stops.
    pub async fn close(&self) {
        if let Some(store) = &self.postgres {
            store.close().await;
        }
    }
}

/// Full application router with the outer middleware stack.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(system::health))
        .route("/api", get(system::info))
        .route("/api/auth/register", post(public::register))
        .route("/api/auth/login", post(public::login));

    let admin_only = Router::new()
        .route("/api/residents", get(protected::residents::list))
        .route_layer(from_fn(require_admin));

    let protected = Router::new()
        .merge(auth_routes())
        .merge(resource_routes())
        .merge(resident_routes())
        .merge(admin_only)
        .route_layer(from_fn_with_state(state.clone(), require_authenticated));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(system::not_found)
        // After the merges: it only reaches routes present at this point
        .method_not_allowed_fallback(system::method_not_allowed)
        .layer(DefaultBodyLimit::max(state.config.api.max_upload_bytes))
        .layer(CatchPanicLayer::custom(system::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.security))
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/auth/me", get(auth::me).put(auth::update_me))
        .route("/api/auth/change-password", post(auth::change_password))
}

fn resource_routes() -> Router<AppState> {
    use protected::{events, resources as r};

    Router::new()
        // Events: read for everyone signed in, write for admins, RSVP for self
        .route("/api/events", get(r::list::<Event>).post(r::create::<Event>))
        .route(
            "/api/events/:id",
            get(r::show::<Event>).put(r::update::<Event>).delete(r::remove::<Event>),
        )
        .route("/api/events/:id/rsvp", post(events::rsvp).delete(events::cancel_rsvp))
        // Community documents
        .route(
            "/api/documents",
            get(r::list::<CommunityDocument>).post(r::create::<CommunityDocument>),
        )
        .route(
            "/api/documents/:id",
            get(r::show::<CommunityDocument>)
                .put(r::update::<CommunityDocument>)
                .delete(r::remove::<CommunityDocument>),
        )
        // Gallery
        .route("/api/gallery", get(r::list::<GalleryImage>).post(r::create::<GalleryImage>))
        .route(
            "/api/gallery/:id",
            get(r::show::<GalleryImage>)
                .put(r::update::<GalleryImage>)
                .delete(r::remove::<GalleryImage>),
        )
        // Announcements
        .route(
            "/api/announcements",
            get(r::list::<Announcement>).post(r::create::<Announcement>),
        )
        .route(
            "/api/announcements/:id",
            get(r::show::<Announcement>)
                .put(r::update::<Announcement>)
                .delete(r::remove::<Announcement>),
        )
}

fn resident_routes() -> Router<AppState> {
    use protected::residents;

    Router::new()
        .route(
            "/api/residents/:id",
            get(residents::show)
                .put(residents::update)
                .post(residents::create)
                .delete(residents::remove),
        )
        .route("/api/directory", get(residents::directory))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if security.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring unparsable CORS origin {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
