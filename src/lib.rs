use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod backoff;
pub mod blob;
pub mod cache;
pub mod dispatch;
pub mod documents;
pub mod emergency;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod severity;
pub mod store;
pub mod telemetry;
pub mod tracking;

use blob::BlobStore;
use documents::TokenSigner;
use severity::SeverityScorer;
use store::Store;
use tracking::TrackingCache;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub scorer: Arc<dyn SeverityScorer>,
    pub tokens: TokenSigner,
    pub tracking: Arc<TrackingCache>,
}

impl AppState {
    pub fn new(
        store: Store,
        blobs: Arc<dyn BlobStore>,
        scorer: Arc<dyn SeverityScorer>,
        token_secret: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            blobs,
            scorer,
            tokens: TokenSigner::new(token_secret),
            tracking: Arc::new(TrackingCache::new()),
        }
    }
}

/// Build the router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Registration
        .route("/api/users", post(handlers::create_user))
        .route("/api/users/:id", get(handlers::get_user))
        // Emergency lifecycle
        .route("/api/emergencies", post(handlers::trigger_emergency))
        .route(
            "/api/emergencies/:id/location",
            put(handlers::update_patient_location),
        )
        .route(
            "/api/emergencies/:id/tracking",
            get(handlers::get_tracking),
        )
        .route("/api/emergencies/:id/accept", post(handlers::accept_case))
        // Hospital
        .route("/api/hospital/feed", get(handlers::hospital_feed))
        .route("/api/hospital/beds", put(handlers::update_beds))
        // Driver
        .route("/api/driver/assignment", get(handlers::driver_assignment))
        .route(
            "/api/emergencies/:id/driver-location",
            post(handlers::driver_location),
        )
        .route(
            "/api/emergencies/:id/driver-action",
            post(handlers::driver_action),
        )
        // Documents
        .route(
            "/api/emergencies/:id/documents",
            post(handlers::upload_document).get(handlers::list_documents),
        )
        .route("/api/documents/view", get(handlers::view_document))
        // Health check
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
