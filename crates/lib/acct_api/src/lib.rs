//! # acct_api
//!
//! HTTP and RPC adapters for Acct.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod rpc;

use std::sync::Arc;

use acct_core::auth::jwt::TokenCodec;
use acct_core::auth::service::SessionService;
use acct_core::kv::KeyValueStore;
use acct_core::users::UserDirectory;
use acct_core::users::service::UserService;
use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Login, refresh, logout and token validation.
    pub sessions: Arc<SessionService>,
    /// Account CRUD.
    pub users: Arc<UserService>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the services over the given session store and user directory.
    pub fn new(
        config: ApiConfig,
        kv: Arc<dyn KeyValueStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let session_config = config.session_config();
        let call_timeout = session_config.call_timeout;
        let sessions = Arc::new(SessionService::new(
            TokenCodec::new(config.jwt_secret.as_bytes()),
            kv,
            directory.clone(),
            session_config,
        ));
        let users = Arc::new(
            UserService::new(directory, sessions.clone())
                .with_bcrypt_cost(config.bcrypt_cost)
                .with_call_timeout(call_timeout),
        );
        Self {
            sessions,
            users,
            config,
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_VALIDATE, post(auth::validate_handler))
        .route(routes::POST_USERS, post(users::register_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::GET_USERS_ME, get(users::me_handler))
        .route(
            routes::USERS_ID,
            get(users::get_user_handler)
                .patch(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .route(
            routes::PUT_USERS_ID_PASSWORD,
            put(users::change_password_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
