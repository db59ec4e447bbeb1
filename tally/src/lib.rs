//! Tally, a small web front end for an expense and income tracking backend.
//!
//! The application keeps no data of its own. Identity lives in a signed
//! session cookie, records live behind the REST backend, and the only
//! in-process state is the live-update subscriber registry. See the module
//! docs for the individual pieces:
//!
//! - [`session`]: the signed cookie that carries the whole session record
//! - [`auth`]: the gate protected handlers call before doing anything else
//! - [`client`]: the outbound API client with per-request credentials
//! - [`notify`]: the per-user refresh-signal relay behind `/events`
//! - [`form`]: explicit validators for every form the app serves

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub(crate) mod handlers;
pub mod html;
pub mod notify;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::client::BackendClient;
use crate::config::ProjectConfig;
use crate::notify::ChangeNotifier;
use crate::session::SessionStore;

pub use crate::error::Result;

/// Shared application state, cheap to clone per request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub(crate) config: Arc<ProjectConfig>,
    pub(crate) sessions: SessionStore,
    pub(crate) backend: BackendClient,
    pub(crate) notifier: ChangeNotifier,
}

impl AppState {
    /// Builds the application state from a project configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be constructed.
    pub fn from_config(config: ProjectConfig) -> Result<Self> {
        let backend = BackendClient::from_config(&config)?;
        let sessions = SessionStore::new(&config.session);
        Ok(Self {
            config: Arc::new(config),
            sessions,
            backend,
            notifier: ChangeNotifier::new(),
        })
    }

    /// The session store, e.g. for minting cookies in tests.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The live-update notifier shared by all requests.
    #[must_use]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

/// Builds the application router with every route and the error-page layer.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/login", get(handlers::login_page).post(handlers::login_submit))
        .route("/login/google", get(handlers::google_login))
        .route("/google-callback", get(handlers::google_callback))
        .route("/signup", get(handlers::signup_page).post(handlers::signup_submit))
        .route("/verify-email", get(handlers::verify_email))
        .route("/logout", post(handlers::logout))
        .route("/dashboard", get(handlers::dashboard))
        .route(
            "/dashboard/expenses",
            get(handlers::expenses_list).post(handlers::expenses_create),
        )
        .route(
            "/dashboard/expenses/{id}",
            get(handlers::expenses_detail).post(handlers::expenses_update),
        )
        .route("/dashboard/expenses/{id}/delete", post(handlers::expenses_delete))
        .route(
            "/dashboard/income",
            get(handlers::income_list).post(handlers::income_create),
        )
        .route(
            "/dashboard/income/{id}",
            get(handlers::income_detail).post(handlers::income_update),
        )
        .route("/dashboard/income/{id}/delete", post(handlers::income_delete))
        .route("/events", get(handlers::events))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            error::pages::error_pages,
        ))
        .with_state(state)
}
