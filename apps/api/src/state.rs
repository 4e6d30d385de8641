use std::sync::Arc;

use crate::applications::store::ApplicationStore;
use crate::config::Config;
use crate::ingest::identity::IdentityVerifier;
use crate::ingest::source::SourceLauncher;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Application rows. Default: `PgApplicationStore`.
    pub store: Arc<dyn ApplicationStore>,
    /// Bearer token verification. Default: `SupabaseAuthVerifier`.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Opens one browser session per ingestion run. Default: `ChromiumLauncher`.
    pub launcher: Arc<dyn SourceLauncher>,
}
