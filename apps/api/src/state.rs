use std::sync::Arc;

use crate::config::Config;
use crate::entitlements::store::EntitlementStore;
use crate::resumes::resolver::ResumeResolver;
use crate::resumes::store::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Stores hold the connection pool and borrow a connection per statement, so
/// nothing here is a lazily-initialised global connection.
#[derive(Clone)]
pub struct AppState {
    pub entitlements: Arc<dyn EntitlementStore>,
    /// Dashboard reads go straight to the durable tier.
    pub resumes: Arc<dyn ResumeStore>,
    pub resolver: ResumeResolver,
    pub config: Config,
}
