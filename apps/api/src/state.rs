use std::sync::Arc;

use crate::calls::CallInitiator;
use crate::config::Config;
use crate::mailer::Mailer;
use crate::sentiment::SentimentClassifier;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every external collaborator sits behind a trait object so handlers never
/// depend on a concrete provider.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub caller: Arc<dyn CallInitiator>,
    pub classifier: Arc<dyn SentimentClassifier>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Config,
}
