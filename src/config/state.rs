// Application state module
// Immutable configuration plus the streaming service built from it

use std::sync::Arc;

use super::types::Config;
use crate::service::StreamingService;
use crate::source::DataSource;

/// Application state shared by every connection
///
/// Nothing here changes after startup, so it is read without locks.
pub struct AppState {
    pub config: Config,
    pub service: StreamingService,
}

impl AppState {
    /// Build state around an already constructed data source
    pub fn new(config: Config, source: Arc<dyn DataSource>) -> Self {
        let service = StreamingService::new(source, config.limits);
        Self { config, service }
    }
}
