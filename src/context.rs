use crate::config::Config;
use crate::relay::RelayService;
use std::sync::Arc;

/// Application context containing shared dependencies
/// This reduces parameter passing and makes it easier to add new dependencies
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub relay: Arc<RelayService>,
}

impl AppContext {
    pub fn new(config: Arc<Config>, relay: Arc<RelayService>) -> Self {
        Self { config, relay }
    }
}
