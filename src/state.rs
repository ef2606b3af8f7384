use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::sources::Sources;
use crate::subscribers::SubscriberRegistry;

/// The one service object shared by request handlers and the scheduler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) aggregator: Arc<Aggregator>,
    pub(crate) broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(sources: Sources, config: &Config) -> Self {
        let aggregator = Arc::new(Aggregator::from_config(sources, config));
        let registry = Arc::new(SubscriberRegistry::new(config.max_subscribers));
        let broadcaster = Arc::new(Broadcaster::new(
            aggregator.clone(),
            registry,
            config.subscriber_buffer,
        ));

        Self {
            aggregator,
            broadcaster,
        }
    }
}
