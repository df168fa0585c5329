use crate::interface_adapters::bus::TopicExchange;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Topic exchange shared by the party, its listeners and bridge clients.
    pub bus: Arc<TopicExchange>,
}
