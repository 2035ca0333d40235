use std::sync::Arc;

use varnava_core::update_events::EVENT_RESOURCES_UPDATE;
use varnava_events::UpdateChannel;
use varnava_resources::{ResourceObserver, ResourceStatus};

/// Publishes every resource status the manager reports as
/// `resources.update`.
pub struct ResourceUpdatePublisher {
    channel: Arc<UpdateChannel>,
}

impl ResourceUpdatePublisher {
    pub fn new(channel: Arc<UpdateChannel>) -> Self {
        Self { channel }
    }
}

impl ResourceObserver for ResourceUpdatePublisher {
    fn on_resources_update(&self, status: &ResourceStatus) {
        self.channel.send(EVENT_RESOURCES_UPDATE, status);
    }
}
