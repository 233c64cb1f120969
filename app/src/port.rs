#![allow(async_fn_in_trait)]

use anyhow::Result;

use crate::adapter::homeassistant::StateChangedEvent;

pub trait GetAllEntityStatesPort {
    async fn get_current_state(&self) -> Result<Vec<StateChangedEvent>>;
}

pub trait ListenToStateChangesPort {
    async fn recv(&mut self) -> Result<StateChangedEvent>;
}

pub trait CallServicePort {
    async fn call_service(&self, domain: &str, service: &str, service_data: serde_json::Value) -> Result<()>;
}

pub trait PublishStatePort {
    async fn publish_state(&self, entity_id: &str, state: &str, attributes: serde_json::Value) -> Result<()>;
}
