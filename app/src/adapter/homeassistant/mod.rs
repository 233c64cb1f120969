mod event;
mod http;

pub use event::HaEventListener;
pub use http::HaRestClient;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use infrastructure::Mqtt;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Deserialize, Clone)]
pub struct HomeAssistant {
    pub topic_event: String,
    pub url: String,
    pub token: String,
}

impl HomeAssistant {
    pub fn new_rest_client(&self) -> anyhow::Result<HaRestClient> {
        HaRestClient::new(&self.url, &self.token)
    }

    pub async fn new_event_listener(&self, mqtt: &mut Mqtt) -> anyhow::Result<HaEventListener> {
        let rx = mqtt.subscribe(self.topic_event.clone()).await?;
        Ok(HaEventListener::new(rx))
    }
}

#[derive(Deserialize, Debug)]
pub struct StateChangedEvent {
    pub entity_id: String,
    pub state: StateValue,
    pub last_changed: DateTime<Utc>,
    pub attributes: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    Available(String),
    Unavailable,
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "unavailable" => Ok(StateValue::Unavailable),
            _ => Ok(StateValue::Available(value)),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(tag = "event_type", content = "event_data")]
#[allow(dead_code)]
pub enum HaEvent {
    #[serde(rename = "state_changed")]
    StateChanged {
        entity_id: String,
        new_state: StateChangedEvent,
    },

    #[serde(untagged)]
    Unknown(Value),
}
