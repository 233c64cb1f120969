mod http;
mod monitoring;
mod mqtt;

pub use monitoring::MonitoringConfig;

pub use http::HttpClientConfig;
pub use mqtt::{Mqtt, MqttConfig, MqttInMessage, MqttSubscription};
