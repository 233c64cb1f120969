use infrastructure::Mqtt;
use settings::Settings;

use crate::home::demand::DemandRunner;

mod adapter;
mod core;
mod home;
pub mod port;
mod settings;

struct Infrastructure {
    mqtt_client: Mqtt,
}

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");

    let mut infrastructure = Infrastructure::init(&settings).expect("Error initializing infrastructure");

    let event_listener = settings
        .homeassistant
        .new_event_listener(&mut infrastructure.mqtt_client)
        .await
        .expect("Error subscribing to Home Assistant events");

    let rest_client = settings
        .homeassistant
        .new_rest_client()
        .expect("Error initializing Home Assistant REST client");

    let demand_runner = DemandRunner::new(settings.demand, rest_client.clone());

    tracing::info!("Starting main loop");

    tokio::select!(
        _ = infrastructure.process() => {},
        _ = demand_runner.run(rest_client, event_listener) => {},
    );
}

impl Infrastructure {
    fn init(settings: &Settings) -> anyhow::Result<Self> {
        settings.monitoring.init().expect("Error initializing monitoring");

        let mqtt_client = settings.mqtt.new_client();

        Ok(Self { mqtt_client })
    }

    async fn process(self) {
        self.mqtt_client.run().await
    }
}
