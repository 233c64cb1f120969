use infrastructure::MqttSubscription;

use super::{HaEvent, StateChangedEvent};
use crate::port::ListenToStateChangesPort;

pub struct HaEventListener {
    rx: MqttSubscription,
}

impl HaEventListener {
    pub fn new(rx: MqttSubscription) -> Self {
        Self { rx }
    }
}

impl ListenToStateChangesPort for HaEventListener {
    async fn recv(&mut self) -> anyhow::Result<StateChangedEvent> {
        loop {
            let msg = match self.rx.recv().await {
                Some(msg) => msg,
                None => anyhow::bail!("MQTT event channel closed"),
            };

            match serde_json::from_str::<HaEvent>(&msg.payload) {
                Ok(HaEvent::StateChanged { new_state, .. }) => return Ok(new_state),

                //forwarded HA events other than state_changed
                Ok(HaEvent::Unknown(_)) => {
                    tracing::trace!("Received unsupported event: {:?}", msg.payload);
                }

                //json parsing error
                Err(e) => {
                    tracing::error!("Error parsing MQTT message: {}", e);
                }
            }
        }
    }
}
