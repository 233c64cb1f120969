use serde::Serialize;
use serde_json::json;

use super::aggregator::AggregationResult;
use crate::core::unit::DegreeCelsius;
use crate::port::CallServicePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    #[display("heat")]
    Heat,
    #[display("off")]
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterCommand {
    pub target_temperature: DegreeCelsius,
    pub hvac_mode: HvacMode,
}

impl HeaterCommand {
    pub fn from_aggregation(result: &AggregationResult, minimum_temperature: DegreeCelsius) -> Self {
        let mut hvac_mode = HvacMode::Off;
        let mut target_temperature = minimum_temperature;

        if result.is_demanding {
            hvac_mode = HvacMode::Heat;
            if let Some(leader) = &result.leader {
                target_temperature = leader.target_temperature;
            }
        }

        Self {
            target_temperature,
            hvac_mode,
        }
    }
}

pub struct HeaterDispatcher<C> {
    client: C,
    heater_entity_id: String,
    last_sent_temperature: Option<DegreeCelsius>,
    last_sent_mode: Option<HvacMode>,
}

impl<C: CallServicePort> HeaterDispatcher<C> {
    pub fn new(client: C, heater_entity_id: impl Into<String>) -> Self {
        Self {
            client,
            heater_entity_id: heater_entity_id.into(),
            last_sent_temperature: None,
            last_sent_mode: None,
        }
    }

    //Temperature first, then mode; the two calls are independent and a failed
    //call clears the remembered value so the next recompute retries it.
    pub async fn dispatch(&mut self, command: &HeaterCommand) {
        if self.last_sent_temperature != Some(command.target_temperature) {
            tracing::debug!(
                "Setting heater {} temperature to {}",
                self.heater_entity_id,
                command.target_temperature
            );

            let result = self
                .client
                .call_service(
                    "climate",
                    "set_temperature",
                    json!({
                        "entity_id": vec![self.heater_entity_id.clone()],
                        "temperature": command.target_temperature,
                    }),
                )
                .await;

            match result {
                Ok(()) => self.last_sent_temperature = Some(command.target_temperature),
                Err(e) => {
                    tracing::error!("Failed to set heater temperature: {:?}", e);
                    self.last_sent_temperature = None;
                }
            }
        }

        if self.last_sent_mode != Some(command.hvac_mode) {
            tracing::debug!("Setting heater {} hvac_mode to {}", self.heater_entity_id, command.hvac_mode);

            let result = self
                .client
                .call_service(
                    "climate",
                    "set_hvac_mode",
                    json!({
                        "entity_id": vec![self.heater_entity_id.clone()],
                        "hvac_mode": command.hvac_mode,
                    }),
                )
                .await;

            match result {
                Ok(()) => self.last_sent_mode = Some(command.hvac_mode),
                Err(e) => {
                    tracing::error!("Failed to set heater hvac_mode: {:?}", e);
                    self.last_sent_mode = None;
                }
            }
        }
    }
}
