mod aggregator;
mod dispatcher;
mod publish;

pub use aggregator::{AggregationResult, TrvLeader, TrvReading, aggregate, any_trv_calls_for_heat};
pub use dispatcher::{HeaterCommand, HeaterDispatcher, HvacMode};

use std::collections::HashMap;

use serde_json::Value;

use crate::adapter::homeassistant::{StateChangedEvent, StateValue};
use crate::core::unit::DegreeCelsius;
use crate::port::{CallServicePort, GetAllEntityStatesPort, ListenToStateChangesPort, PublishStatePort};
use crate::settings::DemandSettings;

const HVAC_ACTION: &str = "hvac_action";
const CURRENT_TEMPERATURE: &str = "current_temperature";
const TARGET_TEMPERATURE: &str = "temperature";
const FRIENDLY_NAME: &str = "friendly_name";

//only changes to these attributes retrigger the aggregation
const RELAYED_ATTRIBUTES: [&str; 3] = [HVAC_ACTION, CURRENT_TEMPERATURE, TARGET_TEMPERATURE];

pub struct EntityState {
    state: StateValue,
    attributes: HashMap<String, Value>,
}

impl EntityState {
    fn raw_state(&self) -> &str {
        match &self.state {
            StateValue::Available(value) => value,
            StateValue::Unavailable => "unavailable",
        }
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn temperature_attribute(&self, name: &str) -> Option<DegreeCelsius> {
        self.attributes.get(name).and_then(|v| v.as_f64()).map(DegreeCelsius)
    }

    fn string_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).and_then(|v| v.as_str()).map(str::to_string)
    }
}

//Latest known state of every watched entity, fed by the initial bulk read and
//by every later state-changed event.
#[derive(Default)]
pub struct EntityStates {
    states: HashMap<String, EntityState>,
}

impl EntityStates {
    fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.states.get(entity_id)
    }

    fn absorb(&mut self, event: StateChangedEvent) {
        self.states.insert(
            event.entity_id,
            EntityState {
                state: event.state,
                attributes: event.attributes,
            },
        );
    }
}

pub struct DemandRunner<C> {
    settings: DemandSettings,
    states: EntityStates,
    dispatcher: Option<HeaterDispatcher<C>>,
    client: C,
}

impl<C> DemandRunner<C>
where
    C: CallServicePort + PublishStatePort + Clone,
{
    pub fn new(settings: DemandSettings, client: C) -> Self {
        let dispatcher = settings
            .heater_entity_id
            .clone()
            .map(|heater| HeaterDispatcher::new(client.clone(), heater));

        Self {
            settings,
            states: EntityStates::default(),
            dispatcher,
            client,
        }
    }

    pub async fn run(mut self, bootstrap: impl GetAllEntityStatesPort, mut listener: impl ListenToStateChangesPort) {
        match bootstrap.get_current_state().await {
            Ok(events) => {
                for event in events {
                    if self.is_watched(&event.entity_id) {
                        self.states.absorb(event);
                    }
                }
            }
            Err(e) => tracing::error!("Error loading initial entity states: {:?}", e),
        }

        self.recompute().await;

        loop {
            match listener.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(e) => {
                    tracing::error!("Error receiving state-changed events: {:?}", e);
                    return;
                }
            }
        }
    }

    async fn handle_event(&mut self, event: StateChangedEvent) {
        if !self.is_watched(&event.entity_id) {
            tracing::trace!("Skipped {}", event.entity_id);
            return;
        }

        let recompute = self.needs_recompute(&event);
        tracing::debug!(
            "State of {} changed at {} (recompute = {})",
            event.entity_id,
            event.last_changed,
            recompute
        );

        self.states.absorb(event);

        if recompute {
            self.recompute().await;
        }
    }

    fn is_watched(&self, entity_id: &str) -> bool {
        self.settings.trv_climate_entities.iter().any(|id| id == entity_id)
            || self.settings.zone_entity_id.as_deref() == Some(entity_id)
    }

    fn needs_recompute(&self, event: &StateChangedEvent) -> bool {
        //zone changes are not filtered
        if self.settings.zone_entity_id.as_deref() == Some(event.entity_id.as_str()) {
            return true;
        }

        match self.states.get(&event.entity_id) {
            //first observation of this TRV
            None => true,
            Some(old) => RELAYED_ATTRIBUTES
                .iter()
                .any(|name| old.attribute(name) != event.attributes.get(*name)),
        }
    }

    async fn recompute(&mut self) {
        let away = self.is_away();
        let readings = self.trv_readings();

        let result = aggregate(&readings, away, DegreeCelsius(self.settings.away_temp));
        let plain_demand = any_trv_calls_for_heat(&readings);

        tracing::debug!(
            "Demand recomputed over {} TRVs (demanding = {}, leader delta = {}, away = {})",
            readings.len(),
            result.is_demanding,
            result.leader_delta_raw,
            away
        );

        if let Some(dispatcher) = self.dispatcher.as_mut() {
            let command = HeaterCommand::from_aggregation(&result, DegreeCelsius(self.settings.minimum_temperature));
            dispatcher.dispatch(&command).await;
        }

        let attributes = publish::binary_sensor_attributes(&self.settings, &result, away);
        if let Err(e) = self
            .client
            .publish_state(
                &self.settings.binary_sensor_entity_id,
                publish::on_off(result.is_demanding),
                attributes,
            )
            .await
        {
            tracing::error!("Error publishing {}: {:?}", self.settings.binary_sensor_entity_id, e);
        }

        let attributes = publish::plain_sensor_attributes(&self.settings);
        if let Err(e) = self
            .client
            .publish_state(&self.settings.sensor_entity_id, publish::on_off(plain_demand), attributes)
            .await
        {
            tracing::error!("Error publishing {}: {:?}", self.settings.sensor_entity_id, e);
        }
    }

    fn is_away(&self) -> bool {
        match &self.settings.zone_entity_id {
            Some(zone) => self
                .states
                .get(zone)
                .map(|state| state.raw_state() == "0")
                .unwrap_or(false),
            None => false,
        }
    }

    fn trv_readings(&self) -> Vec<TrvReading> {
        let mut readings = vec![];

        for entity_id in &self.settings.trv_climate_entities {
            let Some(state) = self.states.get(entity_id) else {
                tracing::debug!("TRV entity {} not found", entity_id);
                continue;
            };

            readings.push(TrvReading {
                entity_id: entity_id.clone(),
                raw_state: state.raw_state().to_string(),
                hvac_action: state.string_attribute(HVAC_ACTION),
                current_temperature: state.temperature_attribute(CURRENT_TEMPERATURE),
                target_temperature: state.temperature_attribute(TARGET_TEMPERATURE),
                friendly_name: state.string_attribute(FRIENDLY_NAME),
            });
        }

        readings
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingHost {
        services: Arc<Mutex<Vec<(String, String, Value)>>>,
        published: Arc<Mutex<Vec<(String, String, Value)>>>,
    }

    impl RecordingHost {
        fn published(&self) -> Vec<(String, String, Value)> {
            self.published.lock().unwrap().clone()
        }

        fn services(&self) -> Vec<(String, String, Value)> {
            self.services.lock().unwrap().clone()
        }
    }

    impl CallServicePort for RecordingHost {
        async fn call_service(&self, domain: &str, service: &str, service_data: Value) -> anyhow::Result<()> {
            self.services
                .lock()
                .unwrap()
                .push((domain.to_string(), service.to_string(), service_data));
            Ok(())
        }
    }

    impl PublishStatePort for RecordingHost {
        async fn publish_state(&self, entity_id: &str, state: &str, attributes: Value) -> anyhow::Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((entity_id.to_string(), state.to_string(), attributes));
            Ok(())
        }
    }

    fn settings() -> DemandSettings {
        DemandSettings {
            trv_climate_entities: vec!["climate.trv1".to_string(), "climate.trv2".to_string()],
            heater_entity_id: Some("climate.heater".to_string()),
            minimum_temperature: 5.0,
            away_temp: 12.0,
            zone_entity_id: Some("sensor.home_zone".to_string()),
            binary_sensor_entity_id: "binary_sensor.central_heating_demand".to_string(),
            sensor_entity_id: "sensor.central_heating_demand".to_string(),
        }
    }

    fn runner(host: &RecordingHost) -> DemandRunner<RecordingHost> {
        DemandRunner::new(settings(), host.clone())
    }

    fn event(entity_id: &str, state: &str, attributes: Value) -> StateChangedEvent {
        serde_json::from_value(json!({
            "entity_id": entity_id,
            "state": state,
            "last_changed": "2024-11-02T07:12:51+00:00",
            "attributes": attributes,
        }))
        .unwrap()
    }

    fn trv_event(entity_id: &str, action: &str, current: f64, target: f64) -> StateChangedEvent {
        event(
            entity_id,
            "heat",
            json!({
                "hvac_action": action,
                "current_temperature": current,
                "temperature": target,
            }),
        )
    }

    #[tokio::test]
    async fn events_of_unwatched_entities_are_ignored() {
        let host = RecordingHost::default();
        let mut runner = runner(&host);

        runner.handle_event(trv_event("climate.other", "heating", 18.0, 21.0)).await;

        assert!(host.published().is_empty());
        assert!(host.services().is_empty());
    }

    #[tokio::test]
    async fn first_observation_triggers_recompute() {
        let host = RecordingHost::default();
        let mut runner = runner(&host);

        runner.handle_event(trv_event("climate.trv1", "heating", 18.0, 21.0)).await;

        let published = host.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "binary_sensor.central_heating_demand");
        assert_eq!(published[0].1, "on");
        assert_eq!(published[1].0, "sensor.central_heating_demand");
        assert_eq!(published[1].1, "on");
    }

    #[tokio::test]
    async fn unrelated_attribute_churn_is_filtered() {
        let host = RecordingHost::default();
        let mut runner = runner(&host);

        runner.handle_event(trv_event("climate.trv1", "idle", 20.0, 21.0)).await;
        runner
            .handle_event(event(
                "climate.trv1",
                "heat",
                json!({
                    "hvac_action": "idle",
                    "current_temperature": 20.0,
                    "temperature": 21.0,
                    "battery": 81,
                }),
            ))
            .await;

        //only the first observation recomputed
        assert_eq!(host.published().len(), 2);
    }

    #[tokio::test]
    async fn changed_temperature_triggers_recompute() {
        let host = RecordingHost::default();
        let mut runner = runner(&host);

        runner.handle_event(trv_event("climate.trv1", "idle", 20.0, 21.0)).await;
        runner.handle_event(trv_event("climate.trv1", "idle", 19.5, 21.0)).await;

        assert_eq!(host.published().len(), 4);
    }

    #[tokio::test]
    async fn zone_changes_always_recompute() {
        let host = RecordingHost::default();
        let mut runner = runner(&host);

        runner.handle_event(trv_event("climate.trv1", "idle", 15.0, 21.0)).await;
        runner.handle_event(event("sensor.home_zone", "0", json!({}))).await;

        let published = host.published();
        assert_eq!(published.len(), 4);

        //zone state "0" switches the published attributes to away mode
        assert_eq!(published[0].2["away_mode"], json!(false));
        assert_eq!(published[2].2["away_mode"], json!(true));
    }

    #[tokio::test]
    async fn heater_follows_the_demand_signal() {
        let host = RecordingHost::default();
        let mut runner = runner(&host);

        runner.handle_event(trv_event("climate.trv1", "heating", 18.0, 21.0)).await;
        runner.handle_event(trv_event("climate.trv1", "idle", 21.2, 21.0)).await;

        let services: Vec<(String, Value)> = host
            .services()
            .into_iter()
            .map(|(_, service, data)| (service, data))
            .collect();

        assert_eq!(services.len(), 4);
        assert_eq!(services[0].1["temperature"], json!(21.0));
        assert_eq!(services[1].1["hvac_mode"], json!("heat"));
        assert_eq!(services[2].1["temperature"], json!(5.0));
        assert_eq!(services[3].1["hvac_mode"], json!("off"));
    }
}
