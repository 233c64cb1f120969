use config::{Config, ConfigError, Environment, File};
use infrastructure::{MonitoringConfig, MqttConfig};
use serde::{Deserialize, Deserializer};

use crate::adapter::homeassistant::HomeAssistant;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub mqtt: MqttConfig,
    pub monitoring: MonitoringConfig,
    pub homeassistant: HomeAssistant,
    pub demand: DemandSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config.toml"))
            .add_source(Environment::default().separator("_").list_separator(","));

        let s = builder.build()?;
        let settings: Settings = s.try_deserialize()?;
        settings.demand.validate()?;

        Ok(settings)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DemandSettings {
    #[serde(deserialize_with = "entity_id_list")]
    pub trv_climate_entities: Vec<String>,

    pub heater_entity_id: Option<String>,

    #[serde(default = "default_minimum_temperature")]
    pub minimum_temperature: f64,

    #[serde(default = "default_away_temp")]
    pub away_temp: f64,

    pub zone_entity_id: Option<String>,

    #[serde(default = "default_binary_sensor_entity_id")]
    pub binary_sensor_entity_id: String,

    #[serde(default = "default_sensor_entity_id")]
    pub sensor_entity_id: String,
}

impl DemandSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trv_climate_entities.is_empty() {
            return Err(ConfigError::Message("trv_climate_entities must not be empty".to_string()));
        }

        Ok(())
    }
}

fn default_minimum_temperature() -> f64 {
    5.0
}

fn default_away_temp() -> f64 {
    12.0
}

fn default_binary_sensor_entity_id() -> String {
    "binary_sensor.central_heating_demand".to_string()
}

fn default_sensor_entity_id() -> String {
    "sensor.central_heating_demand".to_string()
}

//Accepts a single entity id, a JSON-array-encoded string (as it arrives from
//environment variables or UI text fields) or a native list, normalized to a
//list of entity ids.
fn entity_id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        List(Vec<String>),
        Single(String),
    }

    match StringOrList::deserialize(deserializer)? {
        StringOrList::List(list) => Ok(list),
        StringOrList::Single(value) => match serde_json::from_str::<Vec<String>>(&value) {
            Ok(list) => Ok(list),
            Err(_) => Ok(vec![value]),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn demand_settings(value: serde_json::Value) -> Result<DemandSettings, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn native_list_is_taken_as_is() {
        let settings = demand_settings(json!({
            "trv_climate_entities": ["climate.trv1", "climate.trv2"],
        }))
        .unwrap();

        assert_eq!(settings.trv_climate_entities, vec!["climate.trv1", "climate.trv2"]);
    }

    #[test]
    fn single_string_becomes_a_one_element_list() {
        let settings = demand_settings(json!({
            "trv_climate_entities": "climate.trv1",
        }))
        .unwrap();

        assert_eq!(settings.trv_climate_entities, vec!["climate.trv1"]);
    }

    #[test]
    fn json_array_string_is_parsed() {
        let settings = demand_settings(json!({
            "trv_climate_entities": "[\"climate.trv1\", \"climate.trv2\"]",
        }))
        .unwrap();

        assert_eq!(settings.trv_climate_entities, vec!["climate.trv1", "climate.trv2"]);
    }

    #[test]
    fn other_shapes_are_rejected() {
        assert!(demand_settings(json!({ "trv_climate_entities": 42 })).is_err());
        assert!(demand_settings(json!({})).is_err());
    }

    #[test]
    fn empty_list_fails_validation() {
        let settings = demand_settings(json!({
            "trv_climate_entities": [],
        }))
        .unwrap();

        assert!(settings.validate().is_err());
    }

    #[test]
    fn temperatures_default_when_absent() {
        let settings = demand_settings(json!({
            "trv_climate_entities": "climate.trv1",
        }))
        .unwrap();

        assert_eq!(settings.minimum_temperature, 5.0);
        assert_eq!(settings.away_temp, 12.0);
        assert_eq!(settings.heater_entity_id, None);
        assert_eq!(settings.zone_entity_id, None);
        assert_eq!(settings.binary_sensor_entity_id, "binary_sensor.central_heating_demand");
        assert_eq!(settings.sensor_entity_id, "sensor.central_heating_demand");
    }
}
