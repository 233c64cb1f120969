use serde_json::{Value, json};

use super::aggregator::AggregationResult;
use crate::settings::DemandSettings;

const FRIENDLY_NAME: &str = "Central Heating Demand";
const ICON: &str = "mdi:radiator";

pub fn on_off(demanding: bool) -> &'static str {
    if demanding { "on" } else { "off" }
}

pub fn binary_sensor_attributes(settings: &DemandSettings, result: &AggregationResult, away: bool) -> Value {
    let leader = result.leader.as_ref();

    json!({
        "friendly_name": FRIENDLY_NAME,
        "icon": ICON,
        "trv_climate_entities": settings.trv_climate_entities,
        "max_demand_delta": result.max_delta,
        "max_demand_current_temperature": leader.map(|l| l.current_temperature),
        "max_demand_target_temperature": leader.map(|l| l.target_temperature),
        "max_demand_trv_entity_id": leader.map(|l| l.entity_id.clone()),
        "max_demand_trv_name": leader.and_then(|l| l.friendly_name.clone()),
        "heater_entity_id": settings.heater_entity_id,
        "away_mode": away,
        "away_temperature": settings.away_temp,
    })
}

pub fn plain_sensor_attributes(settings: &DemandSettings) -> Value {
    json!({
        "friendly_name": FRIENDLY_NAME,
        "icon": ICON,
        "trv_climate_entities": settings.trv_climate_entities,
    })
}
