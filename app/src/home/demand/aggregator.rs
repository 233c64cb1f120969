use crate::core::unit::DegreeCelsius;

//below any delta a real thermostat can produce, so the first valid TRV always takes the lead
const LEADER_SEED_DELTA: DegreeCelsius = DegreeCelsius(-100.0);

#[derive(Debug, Clone)]
pub struct TrvReading {
    pub entity_id: String,
    pub raw_state: String,
    pub hvac_action: Option<String>,
    pub current_temperature: Option<DegreeCelsius>,
    pub target_temperature: Option<DegreeCelsius>,
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrvLeader {
    pub entity_id: String,
    pub current_temperature: DegreeCelsius,
    pub target_temperature: DegreeCelsius,
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AggregationResult {
    pub is_demanding: bool,
    //clamped for reporting
    pub max_delta: DegreeCelsius,
    //the signed delta the leader was selected with
    pub leader_delta_raw: DegreeCelsius,
    pub leader: Option<TrvLeader>,
}

pub fn aggregate(readings: &[TrvReading], away: bool, away_temp: DegreeCelsius) -> AggregationResult {
    let mut demanding_trvs = 0;
    let mut max_delta = LEADER_SEED_DELTA;
    let mut leader: Option<TrvLeader> = None;

    for reading in readings {
        //a TRV without both temperatures contributes nothing
        let (Some(current), Some(target)) = (reading.current_temperature, reading.target_temperature) else {
            continue;
        };

        let effective_target = if away { away_temp } else { target };
        let delta = effective_target - current;

        if reading.hvac_action.as_deref() == Some("heating")
            || (reading.raw_state == "heat" && delta > DegreeCelsius(0.0))
        {
            demanding_trvs += 1;
        }

        //strictly greater, so ties keep the earlier-seen TRV
        if delta > max_delta {
            max_delta = delta;
            leader = Some(TrvLeader {
                entity_id: reading.entity_id.clone(),
                current_temperature: current,
                target_temperature: target,
                friendly_name: reading.friendly_name.clone(),
            });
        }
    }

    let (max_delta, leader_delta_raw) = if leader.is_some() {
        //a negative deficit is reported as zero
        (DegreeCelsius(max_delta.0.max(0.0)), max_delta)
    } else {
        (DegreeCelsius(0.0), DegreeCelsius(0.0))
    };

    AggregationResult {
        is_demanding: demanding_trvs > 0,
        max_delta,
        leader_delta_raw,
        leader,
    }
}

//The plain-sensor rule: unadjusted by away mode, strict comparison, and a TRV
//without temperatures still counts when its hvac_action reports heating. Not
//to be unified with aggregate().
pub fn any_trv_calls_for_heat(readings: &[TrvReading]) -> bool {
    readings.iter().any(|reading| {
        reading.hvac_action.as_deref() == Some("heating")
            || (reading.raw_state == "heat"
                && matches!(
                    (reading.current_temperature, reading.target_temperature),
                    (Some(current), Some(target)) if current < target
                ))
    })
}
