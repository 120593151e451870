use crate::types::ThermostatMode;
use crate::{Error, Result};

/// Separation assumed when a thermostat does not report `setpointdelta`.
pub const DEFAULT_SETPOINT_DELTA_F: f64 = 2.0;

/// Round to the nearest whole degree; exact halves round up.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Display target temperature for a mode and its setpoints.
///
/// AUTO reports the midpoint of the two setpoints rounded to a whole degree;
/// OFF has no target.
pub fn target_temp(mode: ThermostatMode, cool_f: Option<f64>, heat_f: Option<f64>) -> Option<f64> {
    match mode {
        ThermostatMode::Off => None,
        ThermostatMode::Heat => heat_f,
        ThermostatMode::Cool => cool_f,
        ThermostatMode::Auto => {
            let (cool, heat) = (cool_f?, heat_f?);
            Some(round_half_up(heat + (cool - heat) / 2.0))
        }
    }
}

/// Setpoints to send so the thermostat's target becomes `desired_target`.
///
/// Returns `(cool_f, heat_f)`. HEAT and COOL replace only their own setpoint.
/// AUTO splits `setpoint_delta_f` symmetrically around the target. OFF leaves
/// both untouched.
pub fn corrected_setpoints(
    mode: ThermostatMode,
    desired_target: f64,
    current_cool_f: Option<f64>,
    current_heat_f: Option<f64>,
    setpoint_delta_f: f64,
) -> (Option<f64>, Option<f64>) {
    match mode {
        ThermostatMode::Off => (current_cool_f, current_heat_f),
        ThermostatMode::Heat => (current_cool_f, Some(desired_target)),
        ThermostatMode::Cool => (Some(desired_target), current_heat_f),
        ThermostatMode::Auto => {
            let half = setpoint_delta_f / 2.0;
            (Some(desired_target + half), Some(desired_target - half))
        }
    }
}

/// AUTO mode firmware rule: cool must sit at least `setpoint_delta_f` above heat.
pub fn check_setpoint_separation(cool_f: f64, heat_f: f64, setpoint_delta_f: f64) -> Result<()> {
    if cool_f - heat_f < setpoint_delta_f {
        return Err(Error::InvalidSetpointSeparation {
            heat_f,
            cool_f,
            delta_f: setpoint_delta_f,
        });
    }
    Ok(())
}
