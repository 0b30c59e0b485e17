use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::reconcile::compute_power;
use crate::genai::StructuredOutput;

/// Literal used for `timeToFull` whenever the battery is not charging.
pub const NOT_CHARGING: &str = "--";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One transmission from a household node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    #[validate(length(min = 1, message = "communityId must not be empty"))]
    pub community_id: String,

    /// Volts
    #[validate(custom(function = "validate_finite"))]
    pub voltage: f64,

    /// Amperes. Positive while charging, negative while discharging.
    #[validate(custom(function = "validate_finite"))]
    pub current: f64,

    /// Degrees Celsius
    #[validate(custom(function = "validate_finite"))]
    pub temperature: f64,

    /// Raw light-sensor ADC value, 0–1023.
    #[validate(range(min = 0.0, max = 1023.0, message = "ldr must be between 0 and 1023"))]
    pub ldr: f64,
}

/// A reading plus the power computed from it. Lives for one derivation only.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedReading {
    pub reading: SensorReading,
    /// Watts, `voltage × current`, unrounded.
    pub power: f64,
}

impl AugmentedReading {
    pub fn new(reading: SensorReading) -> Self {
        let power = compute_power(reading.voltage, reading.current);
        Self { reading, power }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum BatteryState {
    Charging,
    Discharging,
    #[default]
    Idle,
}

impl BatteryState {
    /// Sign of the battery current decides the state; exactly zero is idle.
    pub fn from_current(current: f64) -> Self {
        if current > 0.0 {
            Self::Charging
        } else if current < 0.0 {
            Self::Discharging
        } else {
            Self::Idle
        }
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Charging => "Charging",
            Self::Discharging => "Discharging",
            Self::Idle => "Idle",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct MaintenanceAlert {
    #[validate(length(min = 1, message = "alert id must not be empty"))]
    pub id: String,

    #[validate(length(min = 1, message = "alert title must not be empty"))]
    pub title: String,

    #[serde(default)]
    pub description: String,
}

/// Higher-level metrics for one reading.
///
/// Doubles as the structured output requested from the completion service.
/// `power`, `batteryState` and `solarIrradiance` are always overwritten from
/// the reading, so the model's values for them are parsed leniently and
/// never fail a derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    /// Watts
    #[serde(default, deserialize_with = "lenient_f64")]
    pub power: f64,

    #[validate(range(min = 0.0, max = 100.0, message = "batteryHealth must be between 0 and 100"))]
    pub battery_health: f64,

    #[serde(default, deserialize_with = "lenient_battery_state")]
    pub battery_state: BatteryState,

    /// `"<hours>h <minutes>m"` while charging, `"--"` otherwise.
    #[validate(length(min = 1, message = "timeToFull must not be empty"))]
    pub time_to_full: String,

    /// W/m²
    #[serde(default, deserialize_with = "lenient_f64")]
    pub solar_irradiance: f64,

    #[serde(default)]
    #[validate(nested)]
    pub maintenance_alerts: Vec<MaintenanceAlert>,
}

impl StructuredOutput for DerivedMetrics {
    fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "power": {
                    "type": "NUMBER",
                    "description": "Power in watts, copied from the input."
                },
                "batteryHealth": {
                    "type": "NUMBER",
                    "description": "Estimated battery health percentage, 0 to 100."
                },
                "batteryState": {
                    "type": "STRING",
                    "enum": ["Charging", "Discharging", "Idle"]
                },
                "timeToFull": {
                    "type": "STRING",
                    "description": "Formatted as '<hours>h <minutes>m', or '--' when not charging."
                },
                "solarIrradiance": {
                    "type": "NUMBER",
                    "description": "Solar irradiance in W/m²."
                },
                "maintenanceAlerts": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "title": { "type": "STRING" },
                            "description": { "type": "STRING" }
                        },
                        "required": ["id", "title", "description"]
                    }
                }
            },
            "required": [
                "batteryHealth",
                "batteryState",
                "timeToFull",
                "solarIrradiance",
                "maintenanceAlerts"
            ]
        })
    }
}

/// Any number, or a numeric string; everything else reads as zero.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .unwrap_or_default())
}

/// Case-insensitive state name; anything unrecognised reads as `Idle`.
fn lenient_battery_state<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BatteryState, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let state = match value.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("charging") => BatteryState::Charging,
        Some("discharging") => BatteryState::Discharging,
        _ => BatteryState::Idle,
    };
    Ok(state)
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

pub fn validate_finite(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        let mut err = ValidationError::new("not_finite");
        err.message = Some("value must be a finite number".into());
        Err(err)
    }
}

pub fn validate_non_negative(value: f64) -> Result<(), ValidationError> {
    validate_finite(value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("negative");
        err.message = Some("value must not be negative".into());
        Err(err)
    }
}
