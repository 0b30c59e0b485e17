use super::models::{AugmentedReading, BatteryState, DerivedMetrics, NOT_CHARGING};

/// Full-scale value of the 10-bit light-sensor ADC.
pub const LDR_FULL_SCALE: f64 = 1023.0;

/// Irradiance, in W/m², reported at [`LDR_FULL_SCALE`].
pub const IRRADIANCE_FULL_SCALE_WM2: f64 = 1000.0;

/// Watts from volts and amperes. No rounding.
pub fn compute_power(voltage: f64, current: f64) -> f64 {
    voltage * current
}

/// Linear map of the raw light-sensor value to W/m²: 0 → 0, 1023 → 1000.
pub fn irradiance_from_ldr(ldr: f64) -> f64 {
    ldr * IRRADIANCE_FULL_SCALE_WM2 / LDR_FULL_SCALE
}

/// Overwrite every field the input determines exactly.
///
/// `power`, `batteryState` and `solarIrradiance` are pure functions of the
/// reading; `timeToFull` is `"--"` unless charging. Battery health, the
/// charging estimate and alerts are kept as generated.
pub fn reconcile(mut metrics: DerivedMetrics, input: &AugmentedReading) -> DerivedMetrics {
    metrics.power = input.power;
    metrics.battery_state = BatteryState::from_current(input.reading.current);
    metrics.solar_irradiance = irradiance_from_ldr(input.reading.ldr);
    if metrics.battery_state != BatteryState::Charging {
        metrics.time_to_full = NOT_CHARGING.to_owned();
    }
    metrics
}
