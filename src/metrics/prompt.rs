use super::models::AugmentedReading;

/// Nominal capacity the model assumes when estimating time to full charge.
pub const NOMINAL_BATTERY_CAPACITY_KWH: f64 = 5.0;

/// Alert triggers spelled out to the model.
pub const ALERT_TEMPERATURE_C: f64 = 40.0;
pub const ALERT_VOLTAGE_V: f64 = 240.0;

/// Render the derivation prompt. Sensor values are embedded verbatim.
pub fn derivation_prompt(input: &AugmentedReading) -> String {
    let r = &input.reading;
    format!(
        "You are monitoring a household node in a solar microgrid.\n\
         \n\
         Latest sensor reading:\n\
         - Community: {community}\n\
         - Voltage: {voltage} V\n\
         - Current: {current} A\n\
         - Power: {power} W\n\
         - Temperature: {temperature} °C\n\
         - Light sensor (LDR, 0-1023): {ldr}\n\
         \n\
         Derive the following:\n\
         1. power: repeat the power value above unchanged.\n\
         2. batteryHealth: a percentage from 0 to 100. Batteries age fastest outside the \
         optimal 15-25 °C band; the further the temperature is from that band, the lower \
         the health.\n\
         3. batteryState: \"Charging\" if current is positive, \"Discharging\" if current is \
         negative, \"Idle\" if current is zero.\n\
         4. timeToFull: only while charging, estimate the time to full charge of a nominal \
         {capacity} kWh battery at the current charging power, formatted as \
         \"<hours>h <minutes>m\". Use \"--\" when not charging.\n\
         5. solarIrradiance: scale the light sensor linearly to W/m², where 0 is 0 W/m² and \
         1023 is about 1000 W/m².\n\
         6. maintenanceAlerts: a list of {{id, title, description}} entries, empty when \
         nothing needs attention. Raise an alert when temperature is above {alert_temp} °C, \
         when voltage is above {alert_voltage} V, or when the light level indicates daylight \
         but the node is not producing power.\n",
        community = r.community_id,
        voltage = r.voltage,
        current = r.current,
        power = input.power,
        temperature = r.temperature,
        ldr = r.ldr,
        capacity = NOMINAL_BATTERY_CAPACITY_KWH,
        alert_temp = ALERT_TEMPERATURE_C,
        alert_voltage = ALERT_VOLTAGE_V,
    )
}
