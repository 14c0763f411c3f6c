//! Typed readings decoded from response payloads

use crate::schema;
use std::fmt;
use tracer_core::{FunctionCode, Measurement, Validity};

/// Value of one named field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(Measurement<f64>),
    Flag(Measurement<bool>),
}

impl FieldValue {
    /// Numeric value for host mapping; flags become 0.0 or 1.0
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(m) => m.value(),
            FieldValue::Flag(m) => m.value().map(|on| if on { 1.0 } else { 0.0 }),
        }
    }

    pub fn validity(&self) -> Validity {
        match self {
            FieldValue::Number(m) => m.validity(),
            FieldValue::Flag(m) => m.validity(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(m) => write!(f, "{}", m),
            FieldValue::Flag(m) => write!(f, "{}", m),
        }
    }
}

/// Real-time data reported by the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealTimeData {
    /// Battery voltage in V
    pub battery_voltage: Measurement<f64>,
    /// Solar panel voltage in V
    pub pv_voltage: Measurement<f64>,
    /// Load current in A
    pub load_current: Measurement<f64>,
    /// Low-voltage disconnect threshold in V
    pub over_discharge_voltage: Measurement<f64>,
    /// Float threshold in V
    pub battery_full_voltage: Measurement<f64>,
    pub load_on: Measurement<bool>,
    pub load_overload: Measurement<bool>,
    pub load_short_circuit: Measurement<bool>,
    pub battery_overload: Measurement<bool>,
    pub battery_over_discharge: Measurement<bool>,
    pub battery_full: Measurement<bool>,
    pub battery_charging: Measurement<bool>,
    /// Battery temperature in °C
    pub battery_temperature: Measurement<f64>,
    /// Charging current in A
    pub charge_current: Measurement<f64>,
}

impl RealTimeData {
    /// Charging power in W
    pub fn charge_power(&self) -> Measurement<f64> {
        self.battery_voltage
            .combine(self.charge_current, |volts, amps| volts * amps)
    }

    /// Load power in W
    pub fn load_power(&self) -> Measurement<f64> {
        self.battery_voltage
            .combine(self.load_current, |volts, amps| volts * amps)
    }

    pub(crate) fn from_payload(payload: &[u8]) -> Self {
        Self {
            battery_voltage: schema::BATTERY_VOLTAGE.decode_number(payload),
            pv_voltage: schema::PV_VOLTAGE.decode_number(payload),
            load_current: schema::LOAD_CURRENT.decode_number(payload),
            over_discharge_voltage: schema::OVER_DISCHARGE_VOLTAGE.decode_number(payload),
            battery_full_voltage: schema::BATTERY_FULL_VOLTAGE.decode_number(payload),
            load_on: schema::LOAD_ON.decode_flag(payload),
            load_overload: schema::LOAD_OVERLOAD.decode_flag(payload),
            load_short_circuit: schema::LOAD_SHORT_CIRCUIT.decode_flag(payload),
            battery_overload: schema::BATTERY_OVERLOAD.decode_flag(payload),
            battery_over_discharge: schema::BATTERY_OVER_DISCHARGE.decode_flag(payload),
            battery_full: schema::BATTERY_FULL.decode_flag(payload),
            battery_charging: schema::BATTERY_CHARGING.decode_flag(payload),
            battery_temperature: schema::BATTERY_TEMPERATURE.decode_number(payload),
            charge_current: schema::CHARGE_CURRENT.decode_number(payload),
        }
    }

    /// Named fields, derived powers included
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        use FieldValue::{Flag, Number};
        vec![
            (schema::BATTERY_VOLTAGE.name, Number(self.battery_voltage)),
            (schema::PV_VOLTAGE.name, Number(self.pv_voltage)),
            (schema::LOAD_CURRENT.name, Number(self.load_current)),
            (schema::OVER_DISCHARGE_VOLTAGE.name, Number(self.over_discharge_voltage)),
            (schema::BATTERY_FULL_VOLTAGE.name, Number(self.battery_full_voltage)),
            (schema::LOAD_ON.name, Flag(self.load_on)),
            (schema::LOAD_OVERLOAD.name, Flag(self.load_overload)),
            (schema::LOAD_SHORT_CIRCUIT.name, Flag(self.load_short_circuit)),
            (schema::BATTERY_OVERLOAD.name, Flag(self.battery_overload)),
            (schema::BATTERY_OVER_DISCHARGE.name, Flag(self.battery_over_discharge)),
            (schema::BATTERY_FULL.name, Flag(self.battery_full)),
            (schema::BATTERY_CHARGING.name, Flag(self.battery_charging)),
            (schema::BATTERY_TEMPERATURE.name, Number(self.battery_temperature)),
            (schema::CHARGE_CURRENT.name, Number(self.charge_current)),
            (schema::CHARGE_POWER, Number(self.charge_power())),
            (schema::LOAD_POWER, Number(self.load_power())),
        ]
    }
}

/// Acknowledgement of a manual load control command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadControlAck {
    /// Load state after the command was applied
    pub load_on: Measurement<bool>,
}

impl LoadControlAck {
    pub(crate) fn from_payload(payload: &[u8]) -> Self {
        Self {
            load_on: schema::LOAD_STATE.decode_flag(payload),
        }
    }

    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![(schema::LOAD_STATE.name, FieldValue::Flag(self.load_on))]
    }
}

/// Decoded response payload, one variant per function code
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    RealTime(RealTimeData),
    LoadControl(LoadControlAck),
}

impl Reading {
    /// Function code this reading was decoded for
    pub fn function_code(&self) -> FunctionCode {
        match self {
            Reading::RealTime(_) => FunctionCode::RealTimeData,
            Reading::LoadControl(_) => FunctionCode::LoadControl,
        }
    }

    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        match self {
            Reading::RealTime(data) => data.fields(),
            Reading::LoadControl(ack) => ack.fields(),
        }
    }

    /// Look up one field by name
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn as_real_time(&self) -> Option<&RealTimeData> {
        match self {
            Reading::RealTime(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_load_control(&self) -> Option<&LoadControlAck> {
        match self {
            Reading::LoadControl(ack) => Some(ack),
            _ => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.fields() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}
