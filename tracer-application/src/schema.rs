//! Payload schemas of the supported commands
//!
//! Multi-byte integers are little-endian. All-bits-set is the controller's
//! "not reported" pattern for every field width.

use bytes::Buf;
use tracer_core::{FunctionCode, Measurement};

/// Payload width of a real-time data response
pub const REAL_TIME_PAYLOAD_LENGTH: usize = 24;

/// Payload width of a load control response
pub const LOAD_CONTROL_PAYLOAD_LENGTH: usize = 1;

/// Offset subtracted from the raw temperature byte, in degrees Celsius
pub const TEMPERATURE_OFFSET: i16 = 30;

/// Physical quantity of a field, which fixes its scaling and plausible range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Hundredths of a volt, 0 to 200 V
    Voltage,
    /// Hundredths of an ampere, 0 to 100 A
    Current,
    /// Degrees Celsius plus 30, -40 to 100 °C
    Temperature,
    /// 0 or 1
    Flag,
}

impl FieldKind {
    fn plausible(&self, raw: u16) -> bool {
        match self {
            FieldKind::Voltage => raw <= 20_000,
            FieldKind::Current => raw <= 10_000,
            FieldKind::Temperature => {
                let celsius = raw as i16 - TEMPERATURE_OFFSET;
                (-40..=100).contains(&celsius)
            }
            FieldKind::Flag => raw <= 1,
        }
    }
}

/// Location and meaning of one field in a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn new(name: &'static str, offset: usize, width: usize, kind: FieldKind) -> Self {
        Self {
            name,
            offset,
            width,
            kind,
        }
    }

    fn sentinel(&self) -> u16 {
        if self.width == 1 { 0xFF } else { 0xFFFF }
    }

    /// Read the raw wire value of this field
    ///
    /// The caller has checked the payload width against the schema.
    pub fn raw(&self, payload: &[u8]) -> u16 {
        let mut field = &payload[self.offset..self.offset + self.width];
        match self.width {
            1 => field.get_u8() as u16,
            _ => field.get_u16_le(),
        }
    }

    /// Decode a numeric field, applying sentinel, range check and scaling
    pub fn decode_number(&self, payload: &[u8]) -> Measurement<f64> {
        self.classify(payload).map(|raw| match self.kind {
            FieldKind::Voltage | FieldKind::Current => raw as f64 / 100.0,
            FieldKind::Temperature => (raw as i16 - TEMPERATURE_OFFSET) as f64,
            FieldKind::Flag => raw as f64,
        })
    }

    /// Decode a status flag
    pub fn decode_flag(&self, payload: &[u8]) -> Measurement<bool> {
        self.classify(payload).map(|raw| raw == 1)
    }

    fn classify(&self, payload: &[u8]) -> Measurement<u16> {
        let raw = self.raw(payload);
        if raw == self.sentinel() {
            Measurement::NotReported
        } else if !self.kind.plausible(raw) {
            Measurement::OutOfRange { raw }
        } else {
            Measurement::Reported(raw)
        }
    }
}

pub const BATTERY_VOLTAGE: FieldSpec = FieldSpec::new("battery_voltage", 0, 2, FieldKind::Voltage);
pub const PV_VOLTAGE: FieldSpec = FieldSpec::new("pv_voltage", 2, 2, FieldKind::Voltage);
pub const LOAD_CURRENT: FieldSpec = FieldSpec::new("load_current", 6, 2, FieldKind::Current);
pub const OVER_DISCHARGE_VOLTAGE: FieldSpec =
    FieldSpec::new("over_discharge_voltage", 8, 2, FieldKind::Voltage);
pub const BATTERY_FULL_VOLTAGE: FieldSpec =
    FieldSpec::new("battery_full_voltage", 10, 2, FieldKind::Voltage);
pub const LOAD_ON: FieldSpec = FieldSpec::new("load_on", 12, 1, FieldKind::Flag);
pub const LOAD_OVERLOAD: FieldSpec = FieldSpec::new("load_overload", 13, 1, FieldKind::Flag);
pub const LOAD_SHORT_CIRCUIT: FieldSpec =
    FieldSpec::new("load_short_circuit", 14, 1, FieldKind::Flag);
pub const BATTERY_OVERLOAD: FieldSpec = FieldSpec::new("battery_overload", 16, 1, FieldKind::Flag);
pub const BATTERY_OVER_DISCHARGE: FieldSpec =
    FieldSpec::new("battery_over_discharge", 17, 1, FieldKind::Flag);
pub const BATTERY_FULL: FieldSpec = FieldSpec::new("battery_full", 18, 1, FieldKind::Flag);
pub const BATTERY_CHARGING: FieldSpec = FieldSpec::new("battery_charging", 19, 1, FieldKind::Flag);
pub const BATTERY_TEMPERATURE: FieldSpec =
    FieldSpec::new("battery_temperature", 20, 1, FieldKind::Temperature);
pub const CHARGE_CURRENT: FieldSpec = FieldSpec::new("charge_current", 21, 2, FieldKind::Current);

/// Fields of the real-time data payload, in wire order
pub const REAL_TIME_FIELDS: [FieldSpec; 14] = [
    BATTERY_VOLTAGE,
    PV_VOLTAGE,
    LOAD_CURRENT,
    OVER_DISCHARGE_VOLTAGE,
    BATTERY_FULL_VOLTAGE,
    LOAD_ON,
    LOAD_OVERLOAD,
    LOAD_SHORT_CIRCUIT,
    BATTERY_OVERLOAD,
    BATTERY_OVER_DISCHARGE,
    BATTERY_FULL,
    BATTERY_CHARGING,
    BATTERY_TEMPERATURE,
    CHARGE_CURRENT,
];

pub const CHARGE_POWER: &str = "charge_power";
pub const LOAD_POWER: &str = "load_power";

/// Real-time fields computed from other fields rather than read
pub const DERIVED_FIELDS: [&str; 2] = [CHARGE_POWER, LOAD_POWER];

/// Names of every real-time field, derived fields included
pub fn real_time_field_names() -> impl Iterator<Item = &'static str> {
    REAL_TIME_FIELDS
        .into_iter()
        .map(|spec| spec.name)
        .chain(DERIVED_FIELDS)
}

/// Resulting load state in a load control response
pub const LOAD_STATE: FieldSpec = FieldSpec::new("load_on", 0, 1, FieldKind::Flag);

/// Expected response payload width for a function code
///
/// Returns `None` for function codes without a known schema.
pub fn response_width(function_code: FunctionCode) -> Option<usize> {
    match function_code {
        FunctionCode::RealTimeData => Some(REAL_TIME_PAYLOAD_LENGTH),
        FunctionCode::LoadControl => Some(LOAD_CONTROL_PAYLOAD_LENGTH),
        FunctionCode::Other(_) => None,
    }
}
