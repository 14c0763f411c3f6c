//! Records handed to the host and the consumer interface receiving them

use crate::poll::CycleFailure;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tracer_application::schema::real_time_field_names;
use tracer_application::Reading;
use tracer_core::{TracerError, TracerResult};

/// Unit system of record values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSystem {
    /// V, A, W and °C
    Metric,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
        }
    }
}

/// One observation in host terms
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Time of the observation, whole seconds
    pub timestamp: DateTime<Utc>,
    pub units: UnitSystem,
    /// Host field name to value
    pub values: BTreeMap<String, f64>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.units.as_str())?;
        for (name, value) in &self.values {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}

/// Mapping from host field names to reading field names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorMap {
    entries: BTreeMap<String, String>,
}

impl SensorMap {
    /// Create a map, rejecting reading fields that do not exist
    pub fn new(entries: BTreeMap<String, String>) -> TracerResult<Self> {
        for (host, field) in &entries {
            if !real_time_field_names().any(|known| known == field.as_str()) {
                return Err(TracerError::Config(format!(
                    "sensor_map entry {:?} refers to unknown field {:?}",
                    host, field
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Every real-time field under its own name
    pub fn identity() -> Self {
        Self {
            entries: real_time_field_names()
                .map(|name| (name.to_string(), name.to_string()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(host, field)| (host.as_str(), field.as_str()))
    }

    /// Build a record from a reading
    ///
    /// Fields that were not reported or fell out of range are left out.
    pub fn build_record(&self, reading: &Reading, now: DateTime<Utc>) -> Record {
        let fields: BTreeMap<&str, f64> = reading
            .fields()
            .into_iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name, v)))
            .collect();

        let values = self
            .iter()
            .filter_map(|(host, field)| fields.get(field).map(|v| (host.to_string(), *v)))
            .collect();

        Record {
            timestamp: now.duration_round(TimeDelta::seconds(1)).unwrap_or(now),
            units: UnitSystem::Metric,
            values,
        }
    }
}

impl Default for SensorMap {
    fn default() -> Self {
        Self::identity()
    }
}

/// Receiver of poll outcomes
///
/// Exactly one of the two methods is called per cycle.
#[cfg_attr(test, mockall::automock)]
pub trait RecordConsumer: Send {
    /// A cycle produced a record
    fn accept(&mut self, record: Record);

    /// A cycle failed after its retries were spent
    fn missed(&mut self, failure: &CycleFailure);
}

/// Consumer writing every outcome to the log
#[derive(Debug, Default)]
pub struct LoggingConsumer {
    accepted: u64,
    missed: u64,
}

impl LoggingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn missed_count(&self) -> u64 {
        self.missed
    }
}

impl RecordConsumer for LoggingConsumer {
    fn accept(&mut self, record: Record) {
        self.accepted += 1;
        log::info!("record: {}", record);
    }

    fn missed(&mut self, failure: &CycleFailure) {
        self.missed += 1;
        log::warn!("no record this cycle: {}", failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tracer_application::FieldDecoder;
    use tracer_core::FunctionCode;

    fn reading(battery_voltage: u16) -> Reading {
        let mut payload = [0u8; 24];
        payload[0..2].copy_from_slice(&battery_voltage.to_le_bytes());
        payload[2..4].copy_from_slice(&3600u16.to_le_bytes());
        payload[20] = 55;
        payload[21..23].copy_from_slice(&300u16.to_le_bytes());
        FieldDecoder::new()
            .decode(&payload, FunctionCode::RealTimeData)
            .unwrap()
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_identity_map_covers_every_field() {
        let map = SensorMap::identity();
        assert_eq!(map.len(), 16);
        let record = map.build_record(&reading(1340), at(1_700_000_000_000));
        assert_eq!(record.get("battery_voltage"), Some(13.4));
        assert_eq!(record.get("pv_voltage"), Some(36.0));
        assert_eq!(record.get("battery_temperature"), Some(25.0));
        assert_eq!(record.get("load_on"), Some(0.0));
        assert_eq!(record.units.as_str(), "metric");
    }

    #[test]
    fn test_custom_map_renames_and_drops_unreported() {
        let entries = BTreeMap::from([
            ("supplyVoltage".to_string(), "battery_voltage".to_string()),
            ("outTemp".to_string(), "battery_temperature".to_string()),
            ("chargePower".to_string(), "charge_power".to_string()),
        ]);
        let map = SensorMap::new(entries).unwrap();

        let record = map.build_record(&reading(0xFFFF), at(1_700_000_000_000));
        assert_eq!(record.get("outTemp"), Some(25.0));
        assert_eq!(record.get("supplyVoltage"), None);
        assert_eq!(record.get("chargePower"), None);
        assert_eq!(record.values.len(), 1);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let entries = BTreeMap::from([("x".to_string(), "flux_capacitor".to_string())]);
        assert!(matches!(SensorMap::new(entries), Err(TracerError::Config(_))));
    }

    #[test]
    fn test_timestamp_rounded_to_second() {
        let map = SensorMap::identity();
        let record = map.build_record(&reading(1340), at(1_700_000_000_600));
        assert_eq!(record.timestamp, at(1_700_000_001_000));
        let record = map.build_record(&reading(1340), at(1_700_000_000_400));
        assert_eq!(record.timestamp, at(1_700_000_000_000));
    }

    #[test]
    fn test_logging_consumer_counts() {
        let mut consumer = LoggingConsumer::new();
        consumer.accept(SensorMap::identity().build_record(&reading(1340), Utc::now()));
        consumer.missed(&CycleFailure {
            reason: crate::poll::FailureReason::Timeout,
            attempts: 3,
            detail: "Timeout".to_string(),
        });
        assert_eq!(consumer.accepted(), 1);
        assert_eq!(consumer.missed_count(), 1);
    }
}
