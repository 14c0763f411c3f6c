//! Payload decoding into typed readings

use crate::reading::{LoadControlAck, RealTimeData, Reading};
use crate::schema;
use tracer_core::{FunctionCode, TracerError, TracerResult};
use tracer_session::Frame;

/// Decoder mapping response payloads onto their fixed schemas
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldDecoder;

impl FieldDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a response payload
    ///
    /// # Errors
    /// Returns `TracerError::SchemaMismatch` if the function code has no
    /// known schema or the payload width differs from the schema width.
    pub fn decode(&self, payload: &[u8], function_code: FunctionCode) -> TracerResult<Reading> {
        let build: fn(&[u8]) -> Reading = match function_code {
            FunctionCode::RealTimeData => real_time_reading,
            FunctionCode::LoadControl => load_control_reading,
            FunctionCode::Other(_) => return Err(no_schema(function_code)),
        };
        let expected =
            schema::response_width(function_code).ok_or_else(|| no_schema(function_code))?;

        if payload.len() != expected {
            return Err(TracerError::SchemaMismatch(format!(
                "{} payload is {} bytes, schema expects {}",
                function_code,
                payload.len(),
                expected
            )));
        }

        let reading = build(payload);
        log::trace!("decoded {}", reading);
        Ok(reading)
    }

    /// Decode the payload of a received frame
    pub fn decode_frame(&self, frame: &Frame) -> TracerResult<Reading> {
        self.decode(frame.payload(), frame.function_code())
    }
}

fn no_schema(function_code: FunctionCode) -> TracerError {
    TracerError::SchemaMismatch(format!("no schema for function code {}", function_code))
}

fn real_time_reading(payload: &[u8]) -> Reading {
    Reading::RealTime(RealTimeData::from_payload(payload))
}

fn load_control_reading(payload: &[u8]) -> Reading {
    Reading::LoadControl(LoadControlAck::from_payload(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracer_core::{Measurement, Validity};

    /// 13.40 V battery, 36.00 V panel, 1.25 A load, load on, charging at
    /// 3.00 A, 25 °C
    const PAYLOAD: [u8; 24] = [
        0x3C, 0x05, 0x10, 0x0E, 0x00, 0x00, 0x7D, 0x00, 0x4C, 0x04, 0xA0, 0x05, 0x01, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x37, 0x2C, 0x01, 0x00,
    ];

    fn real_time(payload: &[u8]) -> RealTimeData {
        match FieldDecoder::new().decode(payload, FunctionCode::RealTimeData) {
            Ok(Reading::RealTime(data)) => data,
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_real_time() {
        let data = real_time(&PAYLOAD);
        assert_eq!(data.battery_voltage, Measurement::Reported(13.4));
        assert_eq!(data.pv_voltage, Measurement::Reported(36.0));
        assert_eq!(data.load_current, Measurement::Reported(1.25));
        assert_eq!(data.over_discharge_voltage, Measurement::Reported(11.0));
        assert_eq!(data.battery_full_voltage, Measurement::Reported(14.4));
        assert_eq!(data.load_on, Measurement::Reported(true));
        assert_eq!(data.load_overload, Measurement::Reported(false));
        assert_eq!(data.battery_charging, Measurement::Reported(true));
        assert_eq!(data.battery_full, Measurement::Reported(false));
        assert_eq!(data.battery_temperature, Measurement::Reported(25.0));
        assert_eq!(data.charge_current, Measurement::Reported(3.0));

        let charge_power = data.charge_power().value().unwrap();
        assert!((charge_power - 40.2).abs() < 1e-9);
        let load_power = data.load_power().value().unwrap();
        assert!((load_power - 16.75).abs() < 1e-9);
    }

    #[test]
    fn test_sentinel_battery_voltage_is_not_reported() {
        let mut payload = PAYLOAD;
        payload[0] = 0xFF;
        payload[1] = 0xFF;
        let data = real_time(&payload);
        assert_eq!(data.battery_voltage, Measurement::NotReported);
        assert_eq!(data.battery_voltage.value(), None);
        // Derived powers depend on the battery voltage
        assert_eq!(data.charge_power(), Measurement::NotReported);
        assert_eq!(data.load_power().validity(), Validity::NotReported);
        // Unrelated fields are untouched
        assert_eq!(data.pv_voltage, Measurement::Reported(36.0));
    }

    #[test]
    fn test_wrong_lengths_are_schema_mismatch() {
        let decoder = FieldDecoder::new();
        for len in [0, 1, 23, 25, 48] {
            let payload = vec![0u8; len];
            assert!(
                matches!(
                    decoder.decode(&payload, FunctionCode::RealTimeData),
                    Err(TracerError::SchemaMismatch(_))
                ),
                "length {}",
                len
            );
        }
        assert!(matches!(
            decoder.decode(&[0x01, 0x00], FunctionCode::LoadControl),
            Err(TracerError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_unknown_function_code_is_schema_mismatch() {
        assert!(matches!(
            FieldDecoder::new().decode(&PAYLOAD, FunctionCode::Other(0xA1)),
            Err(TracerError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_decode_load_control() {
        let decoder = FieldDecoder::new();
        let reading = decoder.decode(&[0x00], FunctionCode::LoadControl).unwrap();
        assert_eq!(
            reading.as_load_control().map(|ack| ack.load_on),
            Some(Measurement::Reported(false))
        );
        assert_eq!(reading.function_code(), FunctionCode::LoadControl);
    }

    #[test]
    fn test_fields_are_stable() {
        let reading = FieldDecoder::new()
            .decode(&PAYLOAD, FunctionCode::RealTimeData)
            .unwrap();
        let names: Vec<&str> = reading.fields().iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "battery_voltage");
        assert_eq!(names[15], "load_power");
        assert_eq!(
            reading.field("battery_temperature").and_then(|v| v.as_f64()),
            Some(25.0)
        );
        assert_eq!(reading.field("load_on").and_then(|v| v.as_f64()), Some(1.0));
        assert!(reading.field("no_such_field").is_none());
    }

    #[test]
    fn test_decode_frame() {
        let frame = Frame::encode_response(0x16, FunctionCode::RealTimeData, &PAYLOAD).unwrap();
        let reading = FieldDecoder::new().decode_frame(&frame).unwrap();
        assert!(reading.as_real_time().is_some());
    }
}
