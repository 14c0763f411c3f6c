//! Commands understood by the controller

use std::fmt;
use tracer_core::{FunctionCode, TracerResult};
use tracer_session::Frame;

/// Load switch parameter values
const LOAD_ON: u8 = 0x01;
const LOAD_OFF: u8 = 0x00;

/// Request issued to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read the real-time data block
    ReadRealTime,
    /// Switch the load output on or off
    SetLoad(bool),
}

impl Command {
    pub fn function_code(&self) -> FunctionCode {
        match self {
            Command::ReadRealTime => FunctionCode::RealTimeData,
            Command::SetLoad(_) => FunctionCode::LoadControl,
        }
    }

    /// Request parameter bytes
    pub fn parameters(&self) -> Vec<u8> {
        match self {
            Command::ReadRealTime => Vec::new(),
            Command::SetLoad(true) => vec![LOAD_ON],
            Command::SetLoad(false) => vec![LOAD_OFF],
        }
    }

    /// Build the request frame addressed to `address`
    pub fn to_request(&self, address: u8) -> TracerResult<Frame> {
        Frame::encode_request(address, self.function_code(), &self.parameters())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ReadRealTime => write!(f, "read real-time data"),
            Command::SetLoad(true) => write!(f, "switch load on"),
            Command::SetLoad(false) => write!(f, "switch load off"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldDecoder;
    use tracer_core::Measurement;

    #[test]
    fn test_request_bytes() {
        let request = Command::ReadRealTime.to_request(0x01).unwrap();
        assert_eq!(
            request.to_bytes(),
            vec![0xEB, 0x90, 0xEB, 0x90, 0xEB, 0x90, 0x01, 0xA0, 0x00, 0x6F, 0x52, 0x7F]
        );

        let request = Command::SetLoad(true).to_request(0x16).unwrap();
        assert_eq!(request.payload(), &[0x01]);
        assert_eq!(request.checksum(), 0xEC88);
        assert_eq!(Command::SetLoad(false).parameters(), vec![0x00]);
    }

    #[test]
    fn test_request_answer_round_trip() {
        let request = Command::ReadRealTime.to_request(0x16).unwrap();

        let mut payload = [0u8; 24];
        payload[0..2].copy_from_slice(&1275u16.to_le_bytes());
        payload[2..4].copy_from_slice(&4120u16.to_le_bytes());
        payload[6..8].copy_from_slice(&50u16.to_le_bytes());
        payload[18] = 1;
        payload[20] = 48;
        payload[21..23].copy_from_slice(&0xFFFFu16.to_le_bytes());
        let response =
            Frame::encode_response(0x16, request.function_code(), &payload).unwrap();
        assert!(request.is_answered_by(&response));

        let reading = FieldDecoder::new().decode_frame(&response).unwrap();
        let data = reading.as_real_time().unwrap();
        assert_eq!(data.battery_voltage, Measurement::Reported(12.75));
        assert_eq!(data.pv_voltage, Measurement::Reported(41.2));
        assert_eq!(data.load_current, Measurement::Reported(0.5));
        assert_eq!(data.battery_full, Measurement::Reported(true));
        assert_eq!(data.battery_temperature, Measurement::Reported(18.0));
        assert_eq!(data.charge_current, Measurement::NotReported);
        assert_eq!(data.charge_power(), Measurement::NotReported);
    }
}
