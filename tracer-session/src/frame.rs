//! Tracer frame structure and encoding
//!
//! ```text
//! [EB 90 EB 90 EB 90][address][function][length][payload ...][crc hi][crc lo][7F]
//! ```
//!
//! Requests are preceded on the wire by a wake-up preamble (`AA 55` three
//! times) which is not part of the frame.

use crate::checksum;
use std::fmt;
use tracer_core::{FunctionCode, TracerError, TracerResult};

/// Wake-up preamble written before every request
pub const PREAMBLE: [u8; 6] = [0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55];

/// Sync marker opening every frame
pub const SYNC_MARKER: [u8; 6] = [0xEB, 0x90, 0xEB, 0x90, 0xEB, 0x90];

/// Trailer closing every frame
pub const TRAILER: u8 = 0x7F;

/// Address, function code and length bytes
pub const HEADER_LENGTH: usize = 3;

pub const CHECKSUM_LENGTH: usize = 2;

/// The length field is a single byte
pub const MAX_PAYLOAD_LENGTH: usize = u8::MAX as usize;

/// Bytes a frame occupies besides its payload
pub const FRAME_OVERHEAD: usize = SYNC_MARKER.len() + HEADER_LENGTH + CHECKSUM_LENGTH + 1;

/// Direction of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Response,
}

/// Tracer frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    address: u8,
    function_code: FunctionCode,
    payload: Vec<u8>,
    checksum: u16,
}

impl Frame {
    /// Build a request frame
    ///
    /// # Arguments
    /// * `address` - Controller address
    /// * `function_code` - Command to issue
    /// * `parameters` - Request parameters
    ///
    /// # Errors
    /// Returns `TracerError::Encoding` if the parameters do not fit the
    /// one-byte length field, or do not have the fixed width a known
    /// command requires.
    pub fn encode_request(
        address: u8,
        function_code: FunctionCode,
        parameters: &[u8],
    ) -> TracerResult<Self> {
        if let Some(width) = request_parameter_width(function_code) {
            if parameters.len() != width {
                return Err(TracerError::Encoding(format!(
                    "{} takes {} parameter byte(s), got {}",
                    function_code,
                    width,
                    parameters.len()
                )));
            }
        }
        Self::build(FrameKind::Request, address, function_code, parameters)
    }

    /// Build a response frame, as a controller would send it
    pub fn encode_response(
        address: u8,
        function_code: FunctionCode,
        payload: &[u8],
    ) -> TracerResult<Self> {
        Self::build(FrameKind::Response, address, function_code, payload)
    }

    fn build(
        kind: FrameKind,
        address: u8,
        function_code: FunctionCode,
        payload: &[u8],
    ) -> TracerResult<Self> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(TracerError::Encoding(format!(
                "payload of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_PAYLOAD_LENGTH
            )));
        }

        let mut covered = Vec::with_capacity(HEADER_LENGTH + payload.len());
        covered.push(address);
        covered.push(function_code.code());
        covered.push(payload.len() as u8);
        covered.extend_from_slice(payload);

        Ok(Self {
            kind,
            address,
            function_code,
            payload: payload.to_vec(),
            checksum: checksum::compute(&covered),
        })
    }

    /// Assemble a frame from fields already validated by the decoder
    pub(crate) fn from_validated(
        address: u8,
        function_code: FunctionCode,
        payload: Vec<u8>,
        checksum: u16,
    ) -> Self {
        Self {
            kind: FrameKind::Response,
            address,
            function_code,
            payload,
            checksum,
        }
    }

    /// Encode frame to wire bytes (without preamble)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.wire_length());
        result.extend_from_slice(&SYNC_MARKER);
        result.push(self.address);
        result.push(self.function_code.code());
        result.push(self.payload.len() as u8);
        result.extend_from_slice(&self.payload);
        result.extend_from_slice(&checksum::to_bytes(self.checksum));
        result.push(TRAILER);
        result
    }

    /// Number of bytes this frame occupies on the wire
    pub fn wire_length(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn function_code(&self) -> FunctionCode {
        self.function_code
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Check whether `response` answers this request
    pub fn is_answered_by(&self, response: &Frame) -> bool {
        response.address == self.address && response.function_code == self.function_code
    }
}

/// Fixed request parameter width of a known command
fn request_parameter_width(function_code: FunctionCode) -> Option<usize> {
    match function_code {
        FunctionCode::RealTimeData => Some(0),
        FunctionCode::LoadControl => Some(1),
        FunctionCode::Other(_) => None,
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} frame: address=0x{:02X}, function={}, len={}, crc=0x{:04X}",
            self.kind,
            self.address,
            self.function_code,
            self.payload.len(),
            self.checksum
        )
    }
}
