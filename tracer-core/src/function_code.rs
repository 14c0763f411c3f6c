use std::fmt;

/// Protocol function code selecting the command and payload schema of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// Query the real-time measurement block (0xA0)
    RealTimeData,
    /// Manually switch the load output on or off (0xAA)
    LoadControl,
    /// Any code this implementation has no schema for
    Other(u8),
}

impl FunctionCode {
    pub const REAL_TIME_DATA: u8 = 0xA0;
    pub const LOAD_CONTROL: u8 = 0xAA;

    /// Get the wire value of this function code
    pub fn code(&self) -> u8 {
        match self {
            FunctionCode::RealTimeData => Self::REAL_TIME_DATA,
            FunctionCode::LoadControl => Self::LOAD_CONTROL,
            FunctionCode::Other(code) => *code,
        }
    }

    /// Check if this code has a known schema
    pub fn is_known(&self) -> bool {
        !matches!(self, FunctionCode::Other(_))
    }
}

impl From<u8> for FunctionCode {
    fn from(code: u8) -> Self {
        match code {
            Self::REAL_TIME_DATA => FunctionCode::RealTimeData,
            Self::LOAD_CONTROL => FunctionCode::LoadControl,
            other => FunctionCode::Other(other),
        }
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> Self {
        code.code()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionCode::RealTimeData => write!(f, "real-time data (0xA0)"),
            FunctionCode::LoadControl => write!(f, "load control (0xAA)"),
            FunctionCode::Other(code) => write!(f, "unknown (0x{:02X})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_from_byte() {
        assert_eq!(FunctionCode::from(0xA0), FunctionCode::RealTimeData);
        assert_eq!(FunctionCode::from(0xAA), FunctionCode::LoadControl);
        assert_eq!(FunctionCode::from(0x42), FunctionCode::Other(0x42));
        assert_eq!(FunctionCode::Other(0x42).code(), 0x42);
        assert!(!FunctionCode::Other(0x42).is_known());
    }
}
