pub(crate) mod codes {
    pub(crate) const ILLEGAL_FUNCTION: u8 = 0x01;
    pub(crate) const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
    pub(crate) const ILLEGAL_DATA_VALUE: u8 = 0x03;
    pub(crate) const SERVER_DEVICE_FAILURE: u8 = 0x04;
    pub(crate) const ACKNOWLEDGE: u8 = 0x05;
    pub(crate) const SERVER_DEVICE_BUSY: u8 = 0x06;
    pub(crate) const MEMORY_PARITY_ERROR: u8 = 0x08;
    pub(crate) const GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;
    pub(crate) const GATEWAY_TARGET_DEVICE_FAILED_TO_RESPOND: u8 = 0x0B;
}

/// Exception codes defined in the Modbus specification
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExceptionCode {
    /// The function code received in the query is not an allowable action for the server
    IllegalFunction,
    /// The data address received in the query is not an allowable address for the server
    IllegalDataAddress,
    /// A value contained in the request is not an allowable value for the server
    IllegalDataValue,
    /// An unrecoverable error occurred while the server was attempting to perform the
    /// requested action
    ServerDeviceFailure,
    /// The server has accepted the request and is processing it
    Acknowledge,
    /// The server is engaged in processing a long-duration command, try again later
    ServerDeviceBusy,
    /// The server attempted to read a record file, but detected a parity error in the memory
    MemoryParityError,
    /// The gateway was unable to allocate an internal communication path for the request
    GatewayPathUnavailable,
    /// No response was obtained from the target device behind a gateway
    GatewayTargetDeviceFailedToRespond,
    /// The exception code received is not defined in the standard
    Unknown(u8),
}

impl From<u8> for ExceptionCode {
    fn from(value: u8) -> Self {
        match value {
            codes::ILLEGAL_FUNCTION => ExceptionCode::IllegalFunction,
            codes::ILLEGAL_DATA_ADDRESS => ExceptionCode::IllegalDataAddress,
            codes::ILLEGAL_DATA_VALUE => ExceptionCode::IllegalDataValue,
            codes::SERVER_DEVICE_FAILURE => ExceptionCode::ServerDeviceFailure,
            codes::ACKNOWLEDGE => ExceptionCode::Acknowledge,
            codes::SERVER_DEVICE_BUSY => ExceptionCode::ServerDeviceBusy,
            codes::MEMORY_PARITY_ERROR => ExceptionCode::MemoryParityError,
            codes::GATEWAY_PATH_UNAVAILABLE => ExceptionCode::GatewayPathUnavailable,
            codes::GATEWAY_TARGET_DEVICE_FAILED_TO_RESPOND => {
                ExceptionCode::GatewayTargetDeviceFailedToRespond
            }
            _ => ExceptionCode::Unknown(value),
        }
    }
}

impl From<ExceptionCode> for u8 {
    fn from(ex: ExceptionCode) -> Self {
        match ex {
            ExceptionCode::IllegalFunction => codes::ILLEGAL_FUNCTION,
            ExceptionCode::IllegalDataAddress => codes::ILLEGAL_DATA_ADDRESS,
            ExceptionCode::IllegalDataValue => codes::ILLEGAL_DATA_VALUE,
            ExceptionCode::ServerDeviceFailure => codes::SERVER_DEVICE_FAILURE,
            ExceptionCode::Acknowledge => codes::ACKNOWLEDGE,
            ExceptionCode::ServerDeviceBusy => codes::SERVER_DEVICE_BUSY,
            ExceptionCode::MemoryParityError => codes::MEMORY_PARITY_ERROR,
            ExceptionCode::GatewayPathUnavailable => codes::GATEWAY_PATH_UNAVAILABLE,
            ExceptionCode::GatewayTargetDeviceFailedToRespond => {
                codes::GATEWAY_TARGET_DEVICE_FAILED_TO_RESPOND
            }
            ExceptionCode::Unknown(value) => value,
        }
    }
}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ExceptionCode::IllegalFunction => f.write_str("illegal function"),
            ExceptionCode::IllegalDataAddress => f.write_str("illegal data address"),
            ExceptionCode::IllegalDataValue => f.write_str("illegal data value"),
            ExceptionCode::ServerDeviceFailure => f.write_str("server device failure"),
            ExceptionCode::Acknowledge => f.write_str("acknowledge"),
            ExceptionCode::ServerDeviceBusy => f.write_str("server device busy"),
            ExceptionCode::MemoryParityError => f.write_str("memory parity error"),
            ExceptionCode::GatewayPathUnavailable => f.write_str("gateway path unavailable"),
            ExceptionCode::GatewayTargetDeviceFailedToRespond => {
                f.write_str("gateway target device failed to respond")
            }
            ExceptionCode::Unknown(code) => write!(f, "unknown exception code: {code}"),
        }
    }
}

/// An exception response returned by the server, together with any textual
/// detail the device attached to it.
///
/// The detail is appended in brackets when the response is displayed, e.g.
/// `illegal data address [register 400 not mapped]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionResponse {
    /// The exception code reported by the server
    pub code: ExceptionCode,
    /// Optional human-readable detail extracted from the response body
    pub detail: Option<String>,
}

impl ExceptionResponse {
    /// Create an exception response without detail text
    pub fn new(code: ExceptionCode) -> Self {
        Self { code, detail: None }
    }

    /// Create an exception response carrying detail text from the device
    pub fn with_detail(code: ExceptionCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}

impl std::fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} [{}]", self.code, detail),
            None => write!(f, "{}", self.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_standard_codes() {
        for raw in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x0A, 0x0B] {
            let code = ExceptionCode::from(raw);
            assert_ne!(code, ExceptionCode::Unknown(raw));
            assert_eq!(u8::from(code), raw);
        }
    }

    #[test]
    fn preserves_unknown_codes() {
        assert_eq!(ExceptionCode::from(0x77), ExceptionCode::Unknown(0x77));
        assert_eq!(u8::from(ExceptionCode::Unknown(0x77)), 0x77);
    }

    #[test]
    fn appends_detail_in_brackets() {
        let ex = ExceptionResponse::with_detail(
            ExceptionCode::IllegalDataAddress,
            "register 400 not mapped",
        );
        assert_eq!(
            ex.to_string(),
            "illegal data address [register 400 not mapped]"
        );
        let plain = ExceptionResponse::new(ExceptionCode::ServerDeviceBusy);
        assert_eq!(plain.to_string(), "server device busy");
    }
}
