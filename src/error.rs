use crate::codec::ValueType;
use crate::exception::ExceptionResponse;
use crate::types::RegisterBank;

/// The errors that can occur when making a request against a device
#[derive(Clone, Debug, PartialEq)]
pub enum RequestError {
    /// No connection exists to the server and the mode does not allow opening one
    NoConnection,
    /// The device task has shut down and can no longer process requests
    Shutdown,
    /// Timeout occurred before receiving a response from the server
    ResponseTimeout,
    /// An I/O error occurred on the underlying stream
    Io(std::io::ErrorKind),
    /// A connect attempt failed
    Connect(ConnectError),
    /// The server returned a Modbus exception response
    Exception(ExceptionResponse),
    /// The value cannot be represented in the requested register type
    BadValue(InvalidValue),
    /// The request was rejected before any I/O because of bad configuration
    BadConfig(InvalidConfig),
}

impl std::error::Error for RequestError {}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RequestError::NoConnection => f.write_str("no connection exists to the server"),
            RequestError::Shutdown => f.write_str("the device task has been shut down"),
            RequestError::ResponseTimeout => {
                f.write_str("timeout occurred before receiving a response from the server")
            }
            RequestError::Io(kind) => write!(f, "I/O error: {kind}"),
            RequestError::Connect(err) => write!(f, "{err}"),
            RequestError::Exception(ex) => write!(f, "server exception: {ex}"),
            RequestError::BadValue(err) => write!(f, "{err}"),
            RequestError::BadConfig(err) => write!(f, "{err}"),
        }
    }
}

impl From<ConnectError> for RequestError {
    fn from(err: ConnectError) -> Self {
        RequestError::Connect(err)
    }
}

impl From<ExceptionResponse> for RequestError {
    fn from(ex: ExceptionResponse) -> Self {
        RequestError::Exception(ex)
    }
}

impl From<InvalidValue> for RequestError {
    fn from(err: InvalidValue) -> Self {
        RequestError::BadValue(err)
    }
}

impl From<InvalidConfig> for RequestError {
    fn from(err: InvalidConfig) -> Self {
        RequestError::BadConfig(err)
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err.kind())
    }
}

/// Reasons a connect attempt can fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectError {
    /// The server actively refused the connection
    Refused,
    /// The connect attempt did not complete within the configured timeout
    TimedOut,
    /// The socket reports that it is already connected.
    ///
    /// The connection manager treats this as success, never as failure.
    AlreadyConnected,
    /// Any other I/O error raised while connecting
    Io(std::io::ErrorKind),
}

impl std::error::Error for ConnectError {}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConnectError::Refused => f.write_str("connection refused"),
            ConnectError::TimedOut => f.write_str("connect attempt timed out"),
            ConnectError::AlreadyConnected => f.write_str("socket is already connected"),
            ConnectError::Io(kind) => write!(f, "connect failed: {kind}"),
        }
    }
}

/// Validation failures raised before any buffer is built or I/O performed
#[derive(Clone, Debug, PartialEq)]
pub enum InvalidValue {
    /// The numeric value is outside the representable range of the target type
    OutOfRange {
        /// Display form of the rejected value
        value: String,
        /// The register type it was validated against
        ty: ValueType,
    },
    /// The supplied value variant does not match the register type
    TypeMismatch {
        /// The register type the value was checked against
        ty: ValueType,
    },
    /// The register type cannot be encoded into registers at all
    NotEncodable(ValueType),
    /// A response buffer did not contain the number of bytes the type requires
    BufferLength {
        /// Bytes the type requires
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },
    /// Bit positions within a register are 1-based and at most 16
    BadBitIndex(u16),
}

impl std::error::Error for InvalidValue {}

impl std::fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidValue::OutOfRange { value, ty } => {
                write!(f, "value {value} is out of range for {ty}")
            }
            InvalidValue::TypeMismatch { ty } => {
                write!(f, "supplied value does not match register type {ty}")
            }
            InvalidValue::NotEncodable(ty) => {
                write!(f, "register type {ty} cannot be written")
            }
            InvalidValue::BufferLength { expected, actual } => write!(
                f,
                "response contains {actual} bytes where {expected} were expected"
            ),
            InvalidValue::BadBitIndex(bit) => {
                write!(f, "bit index {bit} is outside the valid range 1..=16")
            }
        }
    }
}

/// Configuration problems detected before any I/O
#[derive(Clone, Debug, PartialEq)]
pub enum InvalidConfig {
    /// The register type tag is not part of the supported set
    UnknownValueType(String),
    /// The register bank selector is not part of the supported set
    UnknownBank(String),
    /// The connection mode string is neither `keep` nor `single`
    UnknownMode(String),
    /// The register type cannot be used against the selected bank
    BankTypeMismatch {
        /// The selected bank
        bank: RegisterBank,
        /// The register type requested against it
        ty: ValueType,
    },
    /// A read was requested with an explicit word count of zero
    ZeroCount,
}

impl std::error::Error for InvalidConfig {}

impl std::fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidConfig::UnknownValueType(tag) => {
                write!(f, "unrecognized register type: {tag}")
            }
            InvalidConfig::UnknownBank(bank) => {
                write!(f, "unrecognized register bank: {bank}")
            }
            InvalidConfig::UnknownMode(mode) => {
                write!(f, "unrecognized connection mode: {mode}")
            }
            InvalidConfig::BankTypeMismatch { bank, ty } => {
                write!(f, "register type {ty} cannot be used on the {bank} bank")
            }
            InvalidConfig::ZeroCount => f.write_str("read requested with a count of zero"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::{ExceptionCode, ExceptionResponse};

    #[test]
    fn exception_detail_appears_in_request_error_message() {
        let err = RequestError::Exception(ExceptionResponse::with_detail(
            ExceptionCode::IllegalDataValue,
            "out of bounds",
        ));
        assert_eq!(
            err.to_string(),
            "server exception: illegal data value [out of bounds]"
        );
    }

    #[test]
    fn out_of_range_names_type_and_value() {
        let err = RequestError::from(InvalidValue::OutOfRange {
            value: "65536".to_string(),
            ty: ValueType::Uint16,
        });
        assert_eq!(err.to_string(), "value 65536 is out of range for UINT16");
    }
}
