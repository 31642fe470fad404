use std::str::FromStr;
use std::time::Duration;

use crate::constants;
use crate::error::InvalidConfig;

/// Whether the connection is held open across operations or opened and
/// closed around each one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Keep the connection open between operations and reconnect
    /// automatically after an unsolicited close
    Persistent,
    /// Open a connection before each operation and close it afterwards
    PerOperation,
}

impl FromStr for ConnectionMode {
    type Err = InvalidConfig;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep" => Ok(ConnectionMode::Persistent),
            "single" => Ok(ConnectionMode::PerOperation),
            other => Err(InvalidConfig::UnknownMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConnectionMode::Persistent => f.write_str("keep"),
            ConnectionMode::PerOperation => f.write_str("single"),
        }
    }
}

/// The four Modbus data spaces a request can address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterBank {
    /// Read/write 16-bit word space
    Holding,
    /// Read-only 16-bit word space
    Input,
    /// Read/write single-bit space
    Coil,
    /// Read-only single-bit space
    Discrete,
}

impl RegisterBank {
    /// True for the single-bit-addressed spaces
    pub fn is_bit_bank(self) -> bool {
        matches!(self, RegisterBank::Coil | RegisterBank::Discrete)
    }

    /// True for the banks that accept writes
    pub fn is_writable(self) -> bool {
        matches!(self, RegisterBank::Holding | RegisterBank::Coil)
    }
}

impl FromStr for RegisterBank {
    type Err = InvalidConfig;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "holding" => Ok(RegisterBank::Holding),
            "input" => Ok(RegisterBank::Input),
            "coil" => Ok(RegisterBank::Coil),
            "discrete" => Ok(RegisterBank::Discrete),
            other => Err(InvalidConfig::UnknownBank(other.to_string())),
        }
    }
}

impl std::fmt::Display for RegisterBank {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RegisterBank::Holding => f.write_str("holding"),
            RegisterBank::Input => f.write_str("input"),
            RegisterBank::Coil => f.write_str("coil"),
            RegisterBank::Discrete => f.write_str("discrete"),
        }
    }
}

/// Controls whether a write touches the network or only previews the payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Perform the write against the server
    #[default]
    Live,
    /// Encode and validate only, returning the would-be payload without
    /// connecting or transmitting anything
    Simulate,
}

/// Immutable snapshot of the settings used to open a connection.
///
/// Replaced wholesale on a settings change, never mutated field by field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Hostname or IP address of the server
    pub host: String,
    /// TCP port, conventionally 502
    pub port: u16,
    /// Modbus unit identifier forwarded with every request
    pub unit_id: u8,
    /// Request/response round-trip timeout
    pub timeout: Duration,
    /// Connection lifetime policy
    pub mode: ConnectionMode,
    /// Force the multiple-register write function even for single-word values
    pub always_write_multiple: bool,
}

impl DeviceConfig {
    /// Create a configuration with the default timeout, persistent mode, and
    /// no write override
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            timeout: constants::link::DEFAULT_TIMEOUT,
            mode: ConnectionMode::Persistent,
            always_write_multiple: false,
        }
    }

    /// Replace the connection mode
    pub fn mode(self, mode: ConnectionMode) -> Self {
        Self { mode, ..self }
    }

    /// Replace the round-trip timeout
    pub fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Always use the multiple-register write function
    pub fn always_write_multiple(self) -> Self {
        Self {
            always_write_multiple: true,
            ..self
        }
    }
}

/// A decoded register value.
///
/// Every variant can render itself as text; numeric and boolean views are
/// available where they make sense and fall back to zero/false otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum RegisterValue {
    /// Signed integer, covers the 16/32/64-bit signed types
    Integer(i64),
    /// Unsigned integer, covers the 16/32/64-bit unsigned types
    Unsigned(u64),
    /// Floating point, covers FLOAT32/FLOAT64 and SCALE
    Float(f64),
    /// Text decoded from raw register bytes
    Text(String),
    /// Raw bytes, rendered as space-separated upper-case hex pairs
    Bytes(Vec<u8>),
    /// Single bit from a bit-addressed bank or a register bit probe
    Bit(bool),
}

impl RegisterValue {
    /// Human-readable rendering of the value
    pub fn as_text(&self) -> String {
        match self {
            RegisterValue::Integer(v) => v.to_string(),
            RegisterValue::Unsigned(v) => v.to_string(),
            RegisterValue::Float(v) => v.to_string(),
            RegisterValue::Text(s) => s.clone(),
            RegisterValue::Bytes(bytes) => crate::codec::format_hex(bytes),
            RegisterValue::Bit(b) => b.to_string(),
        }
    }

    /// Numeric view of the value, zero where no number applies
    pub fn as_f64(&self) -> f64 {
        match self {
            RegisterValue::Integer(v) => *v as f64,
            RegisterValue::Unsigned(v) => *v as f64,
            RegisterValue::Float(v) => *v,
            RegisterValue::Text(_) | RegisterValue::Bytes(_) => 0.0,
            RegisterValue::Bit(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Boolean view of the value, false where no boolean applies
    pub fn as_bool(&self) -> bool {
        match self {
            RegisterValue::Bit(b) => *b,
            _ => false,
        }
    }
}

impl std::fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.as_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connection_modes() {
        assert_eq!(
            "keep".parse::<ConnectionMode>().unwrap(),
            ConnectionMode::Persistent
        );
        assert_eq!(
            "single".parse::<ConnectionMode>().unwrap(),
            ConnectionMode::PerOperation
        );
        assert_eq!(
            "forever".parse::<ConnectionMode>(),
            Err(InvalidConfig::UnknownMode("forever".to_string()))
        );
    }

    #[test]
    fn parses_register_banks() {
        assert_eq!(
            "holding".parse::<RegisterBank>().unwrap(),
            RegisterBank::Holding
        );
        assert_eq!(
            "discrete".parse::<RegisterBank>().unwrap(),
            RegisterBank::Discrete
        );
        assert!("flash".parse::<RegisterBank>().is_err());
    }

    #[test]
    fn bank_predicates() {
        assert!(RegisterBank::Coil.is_bit_bank());
        assert!(RegisterBank::Discrete.is_bit_bank());
        assert!(!RegisterBank::Holding.is_bit_bank());
        assert!(RegisterBank::Holding.is_writable());
        assert!(RegisterBank::Coil.is_writable());
        assert!(!RegisterBank::Input.is_writable());
        assert!(!RegisterBank::Discrete.is_writable());
    }

    #[test]
    fn register_value_views() {
        assert_eq!(RegisterValue::Integer(-5).as_text(), "-5");
        assert_eq!(RegisterValue::Unsigned(42).as_f64(), 42.0);
        assert_eq!(RegisterValue::Bytes(vec![0x00, 0x2A]).as_text(), "00 2A");
        assert!(RegisterValue::Bit(true).as_bool());
        assert!(!RegisterValue::Integer(1).as_bool());
        assert_eq!(RegisterValue::Bit(true).as_f64(), 1.0);
    }
}
