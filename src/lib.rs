//! Typed register access for Modbus TCP clients.
//!
//! The crate manages one connection per device and exposes typed reads and
//! writes against the four Modbus data spaces. A spawned task owns the
//! transport and serializes all operations, while cheap cloneable [`Device`]
//! handles issue requests from anywhere in the application.
//!
//! The link can be held open between operations ([`ConnectionMode::Persistent`],
//! with a single automatic reconnect attempt after an unsolicited close) or
//! opened and closed around each operation ([`ConnectionMode::PerOperation`]).
//!
//! ```no_run
//! use regbus::{
//!     spawn_device, ConnectionMode, DeviceConfig, RegisterBank, RegisterValue, ValueType,
//!     WriteMode,
//! };
//!
//! # async fn run(transport: impl regbus::Transaction) -> Result<(), regbus::RequestError> {
//! let config = DeviceConfig::new("10.0.0.2", 502, 1).mode(ConnectionMode::Persistent);
//! let (device, _events) = spawn_device(transport, config);
//!
//! device.ensure_connected().await?;
//! let value = device
//!     .read(RegisterBank::Holding, 40001, ValueType::Float32, None)
//!     .await?;
//! println!("temperature: {value}");
//!
//! // preview the wire payload without touching the network
//! let hex = device
//!     .write(
//!         RegisterBank::Holding,
//!         100,
//!         RegisterValue::Unsigned(42),
//!         ValueType::Uint16,
//!         WriteMode::Simulate,
//!     )
//!     .await?;
//! assert_eq!(hex, "00 2A");
//! # Ok(())
//! # }
//! ```

/// Device handles and the task that owns each device
pub mod client;
/// Value types, byte orders, and the register codec
pub mod codec;
/// Error types returned by every operation
pub mod error;
/// Modbus exception codes and responses
pub mod exception;
/// In-memory transport for tests and examples
pub mod mock;
/// The transaction-layer trait implemented by transports
pub mod transport;
/// Configuration and value types shared across the crate
pub mod types;

pub(crate) mod constants;

pub use client::{device_task, spawn_device, Device, LinkEvent, LinkState};
pub use codec::{ByteOrder, ValueType};
pub use error::{ConnectError, InvalidConfig, InvalidValue, RequestError};
pub use exception::{ExceptionCode, ExceptionResponse};
pub use transport::Transaction;
pub use types::{ConnectionMode, DeviceConfig, RegisterBank, RegisterValue, WriteMode};
