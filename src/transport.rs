use async_trait::async_trait;

use crate::error::{ConnectError, RequestError};
use crate::types::DeviceConfig;

/// The underlying Modbus transaction layer.
///
/// Implementations own the socket and the PDU framing. The device task calls
/// these methods one at a time, so implementations never see concurrent
/// requests and may hold per-request state internally.
#[async_trait]
pub trait Transaction: Send + 'static {
    /// Open the link to the server described by the current configuration
    async fn connect(&mut self) -> Result<(), ConnectError>;

    /// Close the link. Closing an already-closed link must succeed.
    async fn disconnect(&mut self) -> Result<(), RequestError>;

    /// Read `count` holding registers starting at `address`, returning the
    /// raw big-endian register bytes of the response
    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u8>, RequestError>;

    /// Read `count` input registers starting at `address`
    async fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u8>, RequestError>;

    /// Read `count` coils starting at `address` as a bit array
    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, RequestError>;

    /// Read `count` discrete inputs starting at `address` as a bit array
    async fn read_discrete_inputs(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, RequestError>;

    /// Write one 16-bit register
    async fn write_single_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> Result<(), RequestError>;

    /// Write a run of registers from big-endian bytes, two bytes per register
    async fn write_multiple_registers(
        &mut self,
        address: u16,
        bytes: &[u8],
    ) -> Result<(), RequestError>;

    /// Write one coil
    async fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), RequestError>;

    /// Adopt new connection settings. Takes effect on the next connect, the
    /// caller is responsible for cycling the link.
    fn reconfigure(&mut self, config: &DeviceConfig);
}
