use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::codec::{self, ValueType};
use crate::constants;
use crate::error::{InvalidConfig, InvalidValue, RequestError};
use crate::transport::Transaction;
use crate::types::{ConnectionMode, DeviceConfig, RegisterBank, RegisterValue, WriteMode};

use super::connection::{ConnectionManager, LinkEvent};
use super::message::{BitRead, BitWrite, Command, ReadRequest, WriteRequest};

/// The task that owns one device: its transport, its lifecycle state, and
/// the queue that serializes every operation against it.
///
/// Serialization is what makes the bit-level read-modify-write sequences
/// safe: no second operation can interleave between the read and the
/// write-back.
pub(crate) struct DeviceTask<T>
where
    T: Transaction,
{
    manager: ConnectionManager<T>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Receiver<LinkEvent>,
    events_closed: bool,
    reconnect_at: Option<Instant>,
}

impl<T> DeviceTask<T>
where
    T: Transaction,
{
    pub(crate) fn new(
        transport: T,
        config: DeviceConfig,
        commands: mpsc::Receiver<Command>,
        events: mpsc::Receiver<LinkEvent>,
    ) -> Self {
        Self {
            manager: ConnectionManager::new(transport, config),
            commands,
            events,
            events_closed: false,
            reconnect_at: None,
        }
    }

    /// Run until every device handle is dropped
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            let _ = self.manager.ensure_disconnected().await;
                            tracing::info!("device task shutting down");
                            return;
                        }
                    }
                }
                event = self.events.recv(), if !self.events_closed => {
                    match event {
                        Some(event) => {
                            self.reconnect_at = self
                                .manager
                                .handle_event(event)
                                .map(|delay| Instant::now() + delay);
                        }
                        None => self.events_closed = true,
                    }
                }
                _ = tokio::time::sleep_until(self.reconnect_at.unwrap_or_else(Instant::now)),
                    if self.reconnect_at.is_some() =>
                {
                    self.reconnect_at = None;
                    self.manager.attempt_reconnect().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::EnsureConnected(promise) => {
                promise.complete(self.manager.ensure_connected().await);
            }
            Command::EnsureDisconnected(promise) => {
                promise.complete(self.manager.ensure_disconnected().await);
            }
            Command::Read(request, promise) => {
                promise.complete(self.read(request).await);
            }
            Command::Write(request, promise) => {
                promise.complete(self.write(request).await);
            }
            Command::ReadBit(request, promise) => {
                promise.complete(self.read_bit(request).await);
            }
            Command::WriteBit(request, promise) => {
                promise.complete(self.write_bit(request).await);
            }
            Command::UpdateSettings(config, promise) => {
                promise.complete(self.manager.update_settings(config).await);
            }
            Command::LinkState(promise) => {
                promise.complete(Ok(self.manager.state()));
            }
        }
    }

    fn per_operation(&self) -> bool {
        self.manager.config().mode == ConnectionMode::PerOperation
    }

    /// Connect-before/disconnect-after bracket for per-operation mode. The
    /// disconnect runs on the failure path too, so a failed operation never
    /// leaves a per-operation device connected.
    async fn close_after_operation<R>(
        &mut self,
        result: Result<R, RequestError>,
    ) -> Result<R, RequestError> {
        let cleanup = self.manager.ensure_disconnected().await;
        let value = result?;
        cleanup?;
        Ok(value)
    }

    async fn read(&mut self, request: ReadRequest) -> Result<RegisterValue, RequestError> {
        check_bank(request.bank, request.ty)?;
        let count = request.ty.word_count(request.count)?;

        if self.per_operation() {
            self.manager.ensure_connected().await?;
            let result = self.perform_read(&request, count).await;
            self.close_after_operation(result).await
        } else {
            self.perform_read(&request, count).await
        }
    }

    async fn perform_read(
        &mut self,
        request: &ReadRequest,
        count: u16,
    ) -> Result<RegisterValue, RequestError> {
        let transport = self.manager.transport();
        match request.bank {
            RegisterBank::Holding => {
                let bytes = transport
                    .read_holding_registers(request.address, count)
                    .await?;
                Ok(codec::decode(request.ty, &bytes)?)
            }
            RegisterBank::Input => {
                let bytes = transport
                    .read_input_registers(request.address, count)
                    .await?;
                Ok(codec::decode(request.ty, &bytes)?)
            }
            RegisterBank::Coil => {
                let bits = transport.read_coils(request.address, 1).await?;
                Ok(RegisterValue::Bit(bits.first().copied().unwrap_or(false)))
            }
            RegisterBank::Discrete => {
                let bits = transport.read_discrete_inputs(request.address, 1).await?;
                Ok(RegisterValue::Bit(bits.first().copied().unwrap_or(false)))
            }
        }
    }

    async fn write(&mut self, request: WriteRequest) -> Result<String, RequestError> {
        if !request.bank.is_writable() {
            return Err(InvalidConfig::BankTypeMismatch {
                bank: request.bank,
                ty: request.ty,
            }
            .into());
        }
        check_bank(request.bank, request.ty)?;

        if request.ty.is_bit() {
            return self.write_coil(&request).await;
        }

        // validate and encode before any I/O so range errors never connect
        let bytes = codec::encode(request.ty, &request.value)?;
        if bytes.is_empty() {
            return Err(InvalidValue::BufferLength {
                expected: 2,
                actual: 0,
            }
            .into());
        }
        let hex = codec::format_hex(&bytes);

        if request.mode == WriteMode::Simulate {
            return Ok(hex);
        }

        if self.per_operation() {
            self.manager.ensure_connected().await?;
            let result = self.perform_register_write(request.address, &bytes).await;
            self.close_after_operation(result).await?;
        } else {
            self.perform_register_write(request.address, &bytes).await?;
        }
        Ok(hex)
    }

    async fn perform_register_write(
        &mut self,
        address: u16,
        bytes: &[u8],
    ) -> Result<(), RequestError> {
        // single word goes through the single-register function unless the
        // configuration forces the multiple-register function
        let multiple = bytes.len() > 2 || self.manager.config().always_write_multiple;
        let transport = self.manager.transport();
        if multiple {
            transport.write_multiple_registers(address, bytes).await
        } else {
            let word = u16::from_be_bytes([bytes[0], bytes[1]]);
            transport.write_single_register(address, word).await
        }
    }

    async fn write_coil(&mut self, request: &WriteRequest) -> Result<String, RequestError> {
        let RegisterValue::Bit(value) = request.value else {
            return Err(InvalidValue::TypeMismatch { ty: request.ty }.into());
        };
        let word = if value {
            constants::coil::ON
        } else {
            constants::coil::OFF
        };
        let hex = codec::format_hex(&word.to_be_bytes());

        if request.mode == WriteMode::Simulate {
            return Ok(hex);
        }

        if self.per_operation() {
            self.manager.ensure_connected().await?;
            let result = self
                .manager
                .transport()
                .write_single_coil(request.address, value)
                .await;
            self.close_after_operation(result).await?;
        } else {
            self.manager
                .transport()
                .write_single_coil(request.address, value)
                .await?;
        }
        Ok(hex)
    }

    async fn read_bit(&mut self, request: BitRead) -> Result<bool, RequestError> {
        let mask = bit_mask(request.bit)?;

        if self.per_operation() {
            self.manager.ensure_connected().await?;
            let result = self.fetch_register(request.address).await;
            let word = self.close_after_operation(result).await?;
            Ok(word & mask != 0)
        } else {
            let word = self.fetch_register(request.address).await?;
            Ok(word & mask != 0)
        }
    }

    /// Read-modify-write of one bit in a holding register. Queued commands
    /// cannot interleave here, so the sequence is atomic with respect to
    /// every other operation on this device.
    async fn write_bit(&mut self, request: BitWrite) -> Result<String, RequestError> {
        let mask = bit_mask(request.bit)?;

        if self.per_operation() {
            self.manager.ensure_connected().await?;
            let result = self.perform_bit_write(&request, mask).await;
            self.close_after_operation(result).await
        } else {
            self.perform_bit_write(&request, mask).await
        }
    }

    async fn perform_bit_write(
        &mut self,
        request: &BitWrite,
        mask: u16,
    ) -> Result<String, RequestError> {
        let word = self.fetch_register(request.address).await?;
        let updated = if request.value {
            word | mask
        } else {
            word & !mask
        };
        if request.mode == WriteMode::Live {
            self.manager
                .transport()
                .write_single_register(request.address, updated)
                .await?;
        }
        Ok(codec::format_hex(&updated.to_be_bytes()))
    }

    async fn fetch_register(&mut self, address: u16) -> Result<u16, RequestError> {
        let bytes = self
            .manager
            .transport()
            .read_holding_registers(address, 1)
            .await?;
        if bytes.len() < 2 {
            return Err(InvalidValue::BufferLength {
                expected: 2,
                actual: bytes.len(),
            }
            .into());
        }
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

/// BOOL reads and writes travel through the bit banks, every other type
/// through the word banks
fn check_bank(bank: RegisterBank, ty: ValueType) -> Result<(), InvalidConfig> {
    if ty.is_bit() != bank.is_bit_bank() {
        return Err(InvalidConfig::BankTypeMismatch { bank, ty });
    }
    Ok(())
}

fn bit_mask(bit: u16) -> Result<u16, InvalidValue> {
    if bit == 0 || bit > constants::limits::MAX_BIT_INDEX {
        return Err(InvalidValue::BadBitIndex(bit));
    }
    Ok(1 << (bit - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectError;
    use crate::mock::{self, MockHandle};

    fn start(mode: ConnectionMode) -> (crate::client::Device, mpsc::Sender<LinkEvent>, MockHandle) {
        let (transport, handle) = mock::pair();
        let config = DeviceConfig::new("10.0.0.2", 502, 1).mode(mode);
        let (device, events) = crate::client::spawn_device(transport, config);
        (device, events, handle)
    }

    #[tokio::test]
    async fn bank_type_mismatch_fails_before_any_io() {
        let (device, _events, handle) = start(ConnectionMode::PerOperation);
        let err = device
            .read(RegisterBank::Coil, 0, ValueType::Uint16, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RequestError::BadConfig(InvalidConfig::BankTypeMismatch {
                bank: RegisterBank::Coil,
                ty: ValueType::Uint16,
            })
        );
        assert_eq!(handle.connect_calls(), 0);
        assert_eq!(handle.request_calls(), 0);
    }

    #[tokio::test]
    async fn out_of_range_write_never_connects() {
        let (device, _events, handle) = start(ConnectionMode::PerOperation);
        let err = device
            .write(
                RegisterBank::Holding,
                100,
                RegisterValue::Integer(65536),
                ValueType::Uint16,
                WriteMode::Live,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::BadValue(InvalidValue::OutOfRange { .. })
        ));
        assert_eq!(handle.connect_calls(), 0);
    }

    #[tokio::test]
    async fn per_operation_read_disconnects_on_failure_too() {
        let (device, _events, handle) = start(ConnectionMode::PerOperation);
        handle.fail_next_request(RequestError::ResponseTimeout);
        let err = device
            .read(RegisterBank::Holding, 0, ValueType::Uint16, None)
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::ResponseTimeout);
        assert!(!handle.connected());
        assert_eq!(handle.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn persistent_read_requires_prior_connect() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        let err = device
            .read(RegisterBank::Holding, 0, ValueType::Uint16, None)
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::NoConnection);

        device.ensure_connected().await.unwrap();
        handle.set_holding(0, 7);
        let value = device
            .read(RegisterBank::Holding, 0, ValueType::Uint16, None)
            .await
            .unwrap();
        assert_eq!(value, RegisterValue::Unsigned(7));
        assert!(handle.connected());
    }

    #[tokio::test]
    async fn bool_reads_come_from_the_bit_banks() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        device.ensure_connected().await.unwrap();
        handle.set_coil(3, true);
        handle.set_discrete(4, true);
        let coil = device
            .read(RegisterBank::Coil, 3, ValueType::Bool, None)
            .await
            .unwrap();
        assert_eq!(coil, RegisterValue::Bit(true));
        assert!(coil.as_bool());
        let discrete = device
            .read(RegisterBank::Discrete, 4, ValueType::Bool, None)
            .await
            .unwrap();
        assert_eq!(discrete, RegisterValue::Bit(true));
        let absent = device
            .read(RegisterBank::Coil, 9, ValueType::Bool, None)
            .await
            .unwrap();
        assert_eq!(absent, RegisterValue::Bit(false));
    }

    #[tokio::test]
    async fn single_word_writes_use_the_single_register_function() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        device.ensure_connected().await.unwrap();
        let hex = device
            .write(
                RegisterBank::Holding,
                100,
                RegisterValue::Unsigned(42),
                ValueType::Uint16,
                WriteMode::Live,
            )
            .await
            .unwrap();
        assert_eq!(hex, "00 2A");
        assert_eq!(handle.holding(100), 42);
    }

    #[tokio::test]
    async fn multi_word_writes_use_the_multiple_register_function() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        device.ensure_connected().await.unwrap();
        let hex = device
            .write(
                RegisterBank::Holding,
                20,
                RegisterValue::Unsigned(0x1234_5678),
                ValueType::Uint32,
                WriteMode::Live,
            )
            .await
            .unwrap();
        assert_eq!(hex, "12 34 56 78");
        assert_eq!(handle.holding(20), 0x1234);
        assert_eq!(handle.holding(21), 0x5678);
    }

    #[tokio::test]
    async fn coil_write_reports_the_wire_word() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        device.ensure_connected().await.unwrap();
        let hex = device
            .write(
                RegisterBank::Coil,
                5,
                RegisterValue::Bit(true),
                ValueType::Bool,
                WriteMode::Live,
            )
            .await
            .unwrap();
        assert_eq!(hex, "FF 00");
        assert!(handle.coil(5));
        let hex = device
            .write(
                RegisterBank::Coil,
                5,
                RegisterValue::Bit(false),
                ValueType::Bool,
                WriteMode::Live,
            )
            .await
            .unwrap();
        assert_eq!(hex, "00 00");
        assert!(!handle.coil(5));
    }

    #[tokio::test]
    async fn writes_to_read_only_banks_are_rejected() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        let err = device
            .write(
                RegisterBank::Input,
                0,
                RegisterValue::Unsigned(1),
                ValueType::Uint16,
                WriteMode::Live,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::BadConfig(InvalidConfig::BankTypeMismatch { .. })
        ));
        assert_eq!(handle.request_calls(), 0);
    }

    #[tokio::test]
    async fn bit_index_validation_is_one_based() {
        let (device, _events, _handle) = start(ConnectionMode::Persistent);
        device.ensure_connected().await.unwrap();
        assert_eq!(
            device.read_bit(0, 0).await.unwrap_err(),
            RequestError::BadValue(InvalidValue::BadBitIndex(0))
        );
        assert_eq!(
            device.read_bit(0, 17).await.unwrap_err(),
            RequestError::BadValue(InvalidValue::BadBitIndex(17))
        );
    }

    #[tokio::test]
    async fn bit_read_modify_write() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        device.ensure_connected().await.unwrap();
        handle.set_holding(8, 0b101);

        assert!(device.read_bit(8, 1).await.unwrap());
        assert!(!device.read_bit(8, 2).await.unwrap());
        assert!(device.read_bit(8, 3).await.unwrap());

        let hex = device.write_bit(8, 2, true, WriteMode::Live).await.unwrap();
        assert_eq!(hex, "00 07");
        assert_eq!(handle.holding(8), 0b111);

        let hex = device
            .write_bit(8, 1, false, WriteMode::Live)
            .await
            .unwrap();
        assert_eq!(hex, "00 06");
        assert_eq!(handle.holding(8), 0b110);
    }

    #[tokio::test]
    async fn simulated_bit_write_reads_but_does_not_write_back() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        device.ensure_connected().await.unwrap();
        handle.set_holding(8, 0b101);
        let hex = device
            .write_bit(8, 2, true, WriteMode::Simulate)
            .await
            .unwrap();
        assert_eq!(hex, "00 07");
        assert_eq!(handle.holding(8), 0b101);
        assert_eq!(handle.request_calls(), 1);
    }

    #[tokio::test]
    async fn update_settings_failure_reports_original_error() {
        let (device, _events, handle) = start(ConnectionMode::PerOperation);
        handle.fail_next_connect(ConnectError::TimedOut);
        let new = DeviceConfig::new("10.0.0.50", 502, 2).mode(ConnectionMode::Persistent);
        let err = device.update_settings(new).await.unwrap_err();
        assert_eq!(err, RequestError::Connect(ConnectError::TimedOut));
        // previous mode was per-operation, so no link is re-established
        assert!(!handle.connected());
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_task_and_closes_the_link() {
        let (device, _events, handle) = start(ConnectionMode::Persistent);
        device.ensure_connected().await.unwrap();
        drop(device);
        // give the task a chance to observe the closed queue
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!handle.connected());
    }
}
