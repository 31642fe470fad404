use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::codec::ValueType;
use crate::error::RequestError;
use crate::types::{DeviceConfig, RegisterBank, RegisterValue, WriteMode};

use super::connection::LinkState;
use super::message::{BitRead, BitWrite, Command, Promise, ReadRequest, WriteRequest};

/// Handle to a spawned device task.
///
/// Cloning is cheap and every clone talks to the same device. Operations are
/// queued and executed one at a time in arrival order, which also makes the
/// bit-level read-modify-write sequences atomic with respect to each other.
/// When every handle is dropped the task closes the link and exits.
#[derive(Clone, Debug)]
pub struct Device {
    tx: mpsc::Sender<Command>,
}

impl Device {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn call<R>(
        &self,
        command: Command,
        rx: oneshot::Receiver<Result<R, RequestError>>,
    ) -> Result<R, RequestError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| RequestError::Shutdown)?;
        rx.await.map_err(|_| RequestError::Shutdown)?
    }

    /// Open the link if it is not already open. A no-op while connected.
    pub async fn ensure_connected(&self) -> Result<(), RequestError> {
        let (promise, rx) = Promise::channel();
        self.call(Command::EnsureConnected(promise), rx).await
    }

    /// Close the link if it is open. A no-op while disconnected.
    pub async fn ensure_disconnected(&self) -> Result<(), RequestError> {
        let (promise, rx) = Promise::channel();
        self.call(Command::EnsureDisconnected(promise), rx).await
    }

    /// Read one typed value from a register bank.
    ///
    /// `count` supplies the word count for STRING and BYTE reads and is
    /// ignored for the fixed-width types. BOOL reads must address the coil
    /// or discrete-input banks, everything else the word banks.
    pub async fn read(
        &self,
        bank: RegisterBank,
        address: u16,
        ty: ValueType,
        count: Option<u16>,
    ) -> Result<RegisterValue, RequestError> {
        let (promise, rx) = Promise::channel();
        let request = ReadRequest {
            bank,
            address,
            ty,
            count,
        };
        self.call(Command::Read(request, promise), rx).await
    }

    /// Write one typed value, returning the encoded payload as upper-case
    /// hex pairs, e.g. `"00 2A"`.
    ///
    /// [`WriteMode::Simulate`] validates and encodes but never touches the
    /// network, so callers can preview the exact wire payload.
    pub async fn write(
        &self,
        bank: RegisterBank,
        address: u16,
        value: RegisterValue,
        ty: ValueType,
        mode: WriteMode,
    ) -> Result<String, RequestError> {
        let (promise, rx) = Promise::channel();
        let request = WriteRequest {
            bank,
            address,
            ty,
            value,
            mode,
        };
        self.call(Command::Write(request, promise), rx).await
    }

    /// Test one bit of a holding register. Bit indices are 1-based, 1
    /// through 16.
    pub async fn read_bit(&self, address: u16, bit: u16) -> Result<bool, RequestError> {
        let (promise, rx) = Promise::channel();
        self.call(Command::ReadBit(BitRead { address, bit }, promise), rx)
            .await
    }

    /// Set or clear one bit of a holding register via read-modify-write,
    /// returning the updated register as hex pairs.
    ///
    /// A simulated write still reads the current register to compute the
    /// result but skips the write-back.
    pub async fn write_bit(
        &self,
        address: u16,
        bit: u16,
        value: bool,
        mode: WriteMode,
    ) -> Result<String, RequestError> {
        let (promise, rx) = Promise::channel();
        let request = BitWrite {
            address,
            bit,
            value,
            mode,
        };
        self.call(Command::WriteBit(request, promise), rx).await
    }

    /// Replace the connection settings.
    ///
    /// The link is torn down first and, when the new mode is persistent,
    /// re-opened under the new settings. If that connect fails the previous
    /// settings are restored and the connect error is returned.
    pub async fn update_settings(&self, config: DeviceConfig) -> Result<(), RequestError> {
        let (promise, rx) = Promise::channel();
        self.call(Command::UpdateSettings(config, promise), rx)
            .await
    }

    /// Current lifecycle state of the link
    pub async fn link_state(&self) -> Result<LinkState, RequestError> {
        let (promise, rx) = Promise::channel();
        self.call(Command::LinkState(promise), rx).await
    }
}
