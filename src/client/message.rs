use tokio::sync::oneshot;

use crate::codec::ValueType;
use crate::error::RequestError;
use crate::types::{DeviceConfig, RegisterBank, RegisterValue, WriteMode};

use super::connection::LinkState;

/// One half of a request/response exchange with the device task.
///
/// Dropping an unfulfilled promise closes the channel and the waiting
/// caller observes [`RequestError::Shutdown`].
pub(crate) struct Promise<T> {
    tx: oneshot::Sender<Result<T, RequestError>>,
}

impl<T> Promise<T> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Result<T, RequestError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub(crate) fn complete(self, result: Result<T, RequestError>) {
        // the caller may have stopped waiting, which is fine
        let _ = self.tx.send(result);
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ReadRequest {
    pub(crate) bank: RegisterBank,
    pub(crate) address: u16,
    pub(crate) ty: ValueType,
    pub(crate) count: Option<u16>,
}

#[derive(Clone, Debug)]
pub(crate) struct WriteRequest {
    pub(crate) bank: RegisterBank,
    pub(crate) address: u16,
    pub(crate) ty: ValueType,
    pub(crate) value: RegisterValue,
    pub(crate) mode: WriteMode,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BitRead {
    pub(crate) address: u16,
    pub(crate) bit: u16,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BitWrite {
    pub(crate) address: u16,
    pub(crate) bit: u16,
    pub(crate) value: bool,
    pub(crate) mode: WriteMode,
}

pub(crate) enum Command {
    EnsureConnected(Promise<()>),
    EnsureDisconnected(Promise<()>),
    Read(ReadRequest, Promise<RegisterValue>),
    Write(WriteRequest, Promise<String>),
    ReadBit(BitRead, Promise<bool>),
    WriteBit(BitWrite, Promise<String>),
    UpdateSettings(DeviceConfig, Promise<()>),
    LinkState(Promise<LinkState>),
}
