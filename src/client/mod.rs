//! Device handles and the per-device task behind them.

use std::future::Future;

use tokio::sync::mpsc;

use crate::transport::Transaction;
use crate::types::DeviceConfig;

pub(crate) mod connection;
pub(crate) mod device;
pub(crate) mod message;
pub(crate) mod task;

pub use connection::{LinkEvent, LinkState};
pub use device::Device;

/// Queue depth for operations awaiting their turn against the device
const COMMAND_QUEUE: usize = 16;
/// Queue depth for socket-level close/timeout notifications
const EVENT_QUEUE: usize = 8;

/// Create a device task without spawning it.
///
/// Returns the handle, the sender the transport owner uses to report
/// unsolicited close and timeout events, and the future that runs the task.
/// Most callers want [`spawn_device`] instead.
pub fn device_task<T>(
    transport: T,
    config: DeviceConfig,
) -> (Device, mpsc::Sender<LinkEvent>, impl Future<Output = ()>)
where
    T: Transaction,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
    let task = task::DeviceTask::new(transport, config, command_rx, event_rx);
    (Device::new(command_tx), event_tx, task.run())
}

/// Spawn the task for one device onto the current tokio runtime.
///
/// The task owns the transport and serializes every operation against the
/// device. It runs until the last [`Device`] handle is dropped. The returned
/// event sender feeds the unsolicited close/timeout path; dropping it simply
/// disables automatic reconnection.
pub fn spawn_device<T>(transport: T, config: DeviceConfig) -> (Device, mpsc::Sender<LinkEvent>)
where
    T: Transaction,
{
    let (device, events, task) = device_task(transport, config);
    tokio::spawn(task);
    (device, events)
}
