//! An in-memory [`Transaction`] implementation for tests and examples.
//!
//! The mock holds the four register banks in maps and records every call so
//! tests can assert on connect counts and request ordering. Failures are
//! injected through queues and consumed one per call.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::constants;
use crate::error::{ConnectError, RequestError};
use crate::transport::Transaction;
use crate::types::DeviceConfig;

#[derive(Debug, Default)]
struct Inner {
    holding: BTreeMap<u16, u16>,
    input: BTreeMap<u16, u16>,
    coils: BTreeMap<u16, bool>,
    discrete: BTreeMap<u16, bool>,
    connected: bool,
    connect_calls: usize,
    disconnect_calls: usize,
    request_calls: usize,
    connect_failures: VecDeque<ConnectError>,
    disconnect_failures: VecDeque<RequestError>,
    request_failures: VecDeque<RequestError>,
    reconfigured: Vec<DeviceConfig>,
}

impl Inner {
    fn next_request(&mut self) -> Result<(), RequestError> {
        if !self.connected {
            return Err(RequestError::NoConnection);
        }
        self.request_calls += 1;
        match self.request_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Test transport that serves requests from in-memory register banks
#[derive(Debug)]
pub struct MockTransaction {
    inner: Arc<Mutex<Inner>>,
}

/// Cloneable handle used by tests to seed banks and inspect call counts
/// while the paired [`MockTransaction`] is owned by a device task
#[derive(Clone, Debug)]
pub struct MockHandle {
    inner: Arc<Mutex<Inner>>,
}

/// Create a connected pair of mock transport and control handle
pub fn pair() -> (MockTransaction, MockHandle) {
    let inner = Arc::new(Mutex::new(Inner::default()));
    (
        MockTransaction {
            inner: inner.clone(),
        },
        MockHandle { inner },
    )
}

impl MockHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock state poisoned")
    }

    /// Seed a holding register
    pub fn set_holding(&self, address: u16, value: u16) {
        self.lock().holding.insert(address, value);
    }

    /// Seed an input register
    pub fn set_input(&self, address: u16, value: u16) {
        self.lock().input.insert(address, value);
    }

    /// Seed a coil
    pub fn set_coil(&self, address: u16, value: bool) {
        self.lock().coils.insert(address, value);
    }

    /// Seed a discrete input
    pub fn set_discrete(&self, address: u16, value: bool) {
        self.lock().discrete.insert(address, value);
    }

    /// Current value of a holding register, zero if never written
    pub fn holding(&self, address: u16) -> u16 {
        self.lock().holding.get(&address).copied().unwrap_or(0)
    }

    /// Current value of a coil, false if never written
    pub fn coil(&self, address: u16) -> bool {
        self.lock().coils.get(&address).copied().unwrap_or(false)
    }

    /// Whether the mock link is currently open
    pub fn connected(&self) -> bool {
        self.lock().connected
    }

    /// Number of connect calls that reached the transport
    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    /// Number of disconnect calls that reached the transport
    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnect_calls
    }

    /// Number of register/coil requests that reached the transport
    pub fn request_calls(&self) -> usize {
        self.lock().request_calls
    }

    /// Queue a failure for the next connect call
    pub fn fail_next_connect(&self, err: ConnectError) {
        self.lock().connect_failures.push_back(err);
    }

    /// Queue a failure for the next disconnect call. The mock link still
    /// closes, matching a socket that errors while being torn down.
    pub fn fail_next_disconnect(&self, err: RequestError) {
        self.lock().disconnect_failures.push_back(err);
    }

    /// Queue a failure for the next request
    pub fn fail_next_request(&self, err: RequestError) {
        self.lock().request_failures.push_back(err);
    }

    /// Configurations adopted through `reconfigure`, oldest first
    pub fn reconfigured(&self) -> Vec<DeviceConfig> {
        self.lock().reconfigured.clone()
    }
}

fn read_words(bank: &BTreeMap<u16, u16>, address: u16, count: u16) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(usize::from(count) * 2);
    for i in 0..count {
        let word = bank
            .get(&address.wrapping_add(i))
            .copied()
            .unwrap_or_default();
        bytes.extend_from_slice(&word.to_be_bytes());
    }
    bytes
}

fn read_bits(bank: &BTreeMap<u16, bool>, address: u16, count: u16) -> Vec<bool> {
    (0..count)
        .map(|i| {
            bank.get(&address.wrapping_add(i))
                .copied()
                .unwrap_or_default()
        })
        .collect()
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn connect(&mut self) -> Result<(), ConnectError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.connect_calls += 1;
        match inner.connect_failures.pop_front() {
            Some(err) => Err(err),
            None => {
                inner.connected = true;
                Ok(())
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), RequestError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.disconnect_calls += 1;
        inner.connected = false;
        match inner.disconnect_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u8>, RequestError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.next_request()?;
        Ok(read_words(&inner.holding, address, count))
    }

    async fn read_input_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u8>, RequestError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.next_request()?;
        Ok(read_words(&inner.input, address, count))
    }

    async fn read_coils(&mut self, address: u16, count: u16) -> Result<Vec<bool>, RequestError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.next_request()?;
        Ok(read_bits(&inner.coils, address, count))
    }

    async fn read_discrete_inputs(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, RequestError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.next_request()?;
        Ok(read_bits(&inner.discrete, address, count))
    }

    async fn write_single_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> Result<(), RequestError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.next_request()?;
        inner.holding.insert(address, value);
        Ok(())
    }

    async fn write_multiple_registers(
        &mut self,
        address: u16,
        bytes: &[u8],
    ) -> Result<(), RequestError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.next_request()?;
        for (i, pair) in bytes.chunks_exact(2).enumerate() {
            let word = u16::from_be_bytes([pair[0], pair[1]]);
            inner.holding.insert(address.wrapping_add(i as u16), word);
        }
        Ok(())
    }

    async fn write_single_coil(&mut self, address: u16, value: bool) -> Result<(), RequestError> {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.next_request()?;
        // stored as the wire word so tests can assert on what was sent
        let word = if value {
            constants::coil::ON
        } else {
            constants::coil::OFF
        };
        inner.coils.insert(address, word == constants::coil::ON);
        Ok(())
    }

    fn reconfigure(&mut self, config: &DeviceConfig) {
        let mut inner = self.inner.lock().expect("mock state poisoned");
        inner.reconfigured.push(config.clone());
    }
}
