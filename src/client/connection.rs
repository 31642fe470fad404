use std::time::Duration;

use crate::constants;
use crate::error::{ConnectError, RequestError};
use crate::transport::Transaction;
use crate::types::{ConnectionMode, DeviceConfig};

/// The lifecycle state of the link to the server
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// No link exists
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// The link is open and requests can be issued
    Connected,
    /// A teardown is in flight
    Disconnecting,
}

/// Socket-level events reported by the transport owner, outside the
/// request/response flow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// The server or the network closed the link
    Closed,
    /// The link went idle past its timeout and was torn down
    Timeout,
}

/// Owns the transport and the lifecycle state for one device.
///
/// All transitions happen here so the state and the physical link can only
/// diverge for the duration of a single await. Reconnect decisions are made
/// from the state, never by probing the socket.
pub(crate) struct ConnectionManager<T>
where
    T: Transaction,
{
    transport: T,
    config: DeviceConfig,
    state: LinkState,
}

impl<T> ConnectionManager<T>
where
    T: Transaction,
{
    pub(crate) fn new(transport: T, config: DeviceConfig) -> Self {
        Self {
            transport,
            config,
            state: LinkState::Disconnected,
        }
    }

    pub(crate) fn state(&self) -> LinkState {
        self.state
    }

    pub(crate) fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub(crate) fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open the link if it is not already open. A connect while Connected
    /// resolves immediately without touching the socket, and a transport
    /// that reports the socket as already connected counts as success.
    pub(crate) async fn ensure_connected(&mut self) -> Result<(), RequestError> {
        if self.state == LinkState::Connected {
            return Ok(());
        }
        self.state = LinkState::Connecting;
        match self.transport.connect().await {
            Ok(()) => {
                tracing::info!(host = %self.config.host, port = self.config.port, "connected");
                self.state = LinkState::Connected;
                Ok(())
            }
            Err(ConnectError::AlreadyConnected) => {
                tracing::debug!("socket already connected, treating as success");
                self.state = LinkState::Connected;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(host = %self.config.host, "connect failed: {err}");
                self.state = LinkState::Disconnected;
                Err(err.into())
            }
        }
    }

    /// Close the link if it is open, a no-op from any other state. The state
    /// becomes Disconnected even when the teardown itself reports an error.
    pub(crate) async fn ensure_disconnected(&mut self) -> Result<(), RequestError> {
        if self.state != LinkState::Connected {
            return Ok(());
        }
        self.state = LinkState::Disconnecting;
        let result = self.transport.disconnect().await;
        self.state = LinkState::Disconnected;
        if let Err(err) = &result {
            tracing::warn!("disconnect failed: {err}");
        }
        result
    }

    /// React to an unsolicited close or timeout. The link is considered down
    /// immediately. In persistent mode the caller receives the backoff delay
    /// after which it should invoke [`Self::attempt_reconnect`] once.
    pub(crate) fn handle_event(&mut self, event: LinkEvent) -> Option<Duration> {
        tracing::warn!(?event, "link lost");
        self.state = LinkState::Disconnected;
        match self.config.mode {
            ConnectionMode::Persistent => Some(constants::link::RECONNECT_DELAY),
            ConnectionMode::PerOperation => None,
        }
    }

    /// The one automatic reconnect attempt after an unsolicited close.
    /// Failure is logged but not surfaced since there is no caller to
    /// report to. The next attempt waits for the next link event or an
    /// explicit connect.
    pub(crate) async fn attempt_reconnect(&mut self) {
        if self.state != LinkState::Disconnected {
            return;
        }
        if let Err(err) = self.ensure_connected().await {
            tracing::warn!("automatic reconnect failed: {err}");
        }
    }

    /// Adopt a new configuration: tear the link down, hand the settings to
    /// the transport, and reconnect when the new mode is persistent.
    ///
    /// If that connect fails the previous known-good settings are restored,
    /// the link is re-established under them on a best-effort basis, and the
    /// original error is returned.
    pub(crate) async fn update_settings(
        &mut self,
        config: DeviceConfig,
    ) -> Result<(), RequestError> {
        let previous = self.config.clone();
        // a teardown error does not block the settings change, the state is
        // Disconnected afterwards either way
        if let Err(err) = self.ensure_disconnected().await {
            tracing::warn!("disconnect before settings change failed: {err}");
        }

        self.config = config;
        self.transport.reconfigure(&self.config);
        if self.config.mode != ConnectionMode::Persistent {
            return Ok(());
        }

        match self.ensure_connected().await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!("new settings rejected, reverting: {err}");
                self.config = previous;
                self.transport.reconfigure(&self.config);
                if self.config.mode == ConnectionMode::Persistent {
                    if let Err(revert_err) = self.ensure_connected().await {
                        tracing::warn!("reconnect under previous settings failed: {revert_err}");
                    }
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;

    fn config(mode: ConnectionMode) -> DeviceConfig {
        DeviceConfig::new("10.0.0.2", 502, 1).mode(mode)
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_connected() {
        let (transport, handle) = mock::pair();
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::Persistent));
        manager.ensure_connected().await.unwrap();
        manager.ensure_connected().await.unwrap();
        manager.ensure_connected().await.unwrap();
        assert_eq!(handle.connect_calls(), 1);
        assert_eq!(manager.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_while_disconnected() {
        let (transport, handle) = mock::pair();
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::Persistent));
        manager.ensure_disconnected().await.unwrap();
        manager.ensure_disconnected().await.unwrap();
        assert_eq!(handle.disconnect_calls(), 0);
        assert_eq!(manager.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn already_connected_counts_as_success() {
        let (transport, handle) = mock::pair();
        handle.fail_next_connect(ConnectError::AlreadyConnected);
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::Persistent));
        manager.ensure_connected().await.unwrap();
        assert_eq!(manager.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn failed_connect_returns_to_disconnected() {
        let (transport, handle) = mock::pair();
        handle.fail_next_connect(ConnectError::Refused);
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::Persistent));
        let err = manager.ensure_connected().await.unwrap_err();
        assert_eq!(err, RequestError::Connect(ConnectError::Refused));
        assert_eq!(manager.state(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn link_events_schedule_reconnect_only_in_persistent_mode() {
        let (transport, _handle) = mock::pair();
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::Persistent));
        manager.ensure_connected().await.unwrap();
        assert_eq!(
            manager.handle_event(LinkEvent::Closed),
            Some(constants::link::RECONNECT_DELAY)
        );
        assert_eq!(manager.state(), LinkState::Disconnected);

        let (transport, _handle) = mock::pair();
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::PerOperation));
        assert_eq!(manager.handle_event(LinkEvent::Timeout), None);
    }

    #[tokio::test]
    async fn reconnect_failure_is_swallowed() {
        let (transport, handle) = mock::pair();
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::Persistent));
        manager.ensure_connected().await.unwrap();
        manager.handle_event(LinkEvent::Closed);
        handle.fail_next_connect(ConnectError::TimedOut);
        manager.attempt_reconnect().await;
        assert_eq!(manager.state(), LinkState::Disconnected);
        // a later explicit connect still works
        manager.ensure_connected().await.unwrap();
        assert_eq!(manager.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn settings_update_reverts_on_failed_connect() {
        let (transport, handle) = mock::pair();
        let good = config(ConnectionMode::Persistent);
        let mut manager = ConnectionManager::new(transport, good.clone());
        manager.ensure_connected().await.unwrap();

        let bad = DeviceConfig::new("10.0.0.99", 502, 3).mode(ConnectionMode::Persistent);
        handle.fail_next_connect(ConnectError::Refused);
        let err = manager.update_settings(bad).await.unwrap_err();
        assert_eq!(err, RequestError::Connect(ConnectError::Refused));

        // reverted to the previous settings and reconnected under them
        assert_eq!(manager.config(), &good);
        assert_eq!(manager.state(), LinkState::Connected);
        let configs = handle.reconfigured();
        assert_eq!(configs.last().unwrap(), &good);
    }

    #[tokio::test]
    async fn settings_update_survives_a_failed_disconnect() {
        let (transport, handle) = mock::pair();
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::Persistent));
        manager.ensure_connected().await.unwrap();

        let new = DeviceConfig::new("10.0.0.50", 502, 3).mode(ConnectionMode::Persistent);
        handle.fail_next_disconnect(RequestError::Io(std::io::ErrorKind::BrokenPipe));
        manager.update_settings(new.clone()).await.unwrap();

        // the teardown error was logged, the new settings still took effect
        assert_eq!(manager.config(), &new);
        assert_eq!(manager.state(), LinkState::Connected);
        assert_eq!(handle.reconfigured(), vec![new]);
        assert_eq!(handle.connect_calls(), 2);
    }

    #[tokio::test]
    async fn settings_update_to_per_operation_leaves_link_down() {
        let (transport, handle) = mock::pair();
        let mut manager = ConnectionManager::new(transport, config(ConnectionMode::Persistent));
        manager.ensure_connected().await.unwrap();

        let new = config(ConnectionMode::PerOperation);
        manager.update_settings(new.clone()).await.unwrap();
        assert_eq!(manager.state(), LinkState::Disconnected);
        assert_eq!(manager.config(), &new);
        assert_eq!(handle.disconnect_calls(), 1);
        assert_eq!(handle.connect_calls(), 1);
    }
}
