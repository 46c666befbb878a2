//! Device membership.
//!
//! The relay is authoritative for who is in the chain: every successful
//! list or remove replaces the local device list wholesale.

use tracing::debug;

use feedsync_core::{DeviceId, DeviceRecord};
use feedsync_crypto::{decrypt_string, SecretKey};
use feedsync_relay::{DeviceListResponse, Relay, RelayFactory};
use feedsync_store::Store;

use crate::error::Result;
use crate::session::{log_background, ActiveSession, SyncClient};

impl<S: Store, F: RelayFactory> SyncClient<S, F> {
    /// Refresh the device list in the background. Failures are logged.
    pub async fn get_devices(&self) {
        log_background("get_devices", self.refresh_devices().await);
    }

    /// Fetch the device list from the relay and store it.
    pub async fn refresh_devices(&self) -> Result<Vec<DeviceRecord>> {
        let session = self.require_session().await?;
        self.refresh_devices_in(&session).await
    }

    /// Remove a device from the chain, possibly this one.
    ///
    /// No-op when no chain is configured. Relay and decryption failures
    /// are returned; on failure the local list is untouched.
    pub async fn remove_device(&self, target: DeviceId) -> Result<()> {
        let session = match self.session().await? {
            Some(session) => session,
            None => return Ok(()),
        };

        let response = session
            .relay
            .remove_device(&session.identity, target)
            .await?;
        let devices = decrypt_devices(&response, &session.key)?;
        self.store.replace_device_list(&devices).await?;

        debug!(%target, remaining = devices.len(), "removed device");
        Ok(())
    }

    pub(crate) async fn refresh_devices_in(
        &self,
        session: &ActiveSession<F::Relay>,
    ) -> Result<Vec<DeviceRecord>> {
        let response = session.relay.get_devices(&session.identity).await?;
        let devices = decrypt_devices(&response, &session.key)?;
        self.store.replace_device_list(&devices).await?;

        debug!(count = devices.len(), "refreshed device list");
        Ok(devices)
    }
}

/// Decrypt every device name. One bad name fails the whole list.
fn decrypt_devices(response: &DeviceListResponse, key: &SecretKey) -> Result<Vec<DeviceRecord>> {
    response
        .devices
        .iter()
        .map(|device| -> Result<DeviceRecord> {
            Ok(DeviceRecord {
                device_id: device.device_id,
                device_name: decrypt_string(&device.device_name, key)?,
            })
        })
        .collect()
}
