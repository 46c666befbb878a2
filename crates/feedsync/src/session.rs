//! The sync client and its session state machine.
//!
//! A [`SyncClient`] is either uninitialized or initialized. Initialized
//! means the chain identity, a relay client and the decoded key are all
//! present, held together in one [`ActiveSession`] so no caller can observe
//! a partial combination. One mutex guards the transition; once initialized
//! the fast path is lock, clone the `Arc`, unlock.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use feedsync_core::{now_millis, DeviceRecord, SyncChainConfig};
use feedsync_crypto::{decode_key, encode_key, encrypt_string, SecretKey};
use feedsync_relay::{ChainIdentity, Relay, RelayFactory};
use feedsync_store::Store;

use crate::config::SyncSettings;
use crate::error::{Result, SyncError};
use crate::report::{FeedPushOutcome, SyncReport, SyncStep};

/// Everything a sync operation needs. Immutable once built; `create`,
/// `join` and `leave` replace it wholesale.
pub(crate) struct ActiveSession<R> {
    pub(crate) identity: ChainIdentity,
    pub(crate) relay: R,
    pub(crate) key: SecretKey,
}

enum SessionState<R> {
    Uninitialized,
    Initialized(Arc<ActiveSession<R>>),
}

/// The sync engine.
///
/// Owns the session state and runs every sync operation against a
/// [`Store`] and relays built by a [`RelayFactory`]. Share it behind an
/// `Arc`; all methods take `&self`.
pub struct SyncClient<S: Store, F: RelayFactory> {
    pub(crate) store: Arc<S>,
    relays: F,
    pub(crate) settings: SyncSettings,
    state: Mutex<SessionState<F::Relay>>,
}

impl<S: Store, F: RelayFactory> SyncClient<S, F> {
    /// Create a client. Nothing is loaded until first use.
    pub fn new(store: Arc<S>, relays: F, settings: SyncSettings) -> Self {
        Self {
            store,
            relays,
            settings,
            state: Mutex::new(SessionState::Uninitialized),
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Whether a session is currently active.
    pub async fn is_initialized(&self) -> bool {
        matches!(*self.state.lock().await, SessionState::Initialized(_))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Initialization
    // ─────────────────────────────────────────────────────────────────────────

    /// Initialize the session from the stored chain record.
    ///
    /// Returns whether a session is active afterwards. An unconfigured chain
    /// is not an error. Failures are logged and reported as `false`.
    pub async fn initialize(&self) -> bool {
        match self.session().await {
            Ok(session) => session.is_some(),
            Err(e) => {
                warn!(error = %e, "sync initialization failed");
                false
            }
        }
    }

    /// The active session, initializing it if needed. `None` when no chain
    /// is configured.
    pub(crate) async fn session(&self) -> Result<Option<Arc<ActiveSession<F::Relay>>>> {
        let mut state = self.state.lock().await;
        self.ensure_initialized(&mut state).await
    }

    /// Like [`Self::session`], but an unconfigured chain is
    /// [`SyncError::NotConfigured`].
    pub(crate) async fn require_session(&self) -> Result<Arc<ActiveSession<F::Relay>>> {
        self.session().await?.ok_or(SyncError::NotConfigured)
    }

    async fn ensure_initialized(
        &self,
        state: &mut SessionState<F::Relay>,
    ) -> Result<Option<Arc<ActiveSession<F::Relay>>>> {
        if let SessionState::Initialized(session) = state {
            return Ok(Some(Arc::clone(session)));
        }

        let chain = match self.load_chain().await? {
            Some(chain) if chain.has_sync_chain() => chain,
            _ => {
                debug!("no sync chain configured");
                return Ok(None);
            }
        };

        let session = Arc::new(ActiveSession {
            key: decode_key(&chain.secret_key)?,
            relay: self.relays.connect(&chain.relay_url)?,
            identity: ChainIdentity::new(chain.sync_chain_id, chain.device_id),
        });
        *state = SessionState::Initialized(Arc::clone(&session));

        info!(
            sync_chain_id = %session.identity.sync_chain_id,
            device_id = %session.identity.device_id,
            "sync session initialized"
        );
        Ok(Some(session))
    }

    /// Load the chain record, moving it off a retired relay host first.
    async fn load_chain(&self) -> Result<Option<SyncChainConfig>> {
        let mut chain = match self.store.get_sync_chain_config().await? {
            Some(chain) => chain,
            None => return Ok(None),
        };

        if chain.uses_deprecated_host(&self.settings.deprecated_hosts) {
            info!(
                from = %chain.relay_url,
                to = %self.settings.default_relay_url,
                "moving sync chain off retired relay host"
            );
            chain.relay_url = self.settings.default_relay_url.clone();
            self.store.update_sync_chain_config(&chain).await?;
        }

        Ok(Some(chain))
    }

    /// The stored chain record. Sync operations read bookkeeping (hash,
    /// high-water mark) from here rather than from the session.
    pub(crate) async fn chain_record(&self) -> Result<SyncChainConfig> {
        self.store
            .get_sync_chain_config()
            .await?
            .ok_or(SyncError::NotConfigured)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chain Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new sync chain with this device as its first member.
    ///
    /// Ignores any active session. Reuses the stored key when it decodes,
    /// otherwise generates one. Returns the sync code to share with other
    /// devices.
    pub async fn create(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        let chain = match self.load_chain().await? {
            Some(chain) => chain,
            None => self.settings.default_chain(""),
        };
        let key = decode_key(&chain.secret_key).unwrap_or_else(|_| SecretKey::generate());
        let device_name = self.device_name_of(&chain);

        let relay = self.relays.connect(&chain.relay_url)?;
        let response = relay.create(&encrypt_string(&device_name, &key)?).await?;

        let mut chain = chain.joined(response.sync_code.clone(), response.device_id);
        chain.secret_key = encode_key(&key);
        chain.device_name = device_name.clone();

        // From here the store moves to the new chain. If this future is
        // dropped mid-way, the next caller initializes from the store.
        *state = SessionState::Uninitialized;
        self.store_new_membership(&chain).await?;

        info!(sync_chain_id = %response.sync_code, device_id = %response.device_id, "created sync chain");
        *state = SessionState::Initialized(Arc::new(ActiveSession {
            identity: ChainIdentity::new(response.sync_code.clone(), response.device_id),
            relay,
            key,
        }));
        Ok(response.sync_code)
    }

    /// Join an existing chain with its sync code and shared key.
    ///
    /// The key is persisted before the relay is contacted, so a failed join
    /// keeps it for a retry. Returns the chain's sync code.
    pub async fn join(&self, sync_code: &str, remote_key: &str) -> Result<String> {
        let key = decode_key(remote_key)?;
        let mut state = self.state.lock().await;

        let (relay_url, device_name) = match self.load_chain().await? {
            Some(chain) => {
                let device_name = self.device_name_of(&chain);
                (chain.relay_url, device_name)
            }
            None => (self.settings.default_relay_url.clone(), self.settings.default_device_name.clone()),
        };

        let pending = SyncChainConfig::unconfigured(relay_url, device_name.clone(), encode_key(&key));
        self.store.update_sync_chain_config(&pending).await?;
        *state = SessionState::Uninitialized;

        let relay = self.relays.connect(&pending.relay_url)?;
        let response = relay
            .join(sync_code.trim(), &encrypt_string(&device_name, &key)?)
            .await?;

        let chain = pending.joined(response.sync_code.clone(), response.device_id);
        self.store_new_membership(&chain).await?;

        info!(sync_chain_id = %response.sync_code, device_id = %response.device_id, "joined sync chain");
        *state = SessionState::Initialized(Arc::new(ActiveSession {
            identity: ChainIdentity::new(response.sync_code.clone(), response.device_id),
            relay,
            key,
        }));
        Ok(response.sync_code)
    }

    /// Leave the chain and reset to an unconfigured default.
    ///
    /// Telling the relay is best effort: the local reset happens even when
    /// the relay is unreachable. Only store failures are returned.
    pub async fn leave(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        match self.ensure_initialized(&mut state).await {
            Ok(Some(session)) => {
                let identity = &session.identity;
                if let Err(e) = session.relay.remove_device(identity, identity.device_id).await {
                    warn!(error = %e, "could not notify relay of leave; resetting locally anyway");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not initialize session for leave"),
        }

        *state = SessionState::Uninitialized;

        let device_name = self
            .store
            .get_sync_chain_config()
            .await?
            .map(|chain| chain.device_name)
            .unwrap_or_default();
        let default = self.settings.default_chain(&device_name);
        self.store.replace_with_default_sync_chain(&default).await?;

        info!("left sync chain");
        Ok(())
    }

    fn device_name_of(&self, chain: &SyncChainConfig) -> String {
        if chain.device_name.is_empty() {
            self.settings.default_device_name.clone()
        } else {
            chain.device_name.clone()
        }
    }

    /// Persist a fresh membership and drop caches of any previous chain.
    async fn store_new_membership(&self, chain: &SyncChainConfig) -> Result<()> {
        self.store.update_sync_chain_config(chain).await?;
        self.store.replace_remote_feed_url_snapshot(&BTreeSet::new()).await?;
        self.store
            .replace_device_list(&[DeviceRecord {
                device_id: chain.device_id,
                device_name: chain.device_name.clone(),
            }])
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Cycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one full sync cycle.
    ///
    /// Steps run in [`SyncStep`] order. A failed step is recorded in the
    /// report and the remaining steps still run.
    pub async fn sync_all(&self) -> SyncReport {
        let mut report = SyncReport::default();

        let session = match self.session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("sync chain not configured; nothing to sync");
                return report;
            }
            Err(e) => {
                warn!(error = %e, "sync initialization failed");
                report.record_error(SyncStep::Initialize, e);
                return report;
            }
        };
        report.configured = true;

        match self.refresh_devices_in(&session).await {
            Ok(devices) => report.device_count = devices.len(),
            Err(e) => report.record_error(SyncStep::Devices, e),
        }
        match self.pull_feeds_in(&session).await {
            Ok(stats) => report.feeds_pulled = stats,
            Err(e) => report.record_error(SyncStep::PullFeeds, e),
        }
        match self.push_feeds_in(&session).await {
            Ok(outcome) => report.feeds_pushed = matches!(outcome, FeedPushOutcome::Pushed(_)),
            Err(e) => report.record_error(SyncStep::PushFeeds, e),
        }
        match self.pull_read_marks_in(&session).await {
            Ok(stats) => report.read_marks_received = stats,
            Err(e) => report.record_error(SyncStep::PullReadMarks, e),
        }
        match self.store.apply_pending_read_marks().await {
            Ok(applied) => report.pending_read_marks_applied = applied,
            Err(e) => report.record_error(SyncStep::ApplyPendingReadMarks, e),
        }
        match self.push_read_marks_in(&session).await {
            Ok(sent) => report.read_marks_sent = sent,
            Err(e) => report.record_error(SyncStep::PushReadMarks, e),
        }

        let ttl = i64::try_from(self.settings.pending_read_mark_ttl.as_millis()).unwrap_or(i64::MAX);
        match self.store.prune_pending_read_marks(now_millis().saturating_sub(ttl)).await {
            Ok(pruned) => report.pending_read_marks_pruned = pruned,
            Err(e) => report.record_error(SyncStep::PrunePendingReadMarks, e),
        }

        for (step, error) in &report.errors {
            warn!(%step, %error, "sync step failed");
        }
        info!(
            devices = report.device_count,
            feeds_pushed = report.feeds_pushed,
            read_marks_sent = report.read_marks_sent,
            failed_steps = report.errors.len(),
            "sync cycle finished"
        );
        report
    }
}

impl<S: Store + 'static, F: RelayFactory + 'static> SyncClient<S, F> {
    /// Initialize on a background task, e.g. at application start.
    pub fn spawn_initialize(self: &Arc<Self>) -> JoinHandle<bool> {
        let client = Arc::clone(self);
        tokio::spawn(async move { client.initialize().await })
    }
}

/// Log the failure of a background operation.
///
/// An unconfigured chain is the quiet no-op case.
pub(crate) fn log_background<T>(operation: &'static str, result: Result<T>) {
    match result {
        Ok(_) => {}
        Err(SyncError::NotConfigured) => debug!(operation, "sync not configured; skipped"),
        Err(e) => warn!(operation, error = %e, "background sync operation failed"),
    }
}
