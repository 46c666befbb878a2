//! Feed snapshot pull and push.

use std::collections::BTreeSet;

use tracing::debug;

use feedsync_core::feed_list_hash;
use feedsync_crypto::{decrypt_json, encrypt_json};
use feedsync_relay::{FeedListPayload, Relay, RelayFactory, UpdateFeedsRequest};
use feedsync_store::{Store, StoreExt};

use crate::error::{Result, SyncError};
use crate::reconcile;
use crate::report::{FeedPullStats, FeedPushOutcome};
use crate::session::{log_background, ActiveSession, SyncClient};

impl<S: Store, F: RelayFactory> SyncClient<S, F> {
    /// Pull the feed snapshot in the background. Failures are logged.
    pub async fn get_feeds(&self) {
        log_background("get_feeds", self.pull_feeds().await);
    }

    /// Push local feed changes in the background. Failures are logged.
    pub async fn send_updated_feeds(&self) {
        log_background("send_updated_feeds", self.push_feeds().await);
    }

    /// Pull the remote feed snapshot and reconcile it into the store.
    ///
    /// Returns `None` when the remote hash matches the last agreed one; in
    /// that case nothing is decrypted and nothing is written.
    pub async fn pull_feeds(&self) -> Result<Option<FeedPullStats>> {
        let session = self.require_session().await?;
        self.pull_feeds_in(&session).await
    }

    /// Push the local feed list if it changed since the last agreed hash.
    ///
    /// On a precondition failure the remote snapshot is pulled and the push
    /// retried once. A second conflict is [`SyncError::Conflict`].
    pub async fn push_feeds(&self) -> Result<FeedPushOutcome> {
        let session = self.require_session().await?;
        self.push_feeds_in(&session).await
    }

    pub(crate) async fn pull_feeds_in(
        &self,
        session: &ActiveSession<F::Relay>,
    ) -> Result<Option<FeedPullStats>> {
        let chain = self.chain_record().await?;
        let response = session.relay.get_feeds(&session.identity).await?;

        if response.hash == chain.last_feeds_remote_hash {
            debug!(hash = %response.hash, "remote feeds unchanged");
            return Ok(None);
        }

        // The relay has nothing stored (or was reset): nothing to merge,
        // and no remote URL is known any more.
        if response.hash.is_none() {
            self.store.replace_remote_feed_url_snapshot(&BTreeSet::new()).await?;
            self.store.update_last_feeds_remote_hash(response.hash).await?;
            return Ok(Some(FeedPullStats::default()));
        }

        let payload: FeedListPayload = decrypt_json(&response.encrypted, &session.key)?;
        let local = self.store.get_all_feeds_ordered_by_url().await?;
        let remotely_seen = self.store.get_remote_feed_urls().await?;
        let plan = reconcile::plan(&payload.feeds, &local, &remotely_seen);

        let mut stats = FeedPullStats {
            skipped_locally_deleted: plan.skipped_locally_deleted,
            kept_local: plan.kept_local,
            ..FeedPullStats::default()
        };
        for url in &plan.deletions {
            if self.store.delete_feed_by_url(url).await? {
                debug!(%url, "deleted feed removed remotely");
                stats.deleted += 1;
            }
        }
        for feed in &plan.inserts {
            debug!(url = %feed.url, "inserting feed from remote");
            self.store.save_feed(feed).await?;
            stats.inserted += 1;
        }
        for feed in &plan.updates {
            debug!(url = %feed.url, when_modified = feed.when_modified, "updating feed from remote");
            self.store.save_feed(feed).await?;
            stats.updated += 1;
        }

        self.store.replace_remote_feed_url_snapshot(&plan.snapshot).await?;
        self.store.update_last_feeds_remote_hash(response.hash).await?;

        debug!(hash = %response.hash, ?stats, "pulled feeds");
        Ok(Some(stats))
    }

    pub(crate) async fn push_feeds_in(
        &self,
        session: &ActiveSession<F::Relay>,
    ) -> Result<FeedPushOutcome> {
        match self.try_push_feeds(session).await {
            Err(SyncError::Relay(e)) if e.is_precondition_failed() => {
                debug!("feed push conflicted; pulling before retry");
            }
            other => return other,
        }

        self.pull_feeds_in(session).await?;

        match self.try_push_feeds(session).await {
            Err(SyncError::Relay(e)) if e.is_precondition_failed() => Err(SyncError::Conflict),
            other => other,
        }
    }

    async fn try_push_feeds(&self, session: &ActiveSession<F::Relay>) -> Result<FeedPushOutcome> {
        let chain = self.chain_record().await?;
        let entries = self.store.get_feed_entries_ordered_by_url().await?;
        let hash = feed_list_hash(&entries)?;

        if hash == chain.last_feeds_remote_hash {
            debug!(%hash, "local feeds unchanged");
            return Ok(FeedPushOutcome::Unchanged);
        }

        let urls: BTreeSet<String> = entries.iter().map(|e| e.url.clone()).collect();
        let request = UpdateFeedsRequest {
            content_hash: hash,
            encrypted: encrypt_json(&FeedListPayload { feeds: entries }, &session.key)?,
        };
        let response = session
            .relay
            .update_feeds(&session.identity, chain.last_feeds_remote_hash, &request)
            .await?;

        // What was just pushed is now what the relay holds, so a feed deleted
        // here before the next pull counts as locally deleted.
        self.store.replace_remote_feed_url_snapshot(&urls).await?;
        self.store.update_last_feeds_remote_hash(response.hash).await?;

        debug!(hash = %response.hash, count = urls.len(), "pushed feeds");
        Ok(FeedPushOutcome::Pushed(response.hash))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use feedsync_core::{ContentHash, Feed};
    use feedsync_relay::{FeedsResponse, MemoryRelay, RelayCall, RelayOp};
    use feedsync_store::MemoryStore;

    use super::*;
    use crate::config::SyncSettings;

    type Client = SyncClient<MemoryStore, MemoryRelay>;

    async fn created(relay: &MemoryRelay) -> (Client, String) {
        let client = SyncClient::new(Arc::new(MemoryStore::new()), relay.clone(), SyncSettings::default());
        let code = client.create().await.unwrap();
        (client, code)
    }

    async fn last_hash(client: &Client) -> ContentHash {
        client
            .store()
            .get_sync_chain_config()
            .await
            .unwrap()
            .unwrap()
            .last_feeds_remote_hash
    }

    #[tokio::test]
    async fn test_push_then_pull_is_noop() {
        let relay = MemoryRelay::new();
        let (client, _) = created(&relay).await;
        client
            .store()
            .save_feed(&Feed::new("https://a.example/rss").modified_at(1))
            .await
            .unwrap();

        let outcome = client.push_feeds().await.unwrap();
        let hash = match outcome {
            FeedPushOutcome::Pushed(hash) => hash,
            FeedPushOutcome::Unchanged => panic!("expected a push"),
        };
        assert_eq!(last_hash(&client).await, hash);

        assert_eq!(client.push_feeds().await.unwrap(), FeedPushOutcome::Unchanged);
        assert_eq!(client.pull_feeds().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_conflict_retries_exactly_once() {
        let relay = MemoryRelay::new();
        let (client, _) = created(&relay).await;
        client.store().save_feed(&Feed::new("u").modified_at(1)).await.unwrap();
        relay.clear_calls().await;
        relay.force_conflicts(2).await;

        let err = client.push_feeds().await.unwrap_err();
        assert!(matches!(err, SyncError::Conflict));

        let ops: Vec<RelayOp> = relay.calls().await.iter().map(RelayCall::op).collect();
        assert_eq!(ops, vec![RelayOp::UpdateFeeds, RelayOp::GetFeeds, RelayOp::UpdateFeeds]);
        assert!(last_hash(&client).await.is_none());
    }

    #[tokio::test]
    async fn test_single_conflict_succeeds_on_retry() {
        let relay = MemoryRelay::new();
        let (client, _) = created(&relay).await;
        client.store().save_feed(&Feed::new("u").modified_at(1)).await.unwrap();
        relay.force_conflicts(1).await;

        assert!(matches!(
            client.push_feeds().await.unwrap(),
            FeedPushOutcome::Pushed(_)
        ));
    }

    #[tokio::test]
    async fn test_undecryptable_snapshot_aborts_pull() {
        let relay = MemoryRelay::new();
        let (client, code) = created(&relay).await;
        relay
            .set_feeds(
                &code,
                FeedsResponse {
                    hash: ContentHash(77),
                    encrypted: "not an envelope".into(),
                },
            )
            .await;

        let err = client.pull_feeds().await.unwrap_err();
        assert!(matches!(err, SyncError::Crypto(_)));
        assert!(last_hash(&client).await.is_none());
        assert!(client.store().get_remote_feed_urls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_relay_clears_snapshot() {
        let relay = MemoryRelay::new();
        let (client, code) = created(&relay).await;
        client.store().save_feed(&Feed::new("u").modified_at(1)).await.unwrap();
        client.push_feeds().await.unwrap();

        relay.set_feeds(&code, FeedsResponse::default()).await;
        let stats = client.pull_feeds().await.unwrap();
        assert_eq!(stats, Some(FeedPullStats::default()));
        assert!(client.store().get_remote_feed_urls().await.unwrap().is_empty());
        assert!(last_hash(&client).await.is_none());
        assert!(client.store().get_feed_by_url("u").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_background_ops_without_chain_make_no_calls() {
        let relay = MemoryRelay::new();
        let client: Client =
            SyncClient::new(Arc::new(MemoryStore::new()), relay.clone(), SyncSettings::default());

        client.get_feeds().await;
        client.send_updated_feeds().await;
        assert!(matches!(client.pull_feeds().await, Err(SyncError::NotConfigured)));
        assert!(relay.calls().await.is_empty());
    }
}
