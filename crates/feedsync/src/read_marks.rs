//! Read-mark propagation.
//!
//! Push sends unsynced read items in fixed-size batches, flagging each
//! batch only after the relay accepted it. Pull applies remote marks one
//! by one and advances the high-water mark after each, so an interrupted
//! pull resumes where it stopped.

use tracing::{debug, warn};

use feedsync_core::{ReadMark, ReadMarkEvent};
use feedsync_crypto::{decrypt_json, encrypt_json};
use feedsync_relay::{Relay, RelayFactory, SendEncryptedReadMark, SendReadMarksRequest};
use feedsync_store::Store;

use crate::error::Result;
use crate::report::ReadPullStats;
use crate::session::{log_background, ActiveSession, SyncClient};

impl<S: Store, F: RelayFactory> SyncClient<S, F> {
    /// Pull read marks in the background. Failures are logged.
    pub async fn get_read(&self) {
        log_background("get_read", self.pull_read_marks().await);
    }

    /// Push local read marks in the background. Failures are logged.
    pub async fn mark_as_read(&self) {
        log_background("mark_as_read", self.push_read_marks().await);
    }

    /// Fetch read marks newer than the high-water mark and apply them.
    ///
    /// A mark that fails to decrypt is skipped; the rest are still applied.
    pub async fn pull_read_marks(&self) -> Result<ReadPullStats> {
        let session = self.require_session().await?;
        self.pull_read_marks_in(&session).await
    }

    /// Send every unsynced read item. Returns how many were sent.
    ///
    /// Stops at the first failed batch; earlier batches stay flagged as
    /// synced, later ones are retried on the next call.
    pub async fn push_read_marks(&self) -> Result<usize> {
        let session = self.require_session().await?;
        self.push_read_marks_in(&session).await
    }

    pub(crate) async fn pull_read_marks_in(
        &self,
        session: &ActiveSession<F::Relay>,
    ) -> Result<ReadPullStats> {
        let chain = self.chain_record().await?;
        // The relay's `since` is inclusive; the mark at the high-water mark
        // itself was already applied.
        let since = chain.latest_message_timestamp.saturating_add(1);
        let response = session.relay.get_read_marks(&session.identity, since).await?;

        let mut stats = ReadPullStats::default();
        for message in response.read_marks {
            let mark: ReadMark = match decrypt_json(&message.encrypted, &session.key) {
                Ok(mark) => mark,
                Err(e) => {
                    warn!(timestamp = message.timestamp, error = %e, "skipping undecryptable read mark");
                    stats.undecryptable += 1;
                    continue;
                }
            };
            let event = ReadMarkEvent {
                mark,
                timestamp: message.timestamp,
            };

            let applied = self
                .store
                .apply_remote_read_mark(&event.mark.feed_url, &event.mark.article_guid)
                .await?;
            if applied {
                stats.applied += 1;
            } else {
                debug!(feed_url = %event.mark.feed_url, guid = %event.mark.article_guid, "read mark for unknown item kept pending");
                stats.pending += 1;
            }
            self.store.update_latest_message_timestamp(event.timestamp).await?;
        }

        debug!(since, ?stats, "pulled read marks");
        Ok(stats)
    }

    pub(crate) async fn push_read_marks_in(&self, session: &ActiveSession<F::Relay>) -> Result<usize> {
        let items = self.store.get_unsynced_read_items().await?;
        let mut sent = 0;

        for batch in items.chunks(self.settings.batch_size()) {
            let encrypted = batch
                .iter()
                .map(|item| -> Result<SendEncryptedReadMark> {
                    Ok(SendEncryptedReadMark {
                        encrypted: encrypt_json(&ReadMark::from(item), &session.key)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            session
                .relay
                .send_read_marks(&session.identity, &SendReadMarksRequest { items: encrypted })
                .await?;

            for item in batch {
                self.store.mark_item_synced(item.item_id).await?;
            }
            sent += batch.len();
            debug!(batch = batch.len(), sent, "sent read marks");
        }

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use feedsync_core::Feed;
    use feedsync_relay::{EncryptedReadMark, MemoryRelay, RelayCall, RelayOp};
    use feedsync_store::MemoryStore;

    use super::*;
    use crate::config::SyncSettings;

    type Client = SyncClient<MemoryStore, MemoryRelay>;

    const FEED: &str = "https://a.example/rss";

    fn new_client(relay: &MemoryRelay) -> Client {
        SyncClient::new(Arc::new(MemoryStore::new()), relay.clone(), SyncSettings::default())
    }

    async fn pair(relay: &MemoryRelay) -> (Client, Client, String) {
        let first = new_client(relay);
        let code = first.create().await.unwrap();
        let key = first.store().get_sync_chain_config().await.unwrap().unwrap().secret_key;
        let second = new_client(relay);
        second.join(&code, &key).await.unwrap();
        (first, second, code)
    }

    async fn read_items(client: &Client, guids: &[String]) {
        let store = client.store();
        if store.get_feed_by_url(FEED).await.unwrap().is_none() {
            store.save_feed(&Feed::new(FEED)).await.unwrap();
        }
        for guid in guids {
            let item = store.add_item(FEED, guid).unwrap();
            store.mark_item_read(item.id).unwrap();
        }
    }

    fn guids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("guid-{:03}", i)).collect()
    }

    #[tokio::test]
    async fn test_push_batches_in_order() {
        let relay = MemoryRelay::new();
        let (first, _, _) = pair(&relay).await;
        read_items(&first, &guids(250)).await;
        relay.clear_calls().await;

        assert_eq!(first.push_read_marks().await.unwrap(), 250);
        assert_eq!(
            relay.calls_of(RelayOp::SendReadMarks).await,
            vec![
                RelayCall::SendReadMarks { count: 100 },
                RelayCall::SendReadMarks { count: 100 },
                RelayCall::SendReadMarks { count: 50 },
            ]
        );
        assert!(first.store().get_unsynced_read_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_items_unsynced() {
        let relay = MemoryRelay::new();
        let (first, _, _) = pair(&relay).await;
        read_items(&first, &guids(3)).await;
        relay.fail_next(RelayOp::SendReadMarks, 1).await;

        assert!(first.push_read_marks().await.is_err());
        assert_eq!(first.store().get_unsynced_read_items().await.unwrap().len(), 3);

        assert_eq!(first.push_read_marks().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_pull_applies_and_advances() {
        let relay = MemoryRelay::new();
        let (first, second, code) = pair(&relay).await;
        read_items(&first, &guids(2)).await;
        first.push_read_marks().await.unwrap();

        second.store().save_feed(&Feed::new(FEED)).await.unwrap();
        second.store().add_item(FEED, "guid-000").unwrap();

        let stats = second.pull_read_marks().await.unwrap();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.pending, 1);
        assert!(second.store().get_item(FEED, "guid-000").unwrap().unwrap().read);

        assert_eq!(relay.read_mark_count(&code).await, 2);
        let latest = second
            .store()
            .get_sync_chain_config()
            .await
            .unwrap()
            .unwrap()
            .latest_message_timestamp;
        assert!(latest > 0);

        relay.clear_calls().await;
        let again = second.pull_read_marks().await.unwrap();
        assert_eq!(again, ReadPullStats::default());
        assert_eq!(
            relay.calls().await,
            vec![RelayCall::GetReadMarks { since: latest + 1 }]
        );
    }

    #[tokio::test]
    async fn test_undecryptable_mark_is_skipped() {
        let relay = MemoryRelay::new();
        let (first, second, code) = pair(&relay).await;
        relay
            .push_read_mark(
                &code,
                EncryptedReadMark {
                    encrypted: "garbage".into(),
                    timestamp: 10,
                },
            )
            .await;
        let key = feedsync_crypto::decode_key(
            &first.store().get_sync_chain_config().await.unwrap().unwrap().secret_key,
        )
        .unwrap();
        relay
            .push_read_mark(
                &code,
                EncryptedReadMark {
                    encrypted: encrypt_json(&ReadMark::new(FEED, "g"), &key).unwrap(),
                    timestamp: 11,
                },
            )
            .await;

        let stats = second.pull_read_marks().await.unwrap();
        assert_eq!(stats.undecryptable, 1);
        assert_eq!(stats.pending, 1);
        let chain = second.store().get_sync_chain_config().await.unwrap().unwrap();
        assert_eq!(chain.latest_message_timestamp, 11);
    }
}
