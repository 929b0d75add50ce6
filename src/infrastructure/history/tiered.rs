//! Cache-then-durable composite store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::WritePolicy;
use crate::domain::{HistorySource, HistoryStore, Message, Page, PageParams};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Reads the fast tier first and falls back to the durable tier only when
/// the fast tier has nothing for the window. Pages are never merged.
#[derive(Clone)]
pub struct TieredHistoryStore {
    fast: Arc<dyn HistoryStore>,
    durable: Arc<dyn HistoryStore>,
    policy: WritePolicy,
}

impl TieredHistoryStore {
    pub fn new(
        fast: Arc<dyn HistoryStore>,
        durable: Arc<dyn HistoryStore>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            fast,
            durable,
            policy,
        }
    }
}

#[async_trait]
impl HistoryStore for TieredHistoryStore {
    #[instrument(
        skip(self, message),
        fields(chat_id = message.chat_id, message_id = message.id),
        level = "debug",
    )]
    async fn append(&self, message: &Message) -> Result<(), AppError> {
        self.fast.append(message).await?;
        if self.policy == WritePolicy::WriteThrough {
            // No rollback of the fast write if this fails.
            self.durable.append(message).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, chat_id: i64, params: &PageParams) -> Result<Page<Message>, AppError> {
        let mut page = self.fast.list(chat_id, params).await?;
        page.source = HistorySource::Fast;
        if page.is_empty() {
            debug!("Fast tier empty, reading durable tier");
            page = self.durable.list(chat_id, params).await?;
            page.source = HistorySource::Durable;
        }

        metrics::record_history_read(page.source.as_str());
        Ok(page)
    }
}

impl std::fmt::Debug for TieredHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredHistoryStore")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockall::predicate::*;

    use crate::domain::{HistorySource, MessageAction, MockHistoryStore};

    fn message(id: i64) -> Message {
        Message {
            id,
            action: MessageAction::Send,
            text: "hi".into(),
            chat_id: 7,
            sender_id: 1,
            target_id: None,
            created_at: Utc::now(),
        }
    }

    fn page(items: Vec<Message>, source: HistorySource) -> Page<Message> {
        Page::new(items, &PageParams::latest(10), None, source)
    }

    #[tokio::test]
    async fn test_fast_hit_skips_durable() {
        let mut fast = MockHistoryStore::new();
        fast.expect_list()
            .with(eq(7), always())
            .returning(|_, _| Ok(page(vec![message(1)], HistorySource::Fast)));
        let mut durable = MockHistoryStore::new();
        durable.expect_list().never();

        let store = TieredHistoryStore::new(
            Arc::new(fast),
            Arc::new(durable),
            WritePolicy::FastOnly,
        );
        let result = store.list(7, &PageParams::latest(10)).await.unwrap();
        assert_eq!(result.source, HistorySource::Fast);
    }

    #[tokio::test]
    async fn test_fast_miss_reads_durable() {
        let mut fast = MockHistoryStore::new();
        fast.expect_list()
            .returning(|_, _| Ok(page(vec![], HistorySource::Fast)));
        let mut durable = MockHistoryStore::new();
        durable
            .expect_list()
            .times(1)
            .returning(|_, _| Ok(page(vec![message(1), message(2)], HistorySource::Durable)));

        let store = TieredHistoryStore::new(
            Arc::new(fast),
            Arc::new(durable),
            WritePolicy::FastOnly,
        );
        let result = store.list(7, &PageParams::latest(10)).await.unwrap();
        assert_eq!(result.source, HistorySource::Durable);
        assert_eq!(result.items.len(), 2);
    }

    #[tokio::test]
    async fn test_fast_error_is_not_a_miss() {
        let mut fast = MockHistoryStore::new();
        fast.expect_list()
            .returning(|_, _| Err(AppError::Internal("cache down".into())));
        let mut durable = MockHistoryStore::new();
        durable.expect_list().never();

        let store = TieredHistoryStore::new(
            Arc::new(fast),
            Arc::new(durable),
            WritePolicy::FastOnly,
        );
        assert!(store.list(7, &PageParams::latest(10)).await.is_err());
    }

    #[tokio::test]
    async fn test_fast_only_append_skips_durable() {
        let mut fast = MockHistoryStore::new();
        fast.expect_append().times(1).returning(|_| Ok(()));
        let mut durable = MockHistoryStore::new();
        durable.expect_append().never();

        let store = TieredHistoryStore::new(
            Arc::new(fast),
            Arc::new(durable),
            WritePolicy::FastOnly,
        );
        store.append(&message(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_through_surfaces_durable_failure() {
        let mut fast = MockHistoryStore::new();
        fast.expect_append().times(1).returning(|_| Ok(()));
        let mut durable = MockHistoryStore::new();
        durable
            .expect_append()
            .times(1)
            .returning(|_| Err(AppError::Internal("db down".into())));

        let store =
            TieredHistoryStore::new(Arc::new(fast), Arc::new(durable), WritePolicy::WriteThrough);
        assert!(store.append(&message(1)).await.is_err());
    }
}
