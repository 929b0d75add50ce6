//! Membership oracle with a read-through answer cache.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::domain::MembershipOracle;
use crate::infrastructure::cache::{keys, Cache};
use crate::shared::error::AppError;

/// Caches `is_active_member` answers for `ttl_secs`. Active-chat lists go
/// straight to the inner oracle. Cache failures are errors, not misses.
pub struct CachedMembershipOracle<O, C> {
    inner: O,
    cache: C,
    ttl_secs: u64,
}

impl<O, C> CachedMembershipOracle<O, C>
where
    O: MembershipOracle,
    C: Cache,
{
    pub fn new(inner: O, cache: C, ttl_secs: u64) -> Self {
        Self {
            inner,
            cache,
            ttl_secs,
        }
    }
}

#[async_trait]
impl<O, C> MembershipOracle for CachedMembershipOracle<O, C>
where
    O: MembershipOracle,
    C: Cache,
{
    #[instrument(skip(self), level = "debug")]
    async fn is_active_member(&self, user_id: i64, chat_id: i64) -> Result<bool, AppError> {
        let key = keys::membership(chat_id, user_id);
        if let Some(active) = self.cache.get::<bool>(&key).await? {
            return Ok(active);
        }

        let active = self.inner.is_active_member(user_id, chat_id).await?;
        self.cache.set_ex(&key, &active, self.ttl_secs).await?;
        Ok(active)
    }

    async fn active_chats_of(&self, user_id: i64) -> Result<HashSet<i64>, AppError> {
        self.inner.active_chats_of(user_id).await
    }

    async fn invalidate(&self, user_id: i64, chat_id: i64) -> Result<(), AppError> {
        let removed = self.cache.delete(&keys::membership(chat_id, user_id)).await?;
        debug!(user_id, chat_id, removed, "Membership cache invalidated");
        self.inner.invalidate(user_id, chat_id).await
    }
}
