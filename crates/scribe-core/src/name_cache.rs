use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::rpc::SlackRpc;

/// Process-lifetime memoization of user id -> display name.
///
/// Unbounded with no eviction: the id space is one workspace's members, and
/// the cache lives only as long as the bot process. The lock is never held
/// across the network call, so two concurrent misses on the same id may both
/// look the name up; the second store is idempotent.
#[derive(Default)]
pub struct NameCache {
    names: Mutex<HashMap<String, String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the display name for `user_id`, looking it up over the wire
    /// at most once per id. Lookup failures are not cached, so a later
    /// event retries.
    pub async fn resolve(&self, rpc: &dyn SlackRpc, user_id: &str) -> Result<String> {
        if let Some(name) = self.cached(user_id)? {
            return Ok(name);
        }
        let name = rpc.user_display_name(user_id).await?;
        self.store(user_id, &name)?;
        Ok(name)
    }

    fn cached(&self, user_id: &str) -> Result<Option<String>> {
        let names = self
            .names
            .lock()
            .map_err(|_| anyhow!("name cache mutex is poisoned"))?;
        Ok(names.get(user_id).cloned())
    }

    fn store(&self, user_id: &str, name: &str) -> Result<()> {
        let mut names = self
            .names
            .lock()
            .map_err(|_| anyhow!("name cache mutex is poisoned"))?;
        names.insert(user_id.to_string(), name.to_string());
        Ok(())
    }
}
