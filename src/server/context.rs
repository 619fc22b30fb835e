use std::fmt;

use uuid::Uuid;

use crate::error::Result;
use crate::store::{Store, Transaction};
use crate::types::User;

/// Correlates the log lines of one request. Set by the request logging
/// middleware and read back by the extractors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State owned by one authenticated request: who is acting and the writes
/// queued so far. Dropped at the end of the request; an uncommitted
/// transaction is simply discarded.
pub struct RequestContext {
    pub request_id: RequestId,
    pub actor: User,
    pub transaction: Transaction,
}

impl RequestContext {
    pub fn actor_id(&self) -> &str {
        &self.actor.id
    }

    /// Runs every queued write atomically.
    pub fn commit<S: Store + ?Sized>(self, store: &S) -> Result<()> {
        let request_id = self.request_id;
        let queued = self.transaction.len();
        self.transaction.commit(store)?;
        tracing::debug!(%request_id, queued, "request writes committed");
        Ok(())
    }
}
