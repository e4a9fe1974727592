// audit/mod.rs - Append-only activity trail
//
// Every successful mutation writes exactly one row tagged `[DOMAIN] VERB`.
// Internal failures write a detached `[DOMAIN] ERROR` row. Neither path can
// fail the request that triggered it.

use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::NewActivity;
use crate::database::Store;
use crate::error::ApiError;
use crate::middleware::ClientInfo;

/// Bracket-tagged action, rendered as `[DOMAIN] VERB`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTag {
    pub domain: &'static str,
    pub verb: &'static str,
}

impl ActionTag {
    pub const fn new(domain: &'static str, verb: &'static str) -> Self {
        Self { domain, verb }
    }

    pub const fn error(domain: &'static str) -> Self {
        Self::new(domain, "ERROR")
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.domain, self.verb)
    }
}

/// Who triggered an activity and from where
#[derive(Debug, Clone, Default)]
pub struct Origin {
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Origin {
    pub fn new(user_id: Option<Uuid>, client: &ClientInfo) -> Self {
        Self {
            user_id,
            ip_address: client.ip.clone(),
            user_agent: client.user_agent.clone(),
        }
    }

    fn entry(&self, tag: ActionTag, details: Value) -> NewActivity {
        NewActivity {
            user_id: self.user_id,
            action: tag.to_string(),
            details,
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Result of a mutation that reached the database
#[derive(Debug)]
pub struct Committed<T> {
    pub response: T,
    pub verb: &'static str,
    pub details: Value,
    /// Attribute the row to this user instead of the request's origin
    pub actor: Option<Uuid>,
}

impl<T> Committed<T> {
    pub fn new(response: T, verb: &'static str, details: Value) -> Self {
        Self {
            response,
            verb,
            details,
            actor: None,
        }
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.actor = Some(user_id);
        self
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn Store>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Write one row and wait for it. A failed write is logged with the full
    /// entry and otherwise ignored.
    pub async fn record(&self, origin: &Origin, tag: ActionTag, details: Value) {
        let entry = origin.entry(tag, details);
        if let Err(e) = self.store.append_activity(entry.clone()).await {
            tracing::error!(
                action = %entry.action,
                user_id = ?entry.user_id,
                ip_address = ?entry.ip_address,
                user_agent = ?entry.user_agent,
                details = %entry.details,
                "Failed to write activity log: {}",
                e
            );
        }
    }

    /// Fire-and-forget write for error paths
    pub fn record_detached(&self, origin: &Origin, tag: ActionTag, details: Value) {
        let logger = self.clone();
        let origin = origin.clone();
        tokio::spawn(async move {
            logger.record(&origin, tag, details).await;
        });
    }

    /// Run a mutation and audit its outcome: one `[domain] verb` row on
    /// success, a detached `[domain] ERROR` row on internal failure. Client
    /// errors (validation, not found, conflict) are not audited.
    pub async fn guard<T, Fut>(&self, origin: &Origin, domain: &'static str, work: Fut) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<Committed<T>, ApiError>>,
    {
        match work.await {
            Ok(committed) => {
                let tag = ActionTag::new(domain, committed.verb);
                match committed.actor {
                    Some(user_id) => {
                        let origin = Origin {
                            user_id: Some(user_id),
                            ..origin.clone()
                        };
                        self.record(&origin, tag, committed.details).await;
                    }
                    None => self.record(origin, tag, committed.details).await,
                }
                Ok(committed.response)
            }
            Err(err) => {
                if err.is_internal() {
                    tracing::error!("[{}] mutation failed: {}", domain, err);
                    self.record_detached(origin, ActionTag::error(domain), json!({ "code": err.error_code() }));
                }
                Err(err)
            }
        }
    }
}
