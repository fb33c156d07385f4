//! Request chaining
//!
//! A `response` directive runs another request of the collection and pulls a
//! value out of its response. The resolver tracks which requests are being
//! resolved so that `A -> B -> A` fails instead of recursing forever.

pub mod extract;

use dashmap::DashSet;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cache::{CacheSetOptions, CacheStore};
use crate::client::ExecutedResponse;
use crate::directives::ResponseTemplate;
use crate::errors::{ReqchainError, Result};

pub use extract::{extract_field, json_path, xpath};

/// Runs collection requests on behalf of the resolver
pub trait RequestExecutor: Send + Sync {
    fn has_request(&self, id: &str) -> bool;

    /// Resolve and send the request with this id
    fn execute_request<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<ExecutedResponse>>;
}

/// Cycle-aware executor of chained requests
#[derive(Debug, Default)]
pub struct ChainResolver {
    in_flight: DashSet<String>,
}

/// Marks a request as being resolved until dropped
#[must_use]
pub struct InFlightGuard<'a> {
    set: &'a DashSet<String>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

impl ChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` in flight; fails if it already is
    pub fn acquire(&self, id: &str) -> Result<InFlightGuard<'_>> {
        if !self.in_flight.insert(id.to_string()) {
            return Err(ReqchainError::CircularDependency(id.to_string()));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            id: id.to_string(),
        })
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Evaluate a parsed `response` directive
    pub async fn resolve(
        &self,
        template: &ResponseTemplate,
        executor: &dyn RequestExecutor,
        cache: &dyn CacheStore,
    ) -> Result<String> {
        let key = template.cache_key();

        if template.should_use_cache() {
            match cache.get(&key) {
                Ok(Some(entry)) => {
                    debug!(key = %key, "chained value served from cache");
                    return Ok(entry.value);
                }
                Ok(None) => debug!(key = %key, "chained value not cached"),
                Err(e) => warn!(key = %key, error = %e, "cache read failed"),
            }
        }

        if !executor.has_request(&template.request_id) {
            return Err(ReqchainError::RequestNotFound(template.request_id.clone()));
        }

        let response = {
            let _guard = self.acquire(&template.request_id)?;
            info!(request_id = %template.request_id, "running chained request");
            executor.execute_request(&template.request_id).await?
        };
        info!(
            request_id = %template.request_id,
            status = response.status,
            duration_ms = response.duration_ms,
            "chained request finished"
        );

        let value = extract_field(&response, &template.field, template.path.as_ref())
            .unwrap_or_default();

        if template.should_cache_result() {
            let options = CacheSetOptions {
                ttl: template.cache_ttl(),
                expires_at: None,
                metadata: Some(json!({
                    "requestId": template.request_id,
                    "field": template.field.to_string(),
                    "status": response.status,
                })),
            };
            if let Err(e) = cache.set(&key, &value, options) {
                warn!(key = %key, error = %e, "failed to cache chained value");
            }
        }

        Ok(value)
    }
}
