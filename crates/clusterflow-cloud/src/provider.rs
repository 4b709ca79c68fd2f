//! Resource adapter trait definition

use crate::error::Result;
use crate::state::ResourceState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle adapter for one remote resource type
///
/// Every managed resource type (OpenSearch users, Kafka users, ...) implements
/// this trait. Operations that start asynchronous work on the backend must
/// not return before that work has converged.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Returns the resource type name (e.g., "opensearch-user")
    fn resource_type(&self) -> &str;

    /// Create the resource and return its refreshed state
    async fn create(&self, config: &ResourceConfig, timeout: Duration) -> Result<ResourceState>;

    /// Refresh the resource. `Ok(None)` means it no longer exists.
    async fn read(&self, state: &ResourceState) -> Result<Option<ResourceState>>;

    /// Apply mutable fields of `config` to an existing resource
    async fn update(
        &self,
        state: &ResourceState,
        config: &ResourceConfig,
        timeout: Duration,
    ) -> Result<ResourceState>;

    /// Delete the resource and wait until it is gone
    async fn delete(&self, state: &ResourceState, timeout: Duration) -> Result<()>;

    /// Build a skeleton state from an external import id.
    ///
    /// The returned state only carries identity; callers follow up with
    /// [`ResourceAdapter::read`].
    fn import(&self, import_id: &str) -> Result<ResourceState>;
}

/// Per-operation deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let twenty_minutes = Duration::from_secs(20 * 60);
        Self {
            create: twenty_minutes,
            update: twenty_minutes,
            delete: twenty_minutes,
        }
    }
}

/// Desired configuration for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "opensearch-user")
    pub resource_type: String,

    /// Provider name
    pub provider: String,

    /// Resource-specific configuration
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            provider: provider.into(),
            config,
        }
    }

    /// Deserialize the whole configuration into a typed struct
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.config.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_timeouts() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.create, Duration::from_secs(1200));
        assert_eq!(timeouts.update, Duration::from_secs(1200));
        assert_eq!(timeouts.delete, Duration::from_secs(1200));
    }

    #[test]
    fn test_parse_typed_config() {
        #[derive(Deserialize)]
        struct Typed {
            name: String,
        }

        let config = ResourceConfig::new("opensearch-user", "ovh", json!({ "name": "alice" }));
        let typed: Typed = config.parse().unwrap();
        assert_eq!(typed.name, "alice");

        let broken = ResourceConfig::new("opensearch-user", "ovh", json!({ "name": 1 }));
        assert!(broken.parse::<Typed>().is_err());
    }
}
