//! OpenSearch user resource
//!
//! Manages `/cloud/project/{serviceName}/database/opensearch/{clusterId}/user`.
//! `service_name`, `cluster_id` and `name` are fixed at creation; only the
//! ACL set can be updated in place. The password is generated by the
//! backend and returned once, by the create call.

use crate::client::OvhClient;
use crate::error::{OvhError, Result};
use crate::models::{
    Acl, DatabaseEngine, OpenSearchUserCreateOpts, OpenSearchUserResponse,
    OpenSearchUserUpdateOpts, UserStatus,
};
use crate::paths::{user_collection_path, user_path};
use crate::waiter::{wait_for_user_deleted, wait_for_user_ready};
use async_trait::async_trait;
use clusterflow_cloud::{
    CloudError, PollConfig, ResourceAdapter, ResourceConfig, ResourceState, ResourceStatus,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

pub const RESOURCE_TYPE: &str = "opensearch-user";

const ENGINE: DatabaseEngine = DatabaseEngine::Opensearch;

/// Split `serviceName/clusterId/id` into its three parts.
///
/// The split is limited to three pieces, so `a/b/c/d` yields `("a", "b", "c/d")`.
pub fn parse_import_id(import_id: &str) -> clusterflow_cloud::Result<(String, String, String)> {
    let parts: Vec<&str> = import_id.splitn(3, '/').collect();
    match parts.as_slice() {
        [service_name, cluster_id, id]
            if !service_name.is_empty() && !cluster_id.is_empty() && !id.is_empty() =>
        {
            Ok((service_name.to_string(), cluster_id.to_string(), id.to_string()))
        }
        _ => Err(CloudError::InvalidImportId(import_id.to_string())),
    }
}

/// Desired configuration of an OpenSearch user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSearchUserConfig {
    /// Public Cloud project; falls back to the adapter default when absent
    #[serde(default)]
    pub service_name: Option<String>,
    pub cluster_id: String,
    pub name: String,
    #[serde(default)]
    pub acls: BTreeSet<Acl>,
}

impl OpenSearchUserConfig {
    pub fn into_resource_config(self) -> clusterflow_cloud::Result<ResourceConfig> {
        Ok(ResourceConfig::new(
            RESOURCE_TYPE,
            "ovh",
            serde_json::to_value(self)?,
        ))
    }
}

/// Known state of an OpenSearch user
#[derive(Debug, Clone)]
pub struct OpenSearchUser {
    pub service_name: String,
    pub cluster_id: String,
    pub id: String,
    pub name: String,
    pub acls: BTreeSet<Acl>,
    pub created_at: Option<String>,
    pub status: Option<UserStatus>,
    pub password: Option<SecretString>,
}

impl OpenSearchUser {
    /// `serviceName/clusterId/id`
    pub fn import_id(&self) -> String {
        format!("{}/{}/{}", self.service_name, self.cluster_id, self.id)
    }

    fn path(&self) -> String {
        user_path(&self.service_name, ENGINE, &self.cluster_id, &self.id)
    }

    /// Merge a fresh API representation; the password is never part of it
    /// except on creation, so a known one is kept.
    fn refresh_from(&mut self, res: OpenSearchUserResponse) {
        self.id = res.id;
        self.name = res.name;
        self.acls = res.acls;
        self.created_at = Some(res.created_at);
        self.status = Some(res.status);
        if res.password.is_some() {
            self.password = res.password;
        }
    }

    pub fn to_state(&self) -> ResourceState {
        let status = self
            .status
            .as_ref()
            .map(UserStatus::to_resource_status)
            .unwrap_or(ResourceStatus::Unknown);

        let mut state = ResourceState::new(self.import_id(), RESOURCE_TYPE)
            .with_status(status)
            .with_attribute("service_name", serde_json::json!(self.service_name))
            .with_attribute("cluster_id", serde_json::json!(self.cluster_id))
            .with_attribute("user_id", serde_json::json!(self.id))
            .with_attribute("name", serde_json::json!(self.name))
            .with_attribute("acls", serde_json::json!(self.acls));

        if let Some(created_at) = &self.created_at {
            state = state.with_attribute("created_at", serde_json::json!(created_at));
        }
        if let Some(status) = &self.status {
            state = state.with_attribute("status", serde_json::json!(status.as_str()));
        }
        if let Some(password) = &self.password {
            state = state.with_attribute("password", serde_json::json!(password.expose_secret()));
        }
        state
    }

    pub fn from_state(state: &ResourceState) -> clusterflow_cloud::Result<Self> {
        if state.resource_type != RESOURCE_TYPE {
            return Err(CloudError::StateError(format!(
                "{} is not an {}",
                state.key(),
                RESOURCE_TYPE
            )));
        }

        Ok(Self {
            service_name: state.require_str("service_name")?.to_string(),
            cluster_id: state.require_str("cluster_id")?.to_string(),
            id: state.require_str("user_id")?.to_string(),
            name: state.get_attribute("name").unwrap_or_default(),
            acls: state.get_attribute("acls").unwrap_or_default(),
            created_at: state.get_attribute("created_at"),
            status: state.get_attribute::<String>("status").map(UserStatus::from),
            password: state
                .get_attribute::<String>("password")
                .map(|p| SecretString::new(p.into())),
        })
    }
}

/// OpenSearch user adapter
pub struct OpenSearchUserResource {
    client: OvhClient,
    poll: PollConfig,
    default_service_name: Option<String>,
}

impl OpenSearchUserResource {
    pub fn new(client: OvhClient) -> Self {
        Self {
            client,
            poll: PollConfig::default(),
            default_service_name: None,
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Project used when a configuration omits `service_name`
    pub fn with_default_service_name(mut self, service_name: Option<String>) -> Self {
        self.default_service_name = service_name;
        self
    }

    fn resolve_service_name(&self, config: &OpenSearchUserConfig) -> Result<String> {
        config
            .service_name
            .clone()
            .or_else(|| self.default_service_name.clone())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                OvhError::InvalidConfig(
                    "service_name is required (or set OVH_CLOUD_PROJECT_SERVICE)".to_string(),
                )
            })
    }

    /// Create a user and wait until it is READY
    pub async fn create_user(
        &self,
        config: &OpenSearchUserConfig,
        timeout: Duration,
    ) -> Result<OpenSearchUser> {
        let service_name = self.resolve_service_name(config)?;
        if config.cluster_id.is_empty() || config.name.is_empty() {
            return Err(OvhError::InvalidConfig(
                "cluster_id and name must not be empty".to_string(),
            ));
        }

        let endpoint = user_collection_path(&service_name, ENGINE, &config.cluster_id);
        let params = OpenSearchUserCreateOpts {
            acls: config.acls.clone(),
            name: config.name.clone(),
        };

        tracing::debug!(
            "Will create user {:?} for cluster {} from project {}",
            params,
            config.cluster_id,
            service_name
        );
        let res: OpenSearchUserResponse = self.client.post(&endpoint, &params).await?;

        tracing::debug!("Waiting for user {} to be READY", res.id);
        wait_for_user_ready(
            &self.client,
            &self.poll,
            &service_name,
            ENGINE,
            &config.cluster_id,
            &res.id,
            timeout,
        )
        .await?;
        tracing::info!("User {} ({}) is READY", config.name, res.id);

        let mut user = OpenSearchUser {
            service_name,
            cluster_id: config.cluster_id.clone(),
            id: String::new(),
            name: String::new(),
            acls: BTreeSet::new(),
            created_at: None,
            status: None,
            password: None,
        };
        user.refresh_from(res);

        self.read_user(&user).await?.ok_or_else(|| {
            OvhError::Cloud(CloudError::ResourceNotFound(format!(
                "user {} disappeared right after creation",
                user.import_id()
            )))
        })
    }

    /// Fetch the current representation. `None` means the user is gone.
    pub async fn read_user(&self, user: &OpenSearchUser) -> Result<Option<OpenSearchUser>> {
        let endpoint = user.path();

        tracing::debug!(
            "Will read user {} from cluster {} from project {}",
            user.id,
            user.cluster_id,
            user.service_name
        );
        let res: OpenSearchUserResponse = match self.client.get(&endpoint).await {
            Ok(res) => res,
            Err(e) if e.is_not_found() => {
                tracing::info!("User {} no longer exists", user.import_id());
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut refreshed = user.clone();
        refreshed.refresh_from(res);
        tracing::debug!("Read user {:?}", refreshed);
        Ok(Some(refreshed))
    }

    /// Replace the ACL set and wait until the user is READY again
    pub async fn update_user(
        &self,
        user: &OpenSearchUser,
        acls: BTreeSet<Acl>,
        timeout: Duration,
    ) -> Result<OpenSearchUser> {
        let endpoint = user.path();
        let params = OpenSearchUserUpdateOpts { acls };

        tracing::debug!(
            "Will update user {:?} from cluster {} from project {}",
            params,
            user.cluster_id,
            user.service_name
        );
        self.client.put(&endpoint, &params).await?;

        tracing::debug!("Waiting for user {} to be READY", user.id);
        wait_for_user_ready(
            &self.client,
            &self.poll,
            &user.service_name,
            ENGINE,
            &user.cluster_id,
            &user.id,
            timeout,
        )
        .await?;
        tracing::info!("User {} ({}) is READY", user.name, user.id);

        self.read_user(user).await?.ok_or_else(|| {
            OvhError::Cloud(CloudError::ResourceNotFound(format!(
                "user {} disappeared during update",
                user.import_id()
            )))
        })
    }

    /// Delete a user and wait until the API no longer knows it
    pub async fn delete_user(&self, user: &OpenSearchUser, timeout: Duration) -> Result<()> {
        let endpoint = user.path();

        tracing::debug!(
            "Will delete user {} from cluster {} from project {}",
            user.id,
            user.cluster_id,
            user.service_name
        );
        match self.client.delete(&endpoint).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::info!("User {} was already deleted", user.import_id());
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        tracing::debug!("Waiting for user {} to be DELETED", user.id);
        wait_for_user_deleted(
            &self.client,
            &self.poll,
            &user.service_name,
            ENGINE,
            &user.cluster_id,
            &user.id,
            timeout,
        )
        .await?;
        tracing::info!("User {} ({}) is DELETED", user.name, user.id);

        Ok(())
    }
}

#[async_trait]
impl ResourceAdapter for OpenSearchUserResource {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(
        &self,
        config: &ResourceConfig,
        timeout: Duration,
    ) -> clusterflow_cloud::Result<ResourceState> {
        let config: OpenSearchUserConfig = config.parse()?;
        let user = self.create_user(&config, timeout).await?;
        Ok(user.to_state())
    }

    async fn read(&self, state: &ResourceState) -> clusterflow_cloud::Result<Option<ResourceState>> {
        let user = OpenSearchUser::from_state(state)?;
        Ok(self
            .read_user(&user)
            .await?
            .map(|u| u.to_state().inherit_tracking(state)))
    }

    async fn update(
        &self,
        state: &ResourceState,
        config: &ResourceConfig,
        timeout: Duration,
    ) -> clusterflow_cloud::Result<ResourceState> {
        let user = OpenSearchUser::from_state(state)?;
        let config: OpenSearchUserConfig = config.parse()?;

        let service_name = self.resolve_service_name(&config)?;
        for (field, current, desired) in [
            ("service_name", &user.service_name, &service_name),
            ("cluster_id", &user.cluster_id, &config.cluster_id),
            ("name", &user.name, &config.name),
        ] {
            if current != desired {
                return Err(CloudError::InvalidConfig(format!(
                    "{} cannot be changed in place ({} -> {}); delete and recreate the user",
                    field, current, desired
                )));
            }
        }

        let updated = self.update_user(&user, config.acls, timeout).await?;
        Ok(updated.to_state().inherit_tracking(state))
    }

    async fn delete(&self, state: &ResourceState, timeout: Duration) -> clusterflow_cloud::Result<()> {
        let user = OpenSearchUser::from_state(state)?;
        self.delete_user(&user, timeout).await?;
        Ok(())
    }

    fn import(&self, import_id: &str) -> clusterflow_cloud::Result<ResourceState> {
        let (service_name, cluster_id, id) = parse_import_id(import_id)?;
        let user = OpenSearchUser {
            service_name,
            cluster_id,
            id,
            name: String::new(),
            acls: BTreeSet::new(),
            created_at: None,
            status: None,
            password: None,
        };
        Ok(user.to_state())
    }
}
