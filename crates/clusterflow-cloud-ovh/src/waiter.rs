//! Database user status polling
//!
//! Shared by every engine's user adapter: the status endpoint and its
//! semantics are the same for all of them.

use crate::client::OvhClient;
use crate::error::{OvhError, Result};
use crate::models::{DatabaseEngine, UserStatus, UserStatusProbe};
use crate::paths::user_path;
use async_trait::async_trait;
use clusterflow_cloud::{Observation, PollConfig, PollTarget, StatusSource, wait_until};
use std::time::Duration;

/// Reads the status of a database user through the API
pub struct UserStatusSource<'a> {
    client: &'a OvhClient,
}

impl<'a> UserStatusSource<'a> {
    pub fn new(client: &'a OvhClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusSource for UserStatusSource<'_> {
    async fn fetch_status(&self, target: &PollTarget) -> clusterflow_cloud::Result<Observation> {
        let engine: DatabaseEngine = target
            .engine
            .parse()
            .map_err(clusterflow_cloud::CloudError::InvalidConfig)?;
        let path = user_path(
            &target.service_name,
            engine,
            &target.cluster_id,
            &target.resource_id,
        );

        match self.client.get::<UserStatusProbe>(&path).await {
            Ok(probe) => Ok(Observation::Found(probe.status.as_str().to_string())),
            Err(e) if e.is_not_found() => Ok(Observation::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

/// Wait until a database user is READY
pub async fn wait_for_user_ready(
    client: &OvhClient,
    poll: &PollConfig,
    service_name: &str,
    engine: DatabaseEngine,
    cluster_id: &str,
    user_id: &str,
    timeout: Duration,
) -> Result<()> {
    let target = PollTarget::ready(
        service_name,
        engine.as_str(),
        cluster_id,
        user_id,
        UserStatus::READY.iter().copied(),
        timeout,
    )
    .with_failure(UserStatus::FAILURE.iter().copied());

    wait_until(&UserStatusSource::new(client), &target, poll)
        .await
        .map_err(OvhError::from)?;
    Ok(())
}

/// Wait until a database user no longer exists
pub async fn wait_for_user_deleted(
    client: &OvhClient,
    poll: &PollConfig,
    service_name: &str,
    engine: DatabaseEngine,
    cluster_id: &str,
    user_id: &str,
    timeout: Duration,
) -> Result<()> {
    let target = PollTarget::gone(service_name, engine.as_str(), cluster_id, user_id, timeout)
        .with_failure(UserStatus::FAILURE.iter().copied());

    wait_until(&UserStatusSource::new(client), &target, poll)
        .await
        .map_err(OvhError::from)?;
    Ok(())
}
