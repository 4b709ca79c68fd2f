//! State management for cloud resources
//!
//! Manages the `.clusterflow/state.json` file which records the last known
//! state of every managed resource.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".clusterflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";
const STALE_LOCK_AGE_HOURS: i64 = 1;

/// Global state containing every tracked resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by `type:import-id`
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get resources of a specific type
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<&ResourceState> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }

    /// Add or update a resource under its own key
    pub fn set_resource(&mut self, state: ResourceState) {
        self.resources.insert(state.key(), state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, key: &str) -> Option<ResourceState> {
        let result = self.resources.remove(key);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Get a resource by key
    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Import id (e.g. `service/cluster/user-id`)
    pub id: String,

    /// Resource type
    pub resource_type: String,

    /// Current status
    pub status: ResourceStatus,

    /// Resource attributes (name, acls, password, ...)
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// When the resource was first recorded locally
    pub tracked_since: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Unknown,
            attributes: BTreeMap::new(),
            tracked_since: now,
            updated_at: now,
        }
    }

    /// Key under which this resource is stored
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a required string attribute
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.attributes
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                CloudError::StateError(format!("{} is missing attribute {}", self.key(), key))
            })
    }

    /// Carry the local bookkeeping of `previous` over to a refreshed state
    pub fn inherit_tracking(mut self, previous: &ResourceState) -> Self {
        self.tracked_since = previous.tracked_since;
        self
    }
}

/// Provider-neutral status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is queued on the backend
    Pending,
    /// Resource is being created
    Creating,
    /// Resource is ready for use
    Ready,
    /// Resource is being updated
    Updating,
    /// Resource is being deleted
    Deleting,
    /// Resource is locked by a maintenance operation
    Locked,
    /// Resource is in error state
    Error,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Pending => write!(f, "pending"),
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Updating => write!(f, "updating"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Locked => write!(f, "locked"),
            ResourceStatus::Error => write!(f, "error"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reads and writes `.clusterflow/state.json`.
///
/// A save writes a temporary file and renames it over the state file after
/// copying the previous state to the backup; at every point one complete
/// copy exists on disk.
pub struct StateManager {
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            state_dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    fn tmp_path(&self) -> PathBuf {
        self.state_dir.join(STATE_TMP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Load the current state.
    ///
    /// A missing file is an empty state. An unreadable state file falls back
    /// to the backup so tracked passwords survive a damaged save.
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let state = match read_state(&path).await {
            Ok(state) => state,
            Err(e) => {
                let backup = self.backup_path();
                if !backup.exists() {
                    return Err(e);
                }
                tracing::warn!(
                    "{} is unreadable ({}), recovering from {}",
                    path.display(),
                    e,
                    backup.display()
                );
                read_state(&backup).await.map_err(|backup_err| {
                    CloudError::StateError(format!(
                        "{} is unreadable ({}) and so is its backup ({})",
                        path.display(),
                        e,
                        backup_err
                    ))
                })?
            }
        };

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let tmp = self.tmp_path();

        let content = serde_json::to_vec_pretty(state)?;
        let mut file = private_file_options().open(&tmp).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire the state lock.
    ///
    /// The lock file is created with `create_new`, so exactly one of several
    /// concurrent callers wins. A lock older than an hour is
    /// taken over. A lock file that cannot be parsed counts as held.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;
        let lock_path = self.lock_path();
        let info = LockInfo::current();

        match create_lock_file(&lock_path, &info).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let held = fs::read_to_string(&lock_path)
                    .await
                    .ok()
                    .and_then(|content| serde_json::from_str::<LockInfo>(&content).ok());

                let Some(held) = held else {
                    return Err(CloudError::LockError(format!(
                        "{} exists but is not a valid lock; remove it if no clusterflow command is running",
                        lock_path.display()
                    )));
                };

                let age = Utc::now().signed_duration_since(held.acquired_at);
                if age.num_hours() < STALE_LOCK_AGE_HOURS {
                    return Err(CloudError::LockError(format!(
                        "State is locked by {} (pid {}) since {}",
                        held.holder, held.pid, held.acquired_at
                    )));
                }

                tracing::warn!(
                    "Taking over stale lock held by {} (pid {}) since {}",
                    held.holder,
                    held.pid,
                    held.acquired_at
                );
                match fs::remove_file(&lock_path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                // Another process may take over at the same moment; only one create_new wins
                create_lock_file(&lock_path, &info).await.map_err(|e| {
                    if e.kind() == ErrorKind::AlreadyExists {
                        CloudError::LockError("State lock was taken over by another process".to_string())
                    } else {
                        e.into()
                    }
                })?;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

async fn read_state(path: &Path) -> Result<GlobalState> {
    let content = fs::read_to_string(path).await?;
    let state: GlobalState = serde_json::from_str(&content)?;

    if state.version > STATE_VERSION {
        return Err(CloudError::StateError(format!(
            "State file version {} is newer than supported version {}",
            state.version, STATE_VERSION
        )));
    }
    Ok(state)
}

/// Owner-only file on unix; the state holds passwords
fn private_file_options() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    options
}

async fn create_lock_file(path: &Path, info: &LockInfo) -> std::io::Result<()> {
    let content = serde_json::to_vec_pretty(info)?;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(&content).await?;
    file.sync_all().await
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

/// Held state lock; the lock file is removed on release or drop
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => {
                tracing::debug!("Released state lock");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set_resource(
            ResourceState::new("svc1/clust1/user1", "opensearch-user")
                .with_status(ResourceStatus::Ready)
                .with_attribute("name", serde_json::json!("alice")),
        );

        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.resources.len(), 1);
        let resource = loaded
            .get_resource("opensearch-user:svc1/clust1/user1")
            .unwrap();
        assert_eq!(resource.status, ResourceStatus::Ready);
        assert_eq!(resource.get_attribute::<String>("name").as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_save_keeps_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        manager.save(&GlobalState::new()).await.unwrap();
        manager.save(&GlobalState::new()).await.unwrap();

        assert!(temp_dir.path().join(".clusterflow/state.json.backup").exists());
    }

    #[tokio::test]
    async fn test_newer_state_version_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.version = STATE_VERSION + 1;
        manager.save(&state).await.unwrap();

        assert!(matches!(manager.load().await, Err(CloudError::StateError(_))));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));

        lock.release().await.unwrap();
        let again = manager.acquire_lock().await.unwrap();
        drop(again);
        assert!(!temp_dir.path().join(".clusterflow/lock.json").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_has_one_winner() {
        for _ in 0..25 {
            let temp_dir = tempdir().unwrap();
            let manager = std::sync::Arc::new(StateManager::new(temp_dir.path()));
            manager.ensure_state_dir().await.unwrap();

            let first = tokio::spawn({
                let manager = manager.clone();
                async move { manager.acquire_lock().await }
            });
            let second = tokio::spawn({
                let manager = manager.clone();
                async move { manager.acquire_lock().await }
            });

            let results = [first.await.unwrap(), second.await.unwrap()];
            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1);
            assert!(
                results
                    .iter()
                    .any(|r| matches!(r, Err(CloudError::LockError(_))))
            );
        }
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        manager.ensure_state_dir().await.unwrap();

        let stale = LockInfo {
            holder: "old-host".to_string(),
            pid: 1,
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(manager.lock_path(), serde_json::to_string(&stale).unwrap()).unwrap();

        let lock = manager.acquire_lock().await.unwrap();
        let content = std::fs::read_to_string(manager.lock_path()).unwrap();
        let held: LockInfo = serde_json::from_str(&content).unwrap();
        assert_eq!(held.pid, std::process::id());
        lock.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_unparsable_lock_counts_as_held() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        manager.ensure_state_dir().await.unwrap();
        std::fs::write(manager.lock_path(), "").unwrap();

        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));
        assert!(manager.lock_path().exists());
    }

    #[tokio::test]
    async fn test_save_replaces_atomically_and_keeps_previous() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set_resource(
            ResourceState::new("svc1/clust1/user1", "opensearch-user")
                .with_attribute("password", serde_json::json!("s3cr3t")),
        );
        manager.save(&state).await.unwrap();

        state.remove_resource("opensearch-user:svc1/clust1/user1");
        manager.save(&state).await.unwrap();

        assert!(!manager.tmp_path().exists());
        let backup = std::fs::read_to_string(manager.backup_path()).unwrap();
        assert!(backup.contains("s3cr3t"));
        assert!(manager.load().await.unwrap().resources.is_empty());
    }

    #[tokio::test]
    async fn test_load_recovers_from_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = GlobalState::new();
        state.set_resource(ResourceState::new("svc1/clust1/user1", "opensearch-user"));
        manager.save(&state).await.unwrap();
        manager.save(&state).await.unwrap();

        std::fs::write(manager.state_path(), "{ truncated").unwrap();

        let loaded = manager.load().await.unwrap();
        assert!(
            loaded
                .get_resource("opensearch-user:svc1/clust1/user1")
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_load_fails_without_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        manager.ensure_state_dir().await.unwrap();
        std::fs::write(manager.state_path(), "{ truncated").unwrap();

        assert!(manager.load().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_state_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        manager.save(&GlobalState::new()).await.unwrap();

        let mode = std::fs::metadata(manager.state_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_resources_of_type_and_remove() {
        let mut state = GlobalState::new();
        state.set_resource(ResourceState::new("a/b/1", "opensearch-user"));
        state.set_resource(ResourceState::new("a/b/2", "opensearch-user"));
        state.set_resource(ResourceState::new("a/b/3", "kafka-user"));

        assert_eq!(state.resources_of_type("opensearch-user").len(), 2);
        assert!(state.remove_resource("opensearch-user:a/b/1").is_some());
        assert!(state.remove_resource("opensearch-user:a/b/1").is_none());
        assert_eq!(state.resources_of_type("opensearch-user").len(), 1);
    }

    #[test]
    fn test_require_str() {
        let state = ResourceState::new("a/b/1", "opensearch-user")
            .with_attribute("cluster_id", serde_json::json!("b"));

        assert_eq!(state.require_str("cluster_id").unwrap(), "b");
        assert!(matches!(
            state.require_str("service_name"),
            Err(CloudError::StateError(_))
        ));
    }
}
