//! Wire types of the Public Cloud Databases API

use clusterflow_cloud::ResourceStatus;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Database engine segment of the API paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Cassandra,
    Grafana,
    Kafka,
    M3db,
    Mongodb,
    Mysql,
    Opensearch,
    Postgresql,
    Redis,
}

impl DatabaseEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cassandra => "cassandra",
            Self::Grafana => "grafana",
            Self::Kafka => "kafka",
            Self::M3db => "m3db",
            Self::Mongodb => "mongodb",
            Self::Mysql => "mysql",
            Self::Opensearch => "opensearch",
            Self::Postgresql => "postgresql",
            Self::Redis => "redis",
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cassandra" => Ok(Self::Cassandra),
            "grafana" => Ok(Self::Grafana),
            "kafka" => Ok(Self::Kafka),
            "m3db" => Ok(Self::M3db),
            "mongodb" => Ok(Self::Mongodb),
            "mysql" => Ok(Self::Mysql),
            "opensearch" => Ok(Self::Opensearch),
            "postgresql" => Ok(Self::Postgresql),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown database engine: {}", other)),
        }
    }
}

/// Status of a database user as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserStatus {
    Creating,
    Deleting,
    Error,
    ErrorInconsistentSpec,
    Locked,
    LockedPending,
    LockedUpdating,
    Pending,
    Ready,
    Updating,
    /// A status this client does not know yet
    Other(String),
}

impl UserStatus {
    /// Statuses that end a create/update wait successfully
    pub const READY: &'static [&'static str] = &["READY"];

    /// Statuses that end any wait with a failure
    pub const FAILURE: &'static [&'static str] = &["ERROR", "ERROR_INCONSISTENT_SPEC"];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "CREATING",
            Self::Deleting => "DELETING",
            Self::Error => "ERROR",
            Self::ErrorInconsistentSpec => "ERROR_INCONSISTENT_SPEC",
            Self::Locked => "LOCKED",
            Self::LockedPending => "LOCKED_PENDING",
            Self::LockedUpdating => "LOCKED_UPDATING",
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Updating => "UPDATING",
            Self::Other(s) => s,
        }
    }

    /// Map to the provider-neutral status kept in local state
    pub fn to_resource_status(&self) -> ResourceStatus {
        match self {
            Self::Creating => ResourceStatus::Creating,
            Self::Deleting => ResourceStatus::Deleting,
            Self::Error | Self::ErrorInconsistentSpec => ResourceStatus::Error,
            Self::Locked | Self::LockedPending | Self::LockedUpdating => ResourceStatus::Locked,
            Self::Pending => ResourceStatus::Pending,
            Self::Ready => ResourceStatus::Ready,
            Self::Updating => ResourceStatus::Updating,
            Self::Other(_) => ResourceStatus::Unknown,
        }
    }
}

impl From<String> for UserStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "CREATING" => Self::Creating,
            "DELETING" => Self::Deleting,
            "ERROR" => Self::Error,
            "ERROR_INCONSISTENT_SPEC" => Self::ErrorInconsistentSpec,
            "LOCKED" => Self::Locked,
            "LOCKED_PENDING" => Self::LockedPending,
            "LOCKED_UPDATING" => Self::LockedUpdating,
            "PENDING" => Self::Pending,
            "READY" => Self::Ready,
            "UPDATING" => Self::Updating,
            _ => Self::Other(s),
        }
    }
}

impl From<UserStatus> for String {
    fn from(status: UserStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access control entry of an OpenSearch user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Acl {
    /// Index pattern (e.g. `logs-*`)
    pub pattern: String,
    /// Permission on matching indexes (e.g. `read`, `write`, `readwrite`, `admin`)
    pub permission: String,
}

impl Acl {
    pub fn new(pattern: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            permission: permission.into(),
        }
    }
}

impl FromStr for Acl {
    type Err = String;

    /// Parse `PATTERN=PERMISSION`. The pattern may itself contain `=`; the
    /// last one separates the permission.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('=') {
            Some((pattern, permission)) if !pattern.is_empty() && !permission.is_empty() => {
                Ok(Acl::new(pattern, permission))
            }
            _ => Err(format!("ACL {:?} is not PATTERN=PERMISSION formatted", s)),
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.pattern, self.permission)
    }
}

/// Body of `POST .../opensearch/{clusterId}/user`
#[derive(Debug, Serialize)]
pub struct OpenSearchUserCreateOpts {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub acls: BTreeSet<Acl>,
    pub name: String,
}

/// Body of `PUT .../opensearch/{clusterId}/user/{userId}`
#[derive(Debug, Serialize)]
pub struct OpenSearchUserUpdateOpts {
    pub acls: BTreeSet<Acl>,
}

/// User representation returned by the API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSearchUserResponse {
    #[serde(default)]
    pub acls: BTreeSet<Acl>,
    pub created_at: String,
    pub id: String,
    pub name: String,
    /// Only present in the response to the create call
    #[serde(default, deserialize_with = "optional_secret::deserialize")]
    pub password: Option<SecretString>,
    pub status: UserStatus,
}

/// Minimal projection used when polling the status of any engine's user
#[derive(Debug, Deserialize)]
pub struct UserStatusProbe {
    pub status: UserStatus,
}

mod optional_secret {
    use secrecy::SecretString;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::new(s.into())))
    }
}
