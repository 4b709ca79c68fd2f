pub mod error;

pub use error::*;

use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 設定ファイルを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "CLUSTERFLOW_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["clusterflow.local.yaml", "clusterflow.yaml"];

/// SecretString を文字列としてデシリアライズする
mod secret_string {
    use secrecy::SecretString;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.map(|s| SecretString::new(s.into())))
    }
}

/// ClusterFlow の設定
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// API エンドポイント (`ovh-eu` などのエイリアス、または URL)
    pub endpoint: Option<String>,

    /// OAuth2 アクセストークン
    #[serde(deserialize_with = "secret_string::deserialize")]
    pub token: Option<SecretString>,

    /// デフォルトの Public Cloud プロジェクト
    pub service_name: Option<String>,

    pub timeouts: TimeoutSettings,

    pub poll: PollSettings,
}

/// 操作ごとのタイムアウト（秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutSettings {
    pub create: u64,
    pub update: u64,
    pub delete: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            create: 20 * 60,
            update: 20 * 60,
            delete: 20 * 60,
        }
    }
}

impl TimeoutSettings {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create)
    }

    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update)
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete)
    }
}

/// ステータス待機のポーリング設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    /// 最初の確認までの待機時間（秒）
    pub initial_delay_secs: f64,
    /// 確認間隔（秒）
    pub interval_secs: f64,
    /// 確認間隔の上限（秒）
    pub max_interval_secs: f64,
    /// 間隔の増加倍率
    pub multiplier: f64,
    /// 一時的な取得エラーの最大連続リトライ回数
    pub max_fetch_retries: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 0.0,
            interval_secs: 3.0,
            max_interval_secs: 30.0,
            multiplier: 1.5,
            max_fetch_retries: 3,
        }
    }
}

/// ポーリング関連の秒数の上限（1日）
pub const MAX_POLL_SECS: f64 = 86400.0;

/// 秒数を Duration に変換（範囲外は飽和させる）
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

impl PollSettings {
    pub fn initial_delay(&self) -> Duration {
        secs_to_duration(self.initial_delay_secs)
    }

    pub fn interval(&self) -> Duration {
        secs_to_duration(self.interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        secs_to_duration(self.max_interval_secs)
    }
}

impl Settings {
    /// YAML ファイルから読み込む
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// 環境変数で上書きする
    ///
    /// - `OVH_ENDPOINT`
    /// - `OVH_ACCESS_TOKEN`
    /// - `OVH_CLOUD_PROJECT_SERVICE`
    pub fn apply_env(mut self) -> Self {
        if let Some(endpoint) = non_empty_env("OVH_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(token) = non_empty_env("OVH_ACCESS_TOKEN") {
            self.token = Some(SecretString::new(token.into()));
        }
        if let Some(service_name) = non_empty_env("OVH_CLOUD_PROJECT_SERVICE") {
            self.service_name = Some(service_name);
        }
        self
    }

    /// 値の整合性を確認
    pub fn validate(&self) -> Result<()> {
        let poll = &self.poll;
        for (name, value) in [
            ("poll.initial_delay_secs", poll.initial_delay_secs),
            ("poll.interval_secs", poll.interval_secs),
            ("poll.max_interval_secs", poll.max_interval_secs),
        ] {
            if !value.is_finite() || !(0.0..=MAX_POLL_SECS).contains(&value) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} は 0 以上 {} 以下の数値である必要があります: {}",
                    name, MAX_POLL_SECS, value
                )));
            }
        }
        if poll.interval_secs <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "poll.interval_secs は 0 より大きい必要があります".to_string(),
            ));
        }
        if poll.max_interval_secs < poll.interval_secs {
            return Err(ConfigError::InvalidValue(
                "poll.max_interval_secs は poll.interval_secs 以上である必要があります".to_string(),
            ));
        }
        if !poll.multiplier.is_finite() || poll.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(format!(
                "poll.multiplier は 1.0 以上である必要があります: {}",
                poll.multiplier
            )));
        }

        let timeouts = &self.timeouts;
        if timeouts.create == 0 || timeouts.update == 0 || timeouts.delete == 0 {
            return Err(ConfigError::InvalidValue(
                "timeouts は 1 秒以上である必要があります".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// グローバル設定ファイルのパス (~/.config/clusterflow/config.yaml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("clusterflow").join("config.yaml"))
}

/// 設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 CLUSTERFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: clusterflow.local.yaml, clusterflow.yaml
/// 3. ./.clusterflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/clusterflow/config.yaml (グローバル設定)
///
/// どれも見つからなければ `None`（デフォルト設定を使う）。
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "{} で指定された {} が存在しません",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // 3. ./.clusterflow/ ディレクトリで検索
    let local_dir = current_dir.join(".clusterflow");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(Some(path));
            }
        }
    }

    // 4. グローバル設定ファイル
    if let Some(global_config) = global_config_path() {
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// 設定を読み込む（ファイル → 環境変数 → 検証）
pub fn load() -> Result<(Settings, Option<PathBuf>)> {
    let path = find_config_file()?;
    let settings = match &path {
        Some(path) => {
            tracing::debug!("設定ファイルを読み込みます: {}", path.display());
            Settings::from_file(path)?
        }
        None => {
            tracing::debug!("設定ファイルが見つからないためデフォルト設定を使います");
            Settings::default()
        }
    };

    let settings = settings.apply_env();
    settings.validate()?;
    Ok((settings, path))
}
