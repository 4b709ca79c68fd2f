use anyhow::Context as _;
use clusterflow_cloud::{PollConfig, StateManager, Timeouts};
use clusterflow_cloud_ovh::{ClientConfig, OVH_API_BASE, OpenSearchUserResource, OvhClient};
use clusterflow_config::Settings;
use std::path::{Path, PathBuf};

/// コマンド実行に必要な設定と状態ファイル
pub struct Context {
    pub settings: Settings,
    pub config_path: Option<PathBuf>,
    pub state: StateManager,
}

impl Context {
    pub fn load(project_dir: &Path) -> anyhow::Result<Self> {
        let (settings, config_path) =
            clusterflow_config::load().context("設定の読み込みに失敗しました")?;

        Ok(Self {
            settings,
            config_path,
            state: StateManager::new(project_dir),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.settings.endpoint.as_deref().unwrap_or(OVH_API_BASE)
    }

    pub fn poll_config(&self) -> PollConfig {
        let poll = &self.settings.poll;
        PollConfig {
            initial_delay: poll.initial_delay(),
            interval: poll.interval(),
            max_interval: poll.max_interval(),
            multiplier: poll.multiplier,
            max_fetch_retries: poll.max_fetch_retries,
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        let timeouts = &self.settings.timeouts;
        Timeouts {
            create: timeouts.create(),
            update: timeouts.update(),
            delete: timeouts.delete(),
        }
    }

    /// OpenSearch ユーザーのアダプターを構築（トークン必須）
    pub fn user_resource(&self) -> anyhow::Result<OpenSearchUserResource> {
        let token = self.settings.token.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "アクセストークンが設定されていません (OVH_ACCESS_TOKEN または設定ファイルの token)"
            )
        })?;

        let client = OvhClient::new(ClientConfig {
            endpoint: self.endpoint().to_string(),
            token,
        })
        .context("APIクライアントの初期化に失敗しました")?;
        tracing::debug!("API endpoint: {}", client.base_url());

        Ok(OpenSearchUserResource::new(client)
            .with_poll_config(self.poll_config())
            .with_default_service_name(self.settings.service_name.clone()))
    }
}
