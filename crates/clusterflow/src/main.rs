mod commands;
mod context;

use clap::{Parser, Subcommand};
use clusterflow_cloud_ovh::models::Acl;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clusterflow")]
#[command(about = "データベースのユーザー管理を、宣言どおりに。", long_about = None)]
struct Cli {
    /// 状態ファイル (.clusterflow/state.json) を置くプロジェクトディレクトリ
    #[arg(
        long,
        global = true,
        env = "CLUSTERFLOW_PROJECT_DIR",
        default_value = "."
    )]
    project_dir: PathBuf,

    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// OpenSearch ユーザーを管理
    #[command(subcommand)]
    User(UserCommands),
    /// 有効な設定を表示（トークンは伏せ字）
    Config,
    /// バージョン情報を表示
    Version,
}

#[derive(Subcommand)]
enum UserCommands {
    /// ユーザーを作成し、READY になるまで待機
    Create {
        /// Public Cloud プロジェクト (省略時は設定/OVH_CLOUD_PROJECT_SERVICE)
        #[arg(long)]
        service_name: Option<String>,
        /// クラスタID
        #[arg(long)]
        cluster_id: String,
        /// ユーザー名
        #[arg(long)]
        name: String,
        /// ACL (複数指定可)
        #[arg(long = "acl", value_name = "PATTERN=PERMISSION")]
        acls: Vec<Acl>,
    },
    /// 記録済みのユーザーを表示
    Show {
        /// SERVICE/CLUSTER/ID または opensearch-user:SERVICE/CLUSTER/ID
        key: String,
        /// パスワードも表示する
        #[arg(long)]
        show_password: bool,
    },
    /// APIから最新の状態を取得して記録を更新
    Refresh {
        /// SERVICE/CLUSTER/ID または opensearch-user:SERVICE/CLUSTER/ID
        key: String,
    },
    /// ACLを置き換え、READY になるまで待機
    Update {
        /// SERVICE/CLUSTER/ID または opensearch-user:SERVICE/CLUSTER/ID
        key: String,
        /// 新しいACL (省略時は全ACLを削除)
        #[arg(long = "acl", value_name = "PATTERN=PERMISSION")]
        acls: Vec<Acl>,
    },
    /// ユーザーを削除し、消えるまで待機
    Delete {
        /// SERVICE/CLUSTER/ID または opensearch-user:SERVICE/CLUSTER/ID
        key: String,
    },
    /// 既存のユーザーを取り込む
    Import {
        /// SERVICE/CLUSTER/ID
        import_id: String,
    },
    /// 記録済みのユーザー一覧を表示
    List,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdoutはコマンド出力に使うので、ログはstderrへ
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("clusterflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let ctx = context::Context::load(&cli.project_dir)?;

    match cli.command {
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
        Commands::Config => {
            commands::config::handle(&ctx);
        }
        Commands::User(user_cmd) => match user_cmd {
            UserCommands::Create {
                service_name,
                cluster_id,
                name,
                acls,
            } => {
                commands::user::create(&ctx, service_name, cluster_id, name, acls).await?;
            }
            UserCommands::Show { key, show_password } => {
                commands::user::show(&ctx, &key, show_password).await?;
            }
            UserCommands::Refresh { key } => {
                commands::user::refresh(&ctx, &key).await?;
            }
            UserCommands::Update { key, acls } => {
                commands::user::update(&ctx, &key, acls).await?;
            }
            UserCommands::Delete { key } => {
                commands::user::delete(&ctx, &key).await?;
            }
            UserCommands::Import { import_id } => {
                commands::user::import(&ctx, &import_id).await?;
            }
            UserCommands::List => {
                commands::user::list(&ctx).await?;
            }
        },
    }

    Ok(())
}
