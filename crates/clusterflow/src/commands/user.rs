use crate::context::Context;
use anyhow::Context as _;
use clusterflow_cloud::{GlobalState, ResourceAdapter, ResourceState};
use clusterflow_cloud_ovh::models::Acl;
use clusterflow_cloud_ovh::{OpenSearchUser, OpenSearchUserConfig, RESOURCE_TYPE, parse_import_id};
use colored::Colorize;
use secrecy::ExposeSecret;

const LOCK_CONTEXT: &str = "状態ファイルのロックを取得できませんでした";

/// `SERVICE/CLUSTER/ID` を状態ファイルのキーに正規化
fn state_key(key: &str) -> String {
    let prefix = format!("{}:", RESOURCE_TYPE);
    if key.starts_with(&prefix) {
        key.to_string()
    } else {
        format!("{}{}", prefix, key)
    }
}

fn tracked<'a>(global: &'a GlobalState, key: &str) -> anyhow::Result<&'a ResourceState> {
    global.get_resource(key).ok_or_else(|| {
        anyhow::anyhow!(
            "{} は記録されていません（`clusterflow user list` で確認してください）",
            key
        )
    })
}

/// 既に記録済みなら記録を起点にする（作成時にしか返らないパスワードを保持）
fn import_seed(global: &GlobalState, seed: ResourceState) -> ResourceState {
    match global.get_resource(&seed.key()) {
        Some(tracked) => {
            tracing::info!("{} is already tracked, refreshing it", seed.key());
            tracked.clone()
        }
        None => seed,
    }
}

fn print_user(user: &OpenSearchUser, show_password: bool) {
    println!("  id:         {}", user.import_id().cyan());
    println!("  name:       {}", user.name);
    println!(
        "  status:     {}",
        user.status
            .as_ref()
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "(不明)".to_string())
    );
    println!(
        "  created_at: {}",
        user.created_at.as_deref().unwrap_or("(不明)")
    );
    if user.acls.is_empty() {
        println!("  acls:       (なし)");
    } else {
        println!("  acls:");
        for acl in &user.acls {
            println!("    - {}", acl);
        }
    }
    match (&user.password, show_password) {
        (Some(password), true) => println!("  password:   {}", password.expose_secret().yellow()),
        (Some(_), false) => println!("  password:   ******** (--show-password で表示)"),
        (None, _) => println!("  password:   (不明)"),
    }
}

pub async fn create(
    ctx: &Context,
    service_name: Option<String>,
    cluster_id: String,
    name: String,
    acls: Vec<Acl>,
) -> anyhow::Result<()> {
    let users = ctx.user_resource()?;
    let config = OpenSearchUserConfig {
        service_name,
        cluster_id,
        name,
        acls: acls.into_iter().collect(),
    }
    .into_resource_config()?;

    let lock = ctx.state.acquire_lock().await.context(LOCK_CONTEXT)?;
    let mut global = ctx.state.load().await?;

    println!("{}", "ユーザーを作成中（READY になるまで待機します）...".blue());
    let state = users
        .create(&config, ctx.timeouts().create)
        .await
        .context("ユーザーの作成に失敗しました")?;
    let user = OpenSearchUser::from_state(&state)?;

    global.set_resource(state);
    ctx.state.save(&global).await?;
    lock.release().await?;

    println!("{}", "✓ ユーザーを作成しました".green().bold());
    // パスワードは作成時にしか返らない
    print_user(&user, true);
    Ok(())
}

pub async fn show(ctx: &Context, key: &str, show_password: bool) -> anyhow::Result<()> {
    let key = state_key(key);
    let global = ctx.state.load().await?;
    let user = OpenSearchUser::from_state(tracked(&global, &key)?)?;

    print_user(&user, show_password);
    Ok(())
}

pub async fn refresh(ctx: &Context, key: &str) -> anyhow::Result<()> {
    let key = state_key(key);
    let users = ctx.user_resource()?;

    let lock = ctx.state.acquire_lock().await.context(LOCK_CONTEXT)?;
    let mut global = ctx.state.load().await?;
    let state = tracked(&global, &key)?.clone();

    match users.read(&state).await? {
        Some(fresh) => {
            let user = OpenSearchUser::from_state(&fresh)?;
            global.set_resource(fresh);
            ctx.state.save(&global).await?;
            println!("{}", "✓ 最新の状態を取得しました".green());
            print_user(&user, false);
        }
        None => {
            global.remove_resource(&key);
            ctx.state.save(&global).await?;
            println!(
                "{}",
                format!("⚠ {} はもう存在しないため記録から削除しました", key).yellow()
            );
        }
    }

    lock.release().await?;
    Ok(())
}

pub async fn update(ctx: &Context, key: &str, acls: Vec<Acl>) -> anyhow::Result<()> {
    let key = state_key(key);
    let users = ctx.user_resource()?;

    let lock = ctx.state.acquire_lock().await.context(LOCK_CONTEXT)?;
    let mut global = ctx.state.load().await?;
    let state = tracked(&global, &key)?.clone();
    let current = OpenSearchUser::from_state(&state)?;

    let config = OpenSearchUserConfig {
        service_name: Some(current.service_name.clone()),
        cluster_id: current.cluster_id.clone(),
        name: current.name.clone(),
        acls: acls.into_iter().collect(),
    }
    .into_resource_config()?;

    println!("{}", "ACLを更新中（READY になるまで待機します）...".blue());
    let updated = users
        .update(&state, &config, ctx.timeouts().update)
        .await
        .context("ユーザーの更新に失敗しました")?;
    let user = OpenSearchUser::from_state(&updated)?;

    global.set_resource(updated);
    ctx.state.save(&global).await?;
    lock.release().await?;

    println!("{}", "✓ ユーザーを更新しました".green().bold());
    print_user(&user, false);
    Ok(())
}

pub async fn delete(ctx: &Context, key: &str) -> anyhow::Result<()> {
    let key = state_key(key);
    let users = ctx.user_resource()?;

    let lock = ctx.state.acquire_lock().await.context(LOCK_CONTEXT)?;
    let mut global = ctx.state.load().await?;
    let state = tracked(&global, &key)?.clone();

    println!("{}", "ユーザーを削除中（消えるまで待機します）...".blue());
    users
        .delete(&state, ctx.timeouts().delete)
        .await
        .context("ユーザーの削除に失敗しました")?;

    global.remove_resource(&key);
    ctx.state.save(&global).await?;
    lock.release().await?;

    println!("{}", format!("✓ {} を削除しました", key).green().bold());
    Ok(())
}

pub async fn import(ctx: &Context, import_id: &str) -> anyhow::Result<()> {
    // 書式エラーはAPIに触れる前に返す
    parse_import_id(import_id)?;
    let users = ctx.user_resource()?;

    let lock = ctx.state.acquire_lock().await.context(LOCK_CONTEXT)?;
    let mut global = ctx.state.load().await?;

    let seed = import_seed(&global, users.import(import_id)?);
    let state = users
        .read(&seed)
        .await?
        .ok_or_else(|| anyhow::anyhow!("ユーザー {} は存在しません", import_id))?;
    let user = OpenSearchUser::from_state(&state)?;

    global.set_resource(state);
    ctx.state.save(&global).await?;
    lock.release().await?;

    println!("{}", "✓ ユーザーを取り込みました".green().bold());
    print_user(&user, false);
    Ok(())
}

pub async fn list(ctx: &Context) -> anyhow::Result<()> {
    let global = ctx.state.load().await?;
    let users = global.resources_of_type(RESOURCE_TYPE);

    if users.is_empty() {
        println!("記録されているユーザーはありません");
        return Ok(());
    }

    println!("ユーザー: {}個", users.len());
    for state in users {
        let user = OpenSearchUser::from_state(state)?;
        println!(
            "  - {} {} [{}]",
            user.import_id().cyan(),
            user.name,
            state.status
        );
    }
    Ok(())
}
