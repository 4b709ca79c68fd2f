use crate::context::Context;
use colored::Colorize;

pub fn handle(ctx: &Context) {
    let settings = &ctx.settings;

    match &ctx.config_path {
        Some(path) => println!("設定ファイル: {}", path.display().to_string().cyan()),
        None => println!("設定ファイル: {}", "(なし、デフォルト設定)".dimmed()),
    }
    println!("状態ファイル: {}", ctx.state.state_path().display());
    println!();

    println!("endpoint:     {}", ctx.endpoint());
    println!(
        "token:        {}",
        if settings.token.is_some() {
            "********".to_string()
        } else {
            "(未設定)".yellow().to_string()
        }
    );
    println!(
        "service_name: {}",
        settings.service_name.as_deref().unwrap_or("(未設定)")
    );

    let timeouts = ctx.timeouts();
    println!("timeouts:");
    println!("  create: {}s", timeouts.create.as_secs());
    println!("  update: {}s", timeouts.update.as_secs());
    println!("  delete: {}s", timeouts.delete.as_secs());

    let poll = ctx.poll_config();
    println!("poll:");
    println!("  initial_delay:     {:?}", poll.initial_delay);
    println!("  interval:          {:?}", poll.interval);
    println!("  max_interval:      {:?}", poll.max_interval);
    println!("  multiplier:        {}", poll.multiplier);
    println!("  max_fetch_retries: {}", poll.max_fetch_retries);
}
