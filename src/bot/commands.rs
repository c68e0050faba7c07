use super::Context;
use crate::error::AppError;

/// 扭蛋相关命令
#[poise::command(slash_command, subcommands("dashboard"), subcommand_required)]
pub async fn gacha(_ctx: Context<'_>) -> Result<(), AppError> {
    Ok(())
}

/// 显示扭蛋管理入口
#[poise::command(slash_command)]
pub async fn dashboard(ctx: Context<'_>) -> Result<(), AppError> {
    let content = dashboard_reply(&ctx.data().dashboard_url);
    ctx.send(poise::CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}

pub fn dashboard_reply(url: &str) -> String {
    if url.trim().is_empty() {
        "No dashboard is configured for this bot.".to_string()
    } else {
        format!("📊 Gacha dashboard: {url}")
    }
}
