//! Discord 网关：把服务器消息转换为 [`ChatEvent`](crate::models::ChatEvent) 交给
//! [`Dispatcher`]，并回帖抽取结果

pub mod commands;
pub mod events;

use std::sync::Arc;

use poise::serenity_prelude as serenity;

use crate::config::DiscordConfig;
use crate::engine::Dispatcher;
use crate::error::{AppError, AppResult};

/// 所有命令和事件处理器共享的数据
pub struct Data {
    pub dispatcher: Arc<Dispatcher>,
    pub dashboard_url: String,
}

pub type Context<'a> = poise::Context<'a, Data, AppError>;

/// 连接网关并持续运行，直到客户端停止或收到关闭信号
pub async fn run(config: DiscordConfig, dispatcher: Arc<Dispatcher>) -> AppResult<()> {
    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let register_guild = config.guild_id.map(serenity::GuildId::new);
    let dashboard_url = config.dashboard_url.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![commands::gacha()],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    events::handle_event(ctx, event, data).await;
                    Ok(())
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            log::error!("Command /{} failed: {error}", ctx.command().qualified_name);
                            let _ = ctx
                                .send(
                                    poise::CreateReply::default()
                                        .content("Something went wrong.")
                                        .ephemeral(true),
                                )
                                .await;
                        }
                        other => {
                            if let Err(e) = poise::builtins::on_error(other).await {
                                log::error!("Error while handling error: {e}");
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                log::info!(
                    "Bot {} is ready in {} guilds",
                    ready.user.name,
                    ready.guilds.len()
                );

                if let Some(guild_id) = register_guild {
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                        .await?;
                    log::info!("Slash commands registered to guild {guild_id}");
                } else {
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                    log::info!("Slash commands registered globally");
                }

                Ok(Data {
                    dispatcher,
                    dashboard_url,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping bot...");
        shard_manager.shutdown_all().await;
    });

    log::info!("Starting bot...");
    client.start().await?;
    log::info!("Bot has shut down cleanly");
    Ok(())
}

/// 收到 SIGINT 或 SIGTERM 时返回；安装失败的信号处理器永不触发
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
