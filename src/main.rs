use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use chrono::Local; // 日志时间戳
use env_logger::{Env, Target};
use std::io::Write; // env_logger 自定义格式化需要
use std::sync::Arc;

use gacha_dispatcher::{
    bot,
    config::Config,
    database::{create_pool, run_migrations},
    engine::Dispatcher,
    handlers,
    middlewares::create_cors,
    services::GachaService,
    store::DbTriggerStore,
    swagger::swagger_config,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().context("Failed to load configuration")?;

    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database connection pool")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store = Arc::new(DbTriggerStore::new(pool.clone()));
    let dispatcher = Arc::new(Dispatcher::from_settings(store, &config.gacha));
    let gacha_service = GachaService::new(pool.clone());

    if config.bot_enabled() {
        let discord = config.discord.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = bot::run(discord, dispatcher).await {
                log::error!("Discord bot stopped: {e}");
            }
        });
    } else {
        log::warn!("DISCORD_TOKEN is not set; running the admin API only");
    }

    log::info!(
        "Starting HTTP server at {}:{} (cooldown {}s)",
        config.server.host,
        config.server.port,
        config.gacha.cooldown_secs
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(gacha_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::health_config)
                    .configure(handlers::gacha_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
