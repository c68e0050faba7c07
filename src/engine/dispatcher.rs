use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::cooldown::{Clock, CooldownGate, SystemClock};
use super::draw::{RandomSource, ThreadRandom, draw, sanitize_items};
use super::matcher::match_gacha;
use crate::config::GachaSettings;
use crate::models::{ChatEvent, DrawOutcome};
use crate::store::{StoreError, TriggerStore};

/// 单个事件的处理流程：匹配、冷却判断、占用、抽取
///
/// 自身不持有可变状态，唯一的共享状态是 store 中的 `last_used_at`
/// 事件之间互不影响，处理失败时记录日志并返回 `NoMatch`
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn TriggerStore>,
    gate: CooldownGate,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    store_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TriggerStore>,
        gate: CooldownGate,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gate,
            clock,
            rng,
            store_timeout,
        }
    }

    /// 生产环境装配：系统时钟、线程随机数、配置中的参数
    pub fn from_settings(store: Arc<dyn TriggerStore>, settings: &GachaSettings) -> Self {
        Self::new(
            store,
            CooldownGate::from_secs(settings.cooldown_secs),
            Arc::new(SystemClock),
            Arc::new(ThreadRandom),
            Duration::from_millis(settings.store_timeout_ms),
        )
    }

    pub async fn handle_event(&self, event: &ChatEvent) -> DrawOutcome {
        match self.resolve(event).await {
            Ok(outcome) => {
                match &outcome {
                    DrawOutcome::NoMatch => {}
                    DrawOutcome::CooldownClosed { gacha } => {
                        log::debug!("Gacha '{}' is cooling down, event dropped", gacha.name);
                    }
                    DrawOutcome::Drawn { gacha, item } => {
                        log::info!(
                            "Gacha '{}' in guild {} drew '{}' for {}",
                            gacha.name,
                            gacha.scope.guild_id,
                            item.item_name,
                            event.author
                        );
                    }
                    DrawOutcome::EmptyTable { gacha } => {
                        log::info!("Gacha '{}' has no drawable items", gacha.name);
                    }
                }
                outcome
            }
            Err(e) => {
                log::error!(
                    "Gacha dispatch failed for guild {}: {e}",
                    event.scope.guild_id
                );
                DrawOutcome::NoMatch
            }
        }
    }

    async fn resolve(&self, event: &ChatEvent) -> Result<DrawOutcome, StoreError> {
        let text = event.text.trim();
        if text.is_empty() {
            return Ok(DrawOutcome::NoMatch);
        }

        let configs = self
            .with_timeout(self.store.list_configs_for_scope(
                &event.scope.guild_id,
                event.scope.channel_id.as_deref(),
            ))
            .await?;

        let Some(matched) = match_gacha(&configs, &event.scope, text, &event.author_roles) else {
            return Ok(DrawOutcome::NoMatch);
        };
        let mut gacha = matched.clone();

        let now = self.clock.now();
        if !self.gate.is_open(&gacha, now) {
            return Ok(DrawOutcome::CooldownClosed { gacha });
        }

        // 快照可能已过期，以条件占用的结果为准
        let claimed = self
            .with_timeout(self.store.claim_cooldown(gacha.id, now, self.gate.window()))
            .await?;
        if !claimed {
            return Ok(DrawOutcome::CooldownClosed { gacha });
        }
        gacha.last_used_at = Some(now);

        let items = self
            .with_timeout(self.store.list_items(&gacha.scope.guild_id, &gacha.name))
            .await?;
        let (items, issues) = sanitize_items(items);
        for issue in &issues {
            log::warn!("Gacha '{}': skipping {issue}", gacha.name);
        }

        Ok(match draw(&items, self.rng.as_ref()) {
            Some(item) => DrawOutcome::Drawn {
                item: item.clone(),
                gacha,
            },
            None => DrawOutcome::EmptyTable { gacha },
        })
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}
