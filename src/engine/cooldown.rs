use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::models::{GachaConfig, millis_to_datetime};

/// 冷却判断使用的时间源
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.millis.load(Ordering::SeqCst);
        millis_to_datetime(ms).unwrap_or_else(Utc::now)
    }
}

/// 按扭蛋防抖：每个窗口内最多一次抽取，不累积也不排队
///
/// 这里只读；`last_used_at` 的写入由 store 的原子占用完成，并发时以其为准
#[derive(Debug, Clone, Copy)]
pub struct CooldownGate {
    window: Duration,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// 超过 `MAX_COOLDOWN_SECS` 的值按上限处理
    pub fn from_secs(secs: u64) -> Self {
        let secs = secs.min(crate::config::MAX_COOLDOWN_SECS);
        Self::new(Duration::seconds(secs as i64))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_open(&self, gacha: &GachaConfig, now: DateTime<Utc>) -> bool {
        match gacha.last_used_at {
            None => true,
            Some(last) => now - last >= self.window,
        }
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::from_secs(crate::config::DEFAULT_COOLDOWN_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;
    use chrono::TimeZone;

    fn gacha(last_used_at: Option<DateTime<Utc>>) -> GachaConfig {
        GachaConfig {
            id: 1,
            scope: Scope::guild("g1"),
            name: "daily".into(),
            trigger_phrase: "daily".into(),
            restricted_role_id: None,
            last_used_at,
            retention_days: None,
        }
    }

    #[test]
    fn test_never_used_is_open() {
        let gate = CooldownGate::from_secs(30);
        assert!(gate.is_open(&gacha(None), Utc::now()));
    }

    #[test]
    fn test_oversized_window_is_capped() {
        let gate = CooldownGate::from_secs(u64::MAX);
        assert_eq!(gate.window(), Duration::days(365));
    }

    #[test]
    fn test_window_boundary() {
        let gate = CooldownGate::from_secs(30);
        let t0 = Utc.with_ymd_and_hms(2025, 10, 16, 9, 0, 0).unwrap();
        let g = gacha(Some(t0));

        assert!(!gate.is_open(&g, t0));
        assert!(!gate.is_open(&g, t0 + Duration::milliseconds(29_999)));
        assert!(gate.is_open(&g, t0 + Duration::seconds(30)));
        assert!(gate.is_open(&g, t0 + Duration::minutes(5)));
    }

    #[test]
    fn test_default_window() {
        assert_eq!(CooldownGate::default().window(), Duration::seconds(30));
    }

    #[test]
    fn test_manual_clock_advances() {
        let t0 = Utc.with_ymd_and_hms(2025, 10, 16, 9, 0, 0).unwrap();
        let clock = ManualClock::new(t0);
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::seconds(31));
        assert_eq!(clock.now(), t0 + Duration::seconds(31));
    }
}
