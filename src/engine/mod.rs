//! 扭蛋引擎：匹配器、冷却门、抽取引擎，以及按聊天事件串联它们的 dispatcher

pub mod cooldown;
pub mod dispatcher;
pub mod draw;
pub mod matcher;

pub use cooldown::{Clock, CooldownGate, ManualClock, SystemClock};
pub use dispatcher::Dispatcher;
pub use draw::{RandomSource, SeededRandom, SequenceRandom, ThreadRandom, draw};
pub use matcher::match_gacha;
