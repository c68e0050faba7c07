pub mod gacha_service;

pub use gacha_service::*;
