pub mod gacha;
pub mod health;

pub use gacha::gacha_config;
pub use health::health_config;
