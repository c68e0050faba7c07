pub mod admin;
pub mod common;
pub mod gacha;

pub use admin::*;
pub use common::*;
pub use gacha::*;
