pub mod gacha_items;
pub mod gachas;

pub use gacha_items as gacha_item_entity;
pub use gachas as gacha_entity;
