mod game_token;

pub mod op;

pub use game_token::{GameToken, GT_CURRENCY_CODE};
