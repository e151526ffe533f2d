use std::{
    fmt::Display,
    ops::{Add, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::op;

pub const GT_CURRENCY_CODE: &str = "GT";

/// One millionth of a GameToken, the smallest unit the token contract tracks.
const MICRO_GT: i64 = 1_000_000;

//--------------------------------------     GameToken       ---------------------------------------------------------
/// An amount of GameTokens, denominated in micro-GT.
///
/// Stakes, payouts and the ledger's running totals are all carried as this type. Amounts are
/// signed so that deltas can be expressed, but every stake the engine accepts must satisfy
/// [`GameToken::is_positive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct GameToken(i64);

op!(binary GameToken, Add, add);
op!(binary GameToken, Sub, sub);

impl GameToken {
    /// An amount of whole GameTokens.
    pub fn from_gt(value: i64) -> Self {
        Self(value * MICRO_GT)
    }

    /// An amount in micro-GT, exactly as the contract and the ledger store it.
    pub fn from_micro_gt(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Whether this amount is a legal stake. Zero and negative amounts are not.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The pot a match with this stake settles for: both players' stakes pooled.
    pub fn pot(&self) -> Self {
        Self(self.0 * 2)
    }
}

impl Display for GameToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gt = self.0 as f64 / MICRO_GT as f64;
        write!(f, "{gt:0.3}{GT_CURRENCY_CODE}")
    }
}
