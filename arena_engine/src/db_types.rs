use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use gt_common::GameToken;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::helpers::{is_valid_address, is_valid_match_id};

#[derive(Debug, Clone, Error)]
#[error("Invalid {0}: {1}")]
pub struct ParseError(pub &'static str, pub String);

//--------------------------------------      MatchId        ---------------------------------------------------------
/// A fixed-length opaque match identifier. The canonical form is `0x` followed by 64 lowercase hex
/// characters, i.e. the 32 bytes the settlement contract keys matches by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MatchId(String);

impl MatchId {
    /// Encodes a short human-readable label (at most 31 bytes of UTF-8) as a right-padded 32-byte
    /// identifier, matching the encoding the original tooling used for match ids.
    pub fn from_label(label: &str) -> Result<Self, ParseError> {
        let bytes = label.as_bytes();
        if bytes.is_empty() || bytes.len() > 31 {
            return Err(ParseError("match id label", format!("{label} must be 1-31 bytes")));
        }
        let mut buf = [0u8; 32];
        buf[..bytes.len()].copy_from_slice(bytes);
        let hex: String = buf.iter().map(|b| format!("{b:02x}")).collect();
        Ok(Self(format!("0x{hex}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MatchId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.to_ascii_lowercase();
        if is_valid_match_id(&id) {
            Ok(Self(id))
        } else {
            Err(ParseError("match id", s.to_string()))
        }
    }
}

impl Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------      Address        ---------------------------------------------------------
/// A lightweight wrapper around a player's chain address (`0x` + 40 hex characters). Addresses are
/// normalised to lowercase on parsing so that stats keyed by address never split over case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr = s.to_ascii_lowercase();
        if is_valid_address(&addr) {
            Ok(Self(addr))
        } else {
            Err(ParseError("address", s.to_string()))
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     MatchStatus     ---------------------------------------------------------
/// The lifecycle state of a match. Transitions only ever advance:
/// `Created` → `Staked` → { `Settled` | `Refunded` }, and the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum MatchStatus {
    /// The match exists and is waiting for one or both players to stake.
    Created,
    /// Both players have staked and the match is in progress.
    Staked,
    /// The match has been settled with a winner. Terminal.
    Settled,
    /// The stakes have been returned without declaring a winner. Terminal.
    Refunded,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Settled | MatchStatus::Refunded)
    }
}

impl Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Created => write!(f, "Created"),
            MatchStatus::Staked => write!(f, "Staked"),
            MatchStatus::Settled => write!(f, "Settled"),
            MatchStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid match status: {0}")]
pub struct ConversionError(String);

impl FromStr for MatchStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Staked" => Ok(Self::Staked),
            "Settled" => Ok(Self::Settled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

impl From<String> for MatchStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid match status: {value}. But this conversion cannot fail. Defaulting to Created");
            MatchStatus::Created
        })
    }
}

//--------------------------------------        Match        ---------------------------------------------------------
/// The local mirror of a match's authoritative on-chain state. Terminal rows are retained forever
/// as the historical record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub match_id: MatchId,
    pub player1: Address,
    pub player2: Address,
    pub stake: GameToken,
    pub p1_staked: bool,
    pub p2_staked: bool,
    /// Set when both players have staked and the match starts.
    pub start_time: Option<DateTime<Utc>>,
    pub status: MatchStatus,
    /// Set if, and only if, the match is `Settled`.
    pub winner: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn is_participant(&self, player: &Address) -> bool {
        &self.player1 == player || &self.player2 == player
    }

    /// The opponent of `player`, or `None` if `player` is not in this match.
    pub fn opponent_of(&self, player: &Address) -> Option<&Address> {
        if player == &self.player1 {
            Some(&self.player2)
        } else if player == &self.player2 {
            Some(&self.player1)
        } else {
            None
        }
    }

    pub fn has_staked(&self, player: &Address) -> bool {
        (player == &self.player1 && self.p1_staked) || (player == &self.player2 && self.p2_staked)
    }

    /// The amount the winner receives on settlement. Both stakes are pooled; no protocol fee is
    /// deducted locally. The payout carried in the `Settled` event remains authoritative for
    /// bookkeeping.
    pub fn payout(&self) -> GameToken {
        self.stake.pot()
    }
}

//--------------------------------------      NewMatch       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub match_id: MatchId,
    pub player1: Address,
    pub player2: Address,
    pub stake: GameToken,
}

impl NewMatch {
    pub fn new(match_id: MatchId, player1: Address, player2: Address, stake: GameToken) -> Self {
        Self { match_id, player1, player2, stake }
    }

    /// Checks the structural rules for a new match: two distinct players and a positive stake.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.player1 == self.player2 {
            return Err(ParseError("new match", "player1 and player2 must be distinct".to_string()));
        }
        if !self.stake.is_positive() {
            return Err(ParseError("new match", format!("stake must be positive, got {}", self.stake)));
        }
        Ok(())
    }
}

//--------------------------------------     PlayerStats     ---------------------------------------------------------
/// A player's cumulative match record. `matches_played == wins + losses` at all times, and every
/// field is monotonically non-decreasing. Rows are created lazily on the first contributing event
/// and never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlayerStats {
    pub address: Address,
    pub wins: i64,
    pub losses: i64,
    pub matches_played: i64,
    pub total_won: GameToken,
    pub total_lost: GameToken,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlayerStats {
    /// A zero-valued record for a player with no recorded matches. Absence is a valid state, not
    /// an error.
    pub fn empty(address: Address) -> Self {
        let now = Utc::now();
        Self {
            address,
            wins: 0,
            losses: 0,
            matches_played: 0,
            total_won: GameToken::default(),
            total_lost: GameToken::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.matches_played == 0 {
            return 0.0;
        }
        let rate = self.wins as f64 / self.matches_played as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    }
}

//--------------------------------------  LeaderboardEntry   ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub wins: i64,
    pub losses: i64,
    pub matches_played: i64,
    pub total_won: GameToken,
    pub total_lost: GameToken,
    /// `wins / matches_played * 100`, rounded to one decimal.
    pub win_rate: f64,
}

//--------------------------------------   AggregateStats    ---------------------------------------------------------
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Players with at least one recorded match.
    pub total_players: i64,
    /// Each settled match counts once (`Σ matches_played / 2`).
    pub total_matches: i64,
    /// `total_won + total_lost` summed over all players.
    pub total_transferred: GameToken,
}

//--------------------------------------       EventId       ---------------------------------------------------------
/// The stable identity of a chain event: transaction id plus log position. This is the key of the
/// processed-event markers that make ingestion idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(txid: &str, log_index: u32) -> Self {
        Self(format!("{txid}:{log_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------    BlockPosition    ---------------------------------------------------------
/// A monotonically advancing position in the chain's event stream. The ingestor persists the
/// highest durably processed position and resumes subscriptions from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct BlockPosition(i64);

impl BlockPosition {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl Display for BlockPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
