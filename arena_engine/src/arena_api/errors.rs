use thiserror::Error;

use crate::{
    chain::ChainError,
    db_types::{MatchId, MatchStatus},
    traits::{ArenaDatabaseError, StatsApiError},
};

/// The user-visible failures of match registry operations. Permanent rejections (validation,
/// state, not-found) must not be retried; transient failures (chain connectivity, confirmation
/// timeout) may be, but only after re-querying current match state; see [`Self::is_transient`].
#[derive(Debug, Error)]
pub enum MatchFlowError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Operation '{op}' is illegal while match {match_id} is {status}")]
    InvalidState { match_id: MatchId, status: MatchStatus, op: &'static str },
    #[error("Match not found: {0}")]
    NotFound(MatchId),
    #[error("Match already exists: {0}")]
    AlreadyExists(MatchId),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl MatchFlowError {
    /// Whether resubmission is sensible. On a transient failure the caller must first query the
    /// current match state; the ambiguous outcome of a timed-out confirmation means a blind
    /// resubmit could double-stake or double-settle.
    pub fn is_transient(&self) -> bool {
        matches!(self, MatchFlowError::Chain(e) if e.is_transient())
    }
}

impl From<ArenaDatabaseError> for MatchFlowError {
    fn from(e: ArenaDatabaseError) -> Self {
        match e {
            ArenaDatabaseError::MatchNotFound(id) => MatchFlowError::NotFound(id),
            ArenaDatabaseError::InvalidState { match_id, status, op } => {
                MatchFlowError::InvalidState { match_id, status, op }
            },
            ArenaDatabaseError::NotAParticipant { .. }
            | ArenaDatabaseError::AlreadyStaked { .. }
            | ArenaDatabaseError::InvalidWinner { .. } => MatchFlowError::Validation(e.to_string()),
            ArenaDatabaseError::DatabaseError(msg) => MatchFlowError::DatabaseError(msg),
        }
    }
}

impl From<StatsApiError> for MatchFlowError {
    fn from(e: StatsApiError) -> Self {
        MatchFlowError::DatabaseError(e.to_string())
    }
}
