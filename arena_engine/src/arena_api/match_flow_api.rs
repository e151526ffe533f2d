use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    arena_api::errors::MatchFlowError,
    chain::{ChainAdapter, ContractCall},
    db_types::{Address, Match, MatchId, MatchStatus, NewMatch},
    traits::{ArenaDatabase, InsertMatchResult},
};

const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

/// `MatchRegistryApi` is the primary API for driving a match through its lifecycle:
/// `Created` → `Staked` → `Settled` or `Refunded`.
///
/// Every state-changing operation follows the same shape: validate against the local mirror,
/// submit the call through the chain adapter, await confirmation (with a timeout), and then
/// record the confirmed state in the mirror. On a confirmation timeout the outcome on chain is
/// ambiguous; the mirror is left untouched and the caller must query [`Self::match_by_id`] before
/// deciding whether to resubmit.
pub struct MatchRegistryApi<B, C> {
    db: B,
    chain: C,
    confirmation_timeout: Duration,
}

impl<B, C> Debug for MatchRegistryApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchRegistryApi")
    }
}

impl<B, C> MatchRegistryApi<B, C> {
    pub fn new(db: B, chain: C) -> Self {
        Self { db, chain, confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }
}

impl<B, C> MatchRegistryApi<B, C>
where
    B: ArenaDatabase,
    C: ChainAdapter,
{
    /// Creates a new match between two distinct players with a positive stake.
    ///
    /// Fails with `Validation` on a self-match or non-positive stake, and with `AlreadyExists` if
    /// the match id is already known.
    pub async fn create_match(&self, new_match: NewMatch) -> Result<Match, MatchFlowError> {
        new_match.validate().map_err(|e| MatchFlowError::Validation(e.to_string()))?;
        if self.db.fetch_match(&new_match.match_id).await?.is_some() {
            return Err(MatchFlowError::AlreadyExists(new_match.match_id));
        }
        let call = ContractCall::CreateMatch {
            match_id: new_match.match_id.clone(),
            player1: new_match.player1.clone(),
            player2: new_match.player2.clone(),
            stake: new_match.stake,
        };
        self.submit_and_confirm(call).await?;
        match self.db.insert_match(&new_match).await? {
            InsertMatchResult::Inserted(id) => {
                debug!("🎮️ Match {} created with id {id}", new_match.match_id);
            },
            InsertMatchResult::AlreadyExists(_) => {
                // Lost a race with a concurrent creation of the same id.
                return Err(MatchFlowError::AlreadyExists(new_match.match_id));
            },
        }
        let created = self
            .db
            .fetch_match(&new_match.match_id)
            .await?
            .ok_or_else(|| MatchFlowError::NotFound(new_match.match_id.clone()))?;
        Ok(created)
    }

    /// Records that `player` stakes their tokens in the match. When the second player stakes, the
    /// match transitions to `Staked` and its start time is recorded.
    pub async fn stake(&self, match_id: &MatchId, player: &Address) -> Result<Match, MatchFlowError> {
        let m = self.db.fetch_match(match_id).await?.ok_or_else(|| MatchFlowError::NotFound(match_id.clone()))?;
        if m.status != MatchStatus::Created {
            return Err(MatchFlowError::InvalidState { match_id: match_id.clone(), status: m.status, op: "stake" });
        }
        if !m.is_participant(player) {
            return Err(MatchFlowError::Validation(format!("{player} is not a participant of match {match_id}")));
        }
        if m.has_staked(player) {
            return Err(MatchFlowError::Validation(format!("{player} has already staked in match {match_id}")));
        }
        let call = ContractCall::Stake { match_id: match_id.clone(), player: player.clone() };
        self.submit_and_confirm(call).await?;
        let updated = self.db.record_stake(match_id, player).await?;
        debug!("🎮️ {player} staked in match {match_id}. Status: {}", updated.status);
        Ok(updated)
    }

    /// Declares `winner` and settles the match. The payout submitted with the call is twice the
    /// stake; the `Settled` event the contract emits remains the authoritative record the stats
    /// ledger books against.
    pub async fn commit_result(&self, match_id: &MatchId, winner: &Address) -> Result<Match, MatchFlowError> {
        let m = self.db.fetch_match(match_id).await?.ok_or_else(|| MatchFlowError::NotFound(match_id.clone()))?;
        if m.status != MatchStatus::Staked {
            return Err(MatchFlowError::InvalidState {
                match_id: match_id.clone(),
                status: m.status,
                op: "commit_result",
            });
        }
        if !m.is_participant(winner) {
            return Err(MatchFlowError::Validation(format!("winner {winner} is not a participant of match {match_id}")));
        }
        let payout = m.payout();
        let call = ContractCall::CommitResult { match_id: match_id.clone(), winner: winner.clone(), payout };
        self.submit_and_confirm(call).await?;
        let settled = self.db.record_settlement(match_id, winner).await?;
        info!("🎮️ Match {match_id} settled. {winner} wins {payout}");
        Ok(settled)
    }

    /// Refunds the stakes of a match that never became fully staked. Whether a refund is *due*
    /// (e.g. a staking deadline lapsed) is the caller's policy; this operation only enforces the
    /// state machine.
    pub async fn refund(&self, match_id: &MatchId) -> Result<Match, MatchFlowError> {
        let m = self.db.fetch_match(match_id).await?.ok_or_else(|| MatchFlowError::NotFound(match_id.clone()))?;
        if m.status != MatchStatus::Created {
            return Err(MatchFlowError::InvalidState { match_id: match_id.clone(), status: m.status, op: "refund" });
        }
        let call = ContractCall::Refund { match_id: match_id.clone() };
        self.submit_and_confirm(call).await?;
        let refunded = self.db.record_refund(match_id).await?;
        info!("🎮️ Match {match_id} refunded");
        Ok(refunded)
    }

    /// The local mirror of the match, if known.
    pub async fn match_by_id(&self, match_id: &MatchId) -> Result<Option<Match>, MatchFlowError> {
        Ok(self.db.fetch_match(match_id).await?)
    }

    async fn submit_and_confirm(&self, call: ContractCall) -> Result<(), MatchFlowError> {
        let match_id = call.match_id().clone();
        let handle = self.chain.submit(call).await?;
        trace!("🎮️ Call for match {match_id} submitted as {handle:?}. Awaiting confirmation");
        let receipt = self.chain.await_confirmation(&handle, self.confirmation_timeout).await?;
        trace!("🎮️ Tx {} for match {match_id} confirmed at {}", receipt.txid, receipt.block);
        Ok(())
    }
}
