//! Per-transaction consensus state.

use crate::ConsensusConfig;
use snowglobe_types::{Transaction, TxStatus};
use std::collections::HashMap;

/// Result of feeding one response into a [`TxState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep gossiping: the caller should emit a follow-up query carrying
    /// the current preference.
    Continue,
    /// The state reached the final epoch and froze with this terminal
    /// classification.
    Finalized(TxStatus),
}

/// Consensus state for a single transaction on a single engine.
///
/// Holds the current preference, the responses collected this epoch, the
/// per-status confidence tallies, and the conviction counter. Mutated only
/// by the owning engine's message handlers; once the final epoch is
/// reached the state is frozen and the engine stops feeding it.
#[derive(Debug)]
pub struct TxState {
    tx: Transaction,

    /// Statuses received from peers in the current epoch.
    responses: Vec<TxStatus>,
    epoch: u64,

    /// Confidence per status, incremented once per threshold crossing.
    status_conf: HashMap<TxStatus, u32>,
    /// Consecutive same-status threshold crossings for `last_status`.
    cnt: u32,

    /// Current preferred classification.
    status: TxStatus,

    /// The last status that crossed the quorum threshold; flips reset the
    /// conviction counter.
    last_status: TxStatus,

    /// Whether this engine originated the transaction. Only the origin
    /// erases its mempool entry on a Valid finalization.
    submitted_locally: bool,
}

impl TxState {
    /// Create state for a freshly sighted transaction with an initial
    /// preference (the verifier's verdict locally, or the inquirer's
    /// preference when adopted from a query).
    pub fn new(tx: Transaction, status: TxStatus, submitted_locally: bool) -> Self {
        let status_conf = HashMap::from([(TxStatus::Valid, 0), (TxStatus::Invalid, 0)]);

        Self {
            tx,
            responses: Vec::new(),
            epoch: 0,
            status_conf,
            cnt: 0,
            status,
            last_status: status,
            submitted_locally,
        }
    }

    /// The transaction this state tracks.
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// Current preferred classification.
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Current epoch counter.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Confidence accumulated for a status.
    pub fn confidence(&self, status: TxStatus) -> u32 {
        self.status_conf.get(&status).copied().unwrap_or(0)
    }

    /// Whether this engine originated the transaction.
    pub fn submitted_locally(&self) -> bool {
        self.submitted_locally
    }

    /// Whether the state is terminal. Terminal states never change again.
    pub fn is_final(&self, config: &ConsensusConfig) -> bool {
        self.epoch >= config.max_epoch
    }

    /// Advance to the next epoch: reset the collected responses and bump
    /// the epoch counter. Returns true when the final epoch is reached.
    fn advance(&mut self, config: &ConsensusConfig) -> bool {
        self.epoch += 1;
        self.responses.clear();

        self.epoch == config.max_epoch
    }

    /// Increment the confidence for a status and return the new value.
    fn incr_confidence(&mut self, status: TxStatus) -> u32 {
        let conf = self.status_conf.entry(status).or_insert(0);
        *conf += 1;
        *conf
    }

    /// Count how many responses this epoch match a status.
    fn count_matching(&self, status: TxStatus) -> usize {
        self.responses.iter().filter(|s| **s == status).count()
    }

    /// Feed one peer response into the quorum-and-conviction step.
    ///
    /// The response is recorded; if enough responses this epoch now agree
    /// with it, the crossing bumps that status's confidence, possibly
    /// switches the preference, and either resets or grows the conviction
    /// counter. Sufficient conviction advances the epoch, and the final
    /// advance freezes the state.
    ///
    /// Callers must not invoke this on a terminal state.
    pub fn on_response(&mut self, received: TxStatus, config: &ConsensusConfig) -> StepOutcome {
        self.responses.push(received);

        let n = self.count_matching(received);
        if config.quorum_reached(n) {
            let conf = self.incr_confidence(received);
            let our_conf = self.confidence(self.status);

            if conf > our_conf {
                self.status = received;
                self.last_status = received;
            }

            if received != self.last_status {
                self.last_status = received;
                self.cnt = 0;
            } else {
                self.cnt += 1;
                if config.conviction_reached(self.cnt) && self.advance(config) {
                    return StepOutcome::Finalized(self.status);
                }
            }
        }

        StepOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snowglobe_types::{Keypair, ShardId};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_tx() -> Transaction {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        Keypair::generate(&mut rng).sign_transaction(1, 2, ShardId(0))
    }

    fn feed(state: &mut TxState, status: TxStatus, n: usize, config: &ConsensusConfig) {
        for _ in 0..n {
            assert_eq!(state.on_response(status, config), StepOutcome::Continue);
        }
    }

    #[test]
    fn test_unanimous_quorum_builds_conviction() {
        let config = ConsensusConfig::default();
        let mut state = TxState::new(test_tx(), TxStatus::Valid, true);

        // Below quorum nothing moves.
        feed(&mut state, TxStatus::Valid, 2, &config);
        assert_eq!(state.confidence(TxStatus::Valid), 0);
        assert_eq!(state.cnt, 0);

        // Third matching response crosses the threshold.
        assert_eq!(state.on_response(TxStatus::Valid, &config), StepOutcome::Continue);
        assert_eq!(state.confidence(TxStatus::Valid), 1);
        assert_eq!(state.cnt, 1);

        // Each further confirming response is another crossing.
        assert_eq!(state.on_response(TxStatus::Valid, &config), StepOutcome::Continue);
        assert_eq!(state.confidence(TxStatus::Valid), 2);
        assert_eq!(state.cnt, 2);
    }

    #[test]
    fn test_conviction_advances_epoch_and_clears_responses() {
        let config = ConsensusConfig::default();
        let mut state = TxState::new(test_tx(), TxStatus::Valid, true);

        // Crossings fire on responses 3 through 6; the fourth crossing
        // pushes cnt past the conviction threshold and advances.
        feed(&mut state, TxStatus::Valid, 6, &config);
        assert_eq!(state.epoch(), 1);
        assert!(state.responses.is_empty());
        assert_eq!(state.cnt, 4);
        assert!(!state.is_final(&config));
    }

    #[test]
    fn test_three_advances_finalize() {
        let config = ConsensusConfig::default();
        let mut state = TxState::new(test_tx(), TxStatus::Valid, true);

        // First epoch needs six unanimous responses; conviction carries
        // over, so later epochs advance on their first crossing.
        feed(&mut state, TxStatus::Valid, 6, &config);
        assert_eq!(state.epoch(), 1);
        feed(&mut state, TxStatus::Valid, 2, &config);
        assert_eq!(state.on_response(TxStatus::Valid, &config), StepOutcome::Continue);
        assert_eq!(state.epoch(), 2);
        feed(&mut state, TxStatus::Valid, 2, &config);
        assert_eq!(
            state.on_response(TxStatus::Valid, &config),
            StepOutcome::Finalized(TxStatus::Valid)
        );
        assert_eq!(state.epoch(), 3);
        assert!(state.is_final(&config));
        assert_eq!(state.status(), TxStatus::Valid);
    }

    #[test]
    fn test_flip_resets_conviction() {
        let config = ConsensusConfig::default();
        let mut state = TxState::new(test_tx(), TxStatus::Valid, true);

        // Build cnt = 2 for Valid.
        feed(&mut state, TxStatus::Valid, 4, &config);
        assert_eq!(state.cnt, 2);
        assert_eq!(state.last_status, TxStatus::Valid);

        // Two Invalid responses are below quorum in this epoch.
        feed(&mut state, TxStatus::Invalid, 2, &config);
        assert_eq!(state.confidence(TxStatus::Invalid), 0);
        assert_eq!(state.cnt, 2);

        // The third crosses for Invalid: confidence bumps, but it does not
        // beat Valid's confidence, so the preference holds while the flip
        // resets conviction.
        assert_eq!(state.on_response(TxStatus::Invalid, &config), StepOutcome::Continue);
        assert_eq!(state.confidence(TxStatus::Invalid), 1);
        assert_eq!(state.status(), TxStatus::Valid);
        assert_eq!(state.last_status, TxStatus::Invalid);
        assert_eq!(state.cnt, 0);
    }

    #[test]
    fn test_preference_switches_when_confidence_overtakes() {
        let config = ConsensusConfig::default();
        let mut state = TxState::new(test_tx(), TxStatus::Valid, true);

        // Valid confidence reaches 2, then Invalid keeps crossing.
        feed(&mut state, TxStatus::Valid, 4, &config);
        assert_eq!(state.confidence(TxStatus::Valid), 2);

        feed(&mut state, TxStatus::Invalid, 4, &config);
        assert_eq!(state.confidence(TxStatus::Invalid), 2);
        assert_eq!(state.status(), TxStatus::Valid);

        // Fifth Invalid crossing overtakes Valid and flips the preference.
        assert_eq!(state.on_response(TxStatus::Invalid, &config), StepOutcome::Continue);
        assert_eq!(state.confidence(TxStatus::Invalid), 3);
        assert_eq!(state.status(), TxStatus::Invalid);
        assert_eq!(state.last_status, TxStatus::Invalid);
    }

    #[test]
    fn test_duplicate_responses_accumulate() {
        let config = ConsensusConfig::default();
        let mut state = TxState::new(test_tx(), TxStatus::Valid, true);

        // Replayed responses are indistinguishable from fresh ones and
        // simply accumulate in the epoch's tally.
        feed(&mut state, TxStatus::Valid, 3, &config);
        assert_eq!(state.responses.len(), 3);
        assert_eq!(state.confidence(TxStatus::Valid), 1);
        assert!(state.status() == TxStatus::Valid);
    }
}
