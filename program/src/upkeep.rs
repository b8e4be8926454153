use solana_program::clock::UnixTimestamp;
use std::fmt;

use crate::raffle_state::{EntryLedger, RoundStateMachine};

/// The four conditions that must all hold before a round may be closed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpkeepCheck {
    /// At least `interval` seconds have elapsed since the round started
    pub time_passed: bool,
    /// The round is accepting entries
    pub is_open: bool,
    /// The pool holds a non-zero balance
    pub has_balance: bool,
    /// At least one participant entered
    pub has_players: bool,
}

impl UpkeepCheck {
    /// Evaluate the upkeep predicate at `now`. Never fails and never mutates.
    pub fn evaluate(
        round: &RoundStateMachine,
        ledger: &EntryLedger,
        interval: u64,
        now: UnixTimestamp,
    ) -> Self {
        let elapsed = now.saturating_sub(round.last_timestamp());
        Self {
            time_passed: elapsed >= 0 && elapsed as u64 >= interval,
            is_open: round.state().is_open(),
            has_balance: ledger.pool_balance() > 0,
            has_players: !ledger.is_empty(),
        }
    }

    pub fn upkeep_needed(&self) -> bool {
        self.time_passed && self.is_open && self.has_balance && self.has_players
    }

    /// Layout returned by the CheckUpkeep instruction
    pub fn to_return_data(&self) -> [u8; 5] {
        [
            self.upkeep_needed() as u8,
            self.time_passed as u8,
            self.is_open as u8,
            self.has_balance as u8,
            self.has_players as u8,
        ]
    }
}

impl fmt::Display for UpkeepCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time_passed={} is_open={} has_balance={} has_players={}",
            self.time_passed, self.is_open, self.has_balance, self.has_players
        )
    }
}
