//! Round lifecycle of the lottery: entries, upkeep and randomness fulfillment.
//!
//! Every operation either completes or returns an error without touching the
//! lottery. Closing the round happens before the randomness request goes out,
//! and the ledger is only reset after the payout succeeded.
use solana_program::{msg, pubkey::Pubkey};

use crate::{
    raffle_error::RaffleError,
    raffle_event::RaffleEvent,
    raffle_state::{Lottery, NUM_WORDS, REQUEST_CONFIRMATIONS},
    upkeep::UpkeepCheck,
    utils::{FundsTransfer, TimeSource},
    vrf::{self, RandomnessRequest, RandomnessRequester},
};

impl Lottery {
    /// Add `player` to the current round with a stake of `amount` lamports.
    pub fn enter(&mut self, player: Pubkey, amount: u64) -> Result<RaffleEvent, RaffleError> {
        if amount < self.config.entrance_fee {
            return Err(RaffleError::InsufficientStake);
        }
        if !self.round.state().is_open() {
            return Err(RaffleError::RoundNotOpen);
        }
        if self.ledger.len() >= self.config.max_players as usize {
            return Err(RaffleError::LotteryFull);
        }
        self.ledger.record(player, amount)?;
        Ok(RaffleEvent::RaffleEnter { player, amount })
    }

    /// Whether the automation network should call `perform_upkeep` now.
    pub fn check_upkeep(&self, clock: &impl TimeSource) -> UpkeepCheck {
        UpkeepCheck::evaluate(
            &self.round,
            &self.ledger,
            self.config.interval,
            clock.unix_timestamp(),
        )
    }

    /// Close the round and request randomness for the draw.
    pub fn perform_upkeep(
        &mut self,
        clock: &impl TimeSource,
        requester: &mut impl RandomnessRequester,
    ) -> Result<RaffleEvent, RaffleError> {
        let check = self.check_upkeep(clock);
        if !check.upkeep_needed() {
            return Err(RaffleError::UpkeepConditionsNotMet(check));
        }

        self.round.close()?;

        let request = RandomnessRequest {
            gas_lane: self.config.gas_lane,
            subscription_id: self.config.subscription_id,
            request_confirmations: REQUEST_CONFIRMATIONS,
            callback_gas_limit: self.config.callback_gas_limit,
            num_words: NUM_WORDS,
        };
        let request_id = match requester.request_random_words(&request) {
            Ok(request_id) => request_id,
            Err(e) => {
                msg!("Randomness request failed: {}", e);
                self.round.abort_close();
                return Err(RaffleError::RandomnessRequestFailed);
            }
        };

        self.pending_request = Some(request_id);
        self.last_request_id = request_id;
        Ok(RaffleEvent::RequestedRaffleWinner { request_id })
    }

    /// Settle the round with the oracle's answer to `request_id`.
    ///
    /// The caller must already have checked that the oracle coordinator
    /// signed the delivery.
    pub fn fulfill_random_words(
        &mut self,
        request_id: u64,
        random_words: &[u64],
        clock: &impl TimeSource,
        payout: &mut impl FundsTransfer,
    ) -> Result<RaffleEvent, RaffleError> {
        if self.pending_request != Some(request_id) {
            msg!(
                "Fulfillment for request {} does not match pending request {:?}",
                request_id,
                self.pending_request
            );
            return Err(RaffleError::UnknownRequest);
        }
        let random_word = *random_words.first().ok_or(RaffleError::MissingRandomWords)?;

        let winner = vrf::winner_index(random_word, self.ledger.len())
            .and_then(|index| self.ledger.player(index))
            .copied()
            .ok_or(RaffleError::NoEntrants)?;
        let amount = self.ledger.pool_balance();

        if let Err(e) = payout.transfer(&winner, amount) {
            msg!("Payout of {} lamports to {} failed: {}", amount, winner, e);
            return Err(RaffleError::FundTransferFailed);
        }

        let round = self.rounds_completed.saturating_add(1);
        self.recent_winner = Some(winner);
        self.pending_request = None;
        self.ledger.reset();
        self.round.reopen(clock.unix_timestamp());
        self.rounds_completed = round;

        Ok(RaffleEvent::WinnerPicked {
            winner,
            amount,
            request_id,
            round,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raffle_state::{Config, RaffleState};
    use solana_program::{entrypoint::ProgramResult, program_error::ProgramError};

    const FEE: u64 = 100;
    const INTERVAL: u64 = 30;
    const START: i64 = 1_700_000_000;

    struct FixedClock(i64);

    impl TimeSource for FixedClock {
        fn unix_timestamp(&self) -> i64 {
            self.0
        }
    }

    /// Mock oracle handing out ids 1, 2, 3, ...
    #[derive(Default)]
    struct MockOracle {
        next_id: u64,
        requests: Vec<RandomnessRequest>,
        fail: bool,
    }

    impl RandomnessRequester for MockOracle {
        fn request_random_words(
            &mut self,
            request: &RandomnessRequest,
        ) -> Result<u64, ProgramError> {
            if self.fail {
                return Err(ProgramError::InsufficientFunds);
            }
            self.next_id += 1;
            self.requests.push(request.clone());
            Ok(self.next_id)
        }
    }

    #[derive(Default)]
    struct MockBank {
        paid: Vec<(Pubkey, u64)>,
        fail: bool,
    }

    impl FundsTransfer for MockBank {
        fn transfer(&mut self, to: &Pubkey, amount: u64) -> ProgramResult {
            if self.fail {
                return Err(ProgramError::InvalidArgument);
            }
            self.paid.push((*to, amount));
            Ok(())
        }
    }

    fn lottery() -> Lottery {
        let config = Config {
            authority: Pubkey::new_unique(),
            vrf_coordinator: Pubkey::new_unique(),
            entrance_fee: FEE,
            interval: INTERVAL,
            callback_gas_limit: 500_000,
            gas_lane: [3u8; 32],
            subscription_id: 77,
            max_players: 16,
        };
        Lottery::new(config, 255, START)
    }

    fn after_interval() -> FixedClock {
        FixedClock(START + INTERVAL as i64 + 1)
    }

    /// Lottery with `n` entrants, closed, waiting on request 1
    fn calculating_with(n: usize) -> (Lottery, Vec<Pubkey>) {
        let mut lottery = lottery();
        let players: Vec<Pubkey> = (0..n).map(|_| Pubkey::new_unique()).collect();
        for player in &players {
            lottery.enter(*player, FEE).unwrap();
        }
        lottery
            .perform_upkeep(&after_interval(), &mut MockOracle::default())
            .unwrap();
        (lottery, players)
    }

    #[test]
    fn enter_below_fee_is_rejected() {
        let mut lottery = lottery();
        assert_eq!(
            lottery.enter(Pubkey::new_unique(), FEE - 1),
            Err(RaffleError::InsufficientStake)
        );
        assert_eq!(lottery.number_of_players(), 0);
        assert_eq!(lottery.pool_balance(), 0);
    }

    #[test]
    fn enter_records_player_and_stake() {
        let mut lottery = lottery();
        let player = Pubkey::new_unique();
        let event = lottery.enter(player, FEE + 25).unwrap();

        assert_eq!(event, RaffleEvent::RaffleEnter { player, amount: FEE + 25 });
        assert_eq!(lottery.number_of_players(), 1);
        assert_eq!(lottery.player(0), Some(&player));
        assert_eq!(lottery.pool_balance(), FEE + 25);
    }

    #[test]
    fn same_player_may_enter_twice() {
        let mut lottery = lottery();
        let player = Pubkey::new_unique();
        lottery.enter(player, FEE).unwrap();
        lottery.enter(player, FEE).unwrap();
        assert_eq!(lottery.players(), &[player, player]);
        assert_eq!(lottery.pool_balance(), 2 * FEE);
    }

    #[test]
    fn enter_while_calculating_is_rejected() {
        let (mut lottery, _) = calculating_with(1);
        let before = lottery.clone();
        assert_eq!(
            lottery.enter(Pubkey::new_unique(), FEE),
            Err(RaffleError::RoundNotOpen)
        );
        assert_eq!(lottery, before);
    }

    #[test]
    fn enter_beyond_capacity_is_rejected() {
        let mut lottery = lottery();
        for _ in 0..16 {
            lottery.enter(Pubkey::new_unique(), FEE).unwrap();
        }
        assert_eq!(
            lottery.enter(Pubkey::new_unique(), FEE),
            Err(RaffleError::LotteryFull)
        );
        assert_eq!(lottery.number_of_players(), 16);
    }

    #[test]
    fn check_upkeep_does_not_mutate() {
        let mut lottery = lottery();
        lottery.enter(Pubkey::new_unique(), FEE).unwrap();
        let before = lottery.clone();
        assert!(lottery.check_upkeep(&after_interval()).upkeep_needed());
        assert!(!lottery.check_upkeep(&FixedClock(START)).upkeep_needed());
        assert_eq!(lottery, before);
    }

    #[test]
    fn perform_upkeep_without_players_fails() {
        let mut lottery = lottery();
        let result = lottery.perform_upkeep(&after_interval(), &mut MockOracle::default());

        match result {
            Err(RaffleError::UpkeepConditionsNotMet(check)) => {
                assert!(check.time_passed);
                assert!(check.is_open);
                assert!(!check.has_players);
                assert!(!check.has_balance);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(lottery.state(), RaffleState::Open);
        assert_eq!(lottery.pending_request(), None);
    }

    #[test]
    fn perform_upkeep_before_interval_fails() {
        let mut lottery = lottery();
        lottery.enter(Pubkey::new_unique(), FEE).unwrap();
        let mut oracle = MockOracle::default();
        let result = lottery.perform_upkeep(&FixedClock(START + 1), &mut oracle);

        assert!(matches!(result, Err(RaffleError::UpkeepConditionsNotMet(c)) if !c.time_passed));
        assert!(oracle.requests.is_empty());
        assert_eq!(lottery.state(), RaffleState::Open);
    }

    #[test]
    fn perform_upkeep_closes_round_and_requests_randomness() {
        let mut lottery = lottery();
        lottery.enter(Pubkey::new_unique(), FEE).unwrap();
        let mut oracle = MockOracle::default();

        let event = lottery.perform_upkeep(&after_interval(), &mut oracle).unwrap();

        assert_eq!(event, RaffleEvent::RequestedRaffleWinner { request_id: 1 });
        assert_eq!(lottery.state(), RaffleState::Calculating);
        assert_eq!(lottery.pending_request(), Some(1));
        assert_eq!(
            oracle.requests,
            vec![RandomnessRequest {
                gas_lane: [3u8; 32],
                subscription_id: 77,
                request_confirmations: REQUEST_CONFIRMATIONS,
                callback_gas_limit: 500_000,
                num_words: 1,
            }]
        );
    }

    #[test]
    fn second_upkeep_is_rejected_while_calculating() {
        let (mut lottery, _) = calculating_with(2);
        let mut oracle = MockOracle::default();
        let result = lottery.perform_upkeep(&after_interval(), &mut oracle);

        assert!(matches!(result, Err(RaffleError::UpkeepConditionsNotMet(c)) if !c.is_open));
        assert!(oracle.requests.is_empty());
        assert_eq!(lottery.pending_request(), Some(1));
    }

    #[test]
    fn failed_request_leaves_round_open() {
        let mut lottery = lottery();
        lottery.enter(Pubkey::new_unique(), FEE).unwrap();
        let before = lottery.clone();
        let mut oracle = MockOracle {
            fail: true,
            ..MockOracle::default()
        };

        assert_eq!(
            lottery.perform_upkeep(&after_interval(), &mut oracle),
            Err(RaffleError::RandomnessRequestFailed)
        );
        assert_eq!(lottery, before);
    }

    #[test]
    fn single_entrant_wins_the_pool() {
        let (mut lottery, players) = calculating_with(1);
        let mut bank = MockBank::default();
        let now = FixedClock(START + 100);

        let event = lottery.fulfill_random_words(1, &[7], &now, &mut bank).unwrap();

        assert_eq!(
            event,
            RaffleEvent::WinnerPicked {
                winner: players[0],
                amount: 100,
                request_id: 1,
                round: 1,
            }
        );
        assert_eq!(bank.paid, vec![(players[0], 100)]);
        assert_eq!(lottery.recent_winner(), Some(&players[0]));
        assert_eq!(lottery.state(), RaffleState::Open);
        assert_eq!(lottery.number_of_players(), 0);
        assert_eq!(lottery.pool_balance(), 0);
        assert_eq!(lottery.pending_request(), None);
        assert_eq!(lottery.last_timestamp(), START + 100);
        assert_eq!(lottery.rounds_completed(), 1);
    }

    #[test]
    fn winner_is_picked_by_modulo_of_random_word() {
        let (mut lottery, players) = calculating_with(4);
        let mut bank = MockBank::default();

        lottery
            .fulfill_random_words(1, &[42], &FixedClock(START + 100), &mut bank)
            .unwrap();

        assert_eq!(bank.paid, vec![(players[2], 400)]);
        assert_eq!(lottery.recent_winner(), Some(&players[2]));
    }

    #[test]
    fn fulfill_with_wrong_id_is_rejected() {
        let (mut lottery, _) = calculating_with(3);
        let before = lottery.clone();
        let mut bank = MockBank::default();

        assert_eq!(
            lottery.fulfill_random_words(2, &[5], &FixedClock(START + 100), &mut bank),
            Err(RaffleError::UnknownRequest)
        );
        assert!(bank.paid.is_empty());
        assert_eq!(lottery, before);
    }

    #[test]
    fn fulfill_without_pending_request_is_rejected() {
        let mut lottery = lottery();
        lottery.enter(Pubkey::new_unique(), FEE).unwrap();
        let mut bank = MockBank::default();

        assert_eq!(
            lottery.fulfill_random_words(0, &[5], &FixedClock(START + 100), &mut bank),
            Err(RaffleError::UnknownRequest)
        );
        assert!(bank.paid.is_empty());
    }

    #[test]
    fn replayed_fulfillment_is_rejected() {
        let (mut lottery, _) = calculating_with(2);
        let mut bank = MockBank::default();
        let now = FixedClock(START + 100);

        lottery.fulfill_random_words(1, &[9], &now, &mut bank).unwrap();
        assert_eq!(
            lottery.fulfill_random_words(1, &[9], &now, &mut bank),
            Err(RaffleError::UnknownRequest)
        );
        assert_eq!(bank.paid.len(), 1);
    }

    #[test]
    fn stale_id_from_earlier_round_is_rejected() {
        let (mut lottery, _) = calculating_with(1);
        let mut oracle = MockOracle {
            next_id: 1,
            ..MockOracle::default()
        };
        let mut bank = MockBank::default();
        lottery
            .fulfill_random_words(1, &[0], &FixedClock(START + 100), &mut bank)
            .unwrap();

        lottery.enter(Pubkey::new_unique(), FEE).unwrap();
        lottery
            .perform_upkeep(&FixedClock(START + 200), &mut oracle)
            .unwrap();
        assert_eq!(lottery.pending_request(), Some(2));

        assert_eq!(
            lottery.fulfill_random_words(1, &[0], &FixedClock(START + 300), &mut bank),
            Err(RaffleError::UnknownRequest)
        );
        assert_eq!(lottery.state(), RaffleState::Calculating);
    }

    #[test]
    fn empty_random_words_are_rejected() {
        let (mut lottery, _) = calculating_with(1);
        let before = lottery.clone();
        assert_eq!(
            lottery.fulfill_random_words(1, &[], &FixedClock(START + 100), &mut MockBank::default()),
            Err(RaffleError::MissingRandomWords)
        );
        assert_eq!(lottery, before);
    }

    #[test]
    fn closed_round_without_entrants_pays_nobody() {
        let mut lottery = lottery();
        lottery.round.close().unwrap();
        lottery.pending_request = Some(1);
        let before = lottery.clone();
        let mut bank = MockBank::default();

        assert_eq!(
            lottery.fulfill_random_words(1, &[7], &FixedClock(START + 100), &mut bank),
            Err(RaffleError::NoEntrants)
        );
        assert!(bank.paid.is_empty());
        assert_eq!(lottery, before);
    }

    #[test]
    fn failed_payout_keeps_round_calculating() {
        let (mut lottery, _) = calculating_with(2);
        let before = lottery.clone();
        let mut bank = MockBank {
            fail: true,
            ..MockBank::default()
        };

        assert_eq!(
            lottery.fulfill_random_words(1, &[1], &FixedClock(START + 100), &mut bank),
            Err(RaffleError::FundTransferFailed)
        );
        assert_eq!(lottery, before);
        assert_eq!(lottery.state(), RaffleState::Calculating);
        assert_eq!(lottery.pending_request(), Some(1));
    }

    #[test]
    fn next_round_starts_after_payout() {
        let (mut lottery, _) = calculating_with(2);
        let previous_start = lottery.last_timestamp();
        let mut bank = MockBank::default();
        let now = FixedClock(START + INTERVAL as i64 + 5);

        lottery.fulfill_random_words(1, &[3], &now, &mut bank).unwrap();
        assert!(lottery.last_timestamp() > previous_start);

        let newcomer = Pubkey::new_unique();
        lottery.enter(newcomer, FEE).unwrap();
        assert_eq!(lottery.players(), &[newcomer]);
        assert!(!lottery.check_upkeep(&now).upkeep_needed());
    }
}
