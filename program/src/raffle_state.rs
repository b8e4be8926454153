use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
};

use crate::raffle_error::RaffleError;

/// Seed prefix of the lottery PDA
pub const LOTTERY_SEED: &[u8] = b"lottery";
/// Random words requested per round
pub const NUM_WORDS: u32 = 1;
/// Block confirmations the oracle waits for before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;

/// Round state
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Closed, waiting for the oracle to deliver randomness
    Calculating,
}

impl RaffleState {
    pub fn is_open(&self) -> bool {
        *self == RaffleState::Open
    }
}

/// Immutable configuration, set once when the lottery is initialized
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Account that created the lottery (part of the PDA seeds)
    pub authority: Pubkey,
    /// Only signer allowed to deliver random words
    pub vrf_coordinator: Pubkey,
    /// Minimum stake in lamports
    pub entrance_fee: u64,
    /// Minimum seconds between rounds
    pub interval: u64,
    /// Compute budget the oracle should reserve for the fulfillment
    pub callback_gas_limit: u32,
    /// Oracle key hash selecting the randomness lane
    pub gas_lane: [u8; 32],
    /// Oracle subscription paying for requests
    pub subscription_id: u64,
    /// Entries the account was sized for
    pub max_players: u32,
}

impl Config {
    pub const LEN: usize = 32 + 32 + 8 + 8 + 4 + 32 + 8 + 4;

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0
            || self.interval == 0
            || self.interval > i64::MAX as u64
            || self.max_players == 0
        {
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}

/// Read-only view of the entry ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot<'a> {
    pub players: &'a [Pubkey],
    pub pool_balance: u64,
}

/// Current-round participants and the accumulated pool
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryLedger {
    players: Vec<Pubkey>,
    pool_balance: u64,
}

impl EntryLedger {
    pub fn snapshot(&self) -> LedgerSnapshot<'_> {
        LedgerSnapshot {
            players: &self.players,
            pool_balance: self.pool_balance,
        }
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.players.get(index)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn pool_balance(&self) -> u64 {
        self.pool_balance
    }

    /// Append a paid entry. The caller has already checked fee and round state.
    pub(crate) fn record(&mut self, player: Pubkey, amount: u64) -> Result<(), RaffleError> {
        let pool_balance = self
            .pool_balance
            .checked_add(amount)
            .ok_or(RaffleError::MathOverflow)?;
        self.players.push(player);
        self.pool_balance = pool_balance;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.players.clear();
        self.pool_balance = 0;
    }
}

/// OPEN/CALCULATING state and the round start timestamp
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundStateMachine {
    state: RaffleState,
    last_timestamp: UnixTimestamp,
}

impl RoundStateMachine {
    pub fn new(start: UnixTimestamp) -> Self {
        Self {
            state: RaffleState::Open,
            last_timestamp: start,
        }
    }

    pub fn state(&self) -> RaffleState {
        self.state
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }

    /// OPEN -> CALCULATING
    pub(crate) fn close(&mut self) -> Result<(), RaffleError> {
        if self.state != RaffleState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        self.state = RaffleState::Calculating;
        Ok(())
    }

    /// Undo a close whose randomness request never went out
    pub(crate) fn abort_close(&mut self) {
        self.state = RaffleState::Open;
    }

    /// CALCULATING -> OPEN, starting the next round at `now`
    pub(crate) fn reopen(&mut self, now: UnixTimestamp) {
        debug_assert_eq!(self.state, RaffleState::Calculating);
        self.state = RaffleState::Open;
        self.last_timestamp = now;
    }
}

/// Lottery account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Lottery {
    pub(crate) is_initialized: bool,
    pub(crate) bump: u8,
    pub(crate) config: Config,
    pub(crate) round: RoundStateMachine,
    pub(crate) ledger: EntryLedger,
    /// Request id the next fulfillment must carry
    pub(crate) pending_request: Option<u64>,
    /// Id of the most recent randomness request, zero before the first
    pub(crate) last_request_id: u64,
    pub(crate) recent_winner: Option<Pubkey>,
    pub(crate) rounds_completed: u64,
}

impl IsInitialized for Lottery {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Lottery {
    /// Serialized size with an empty player list and every option populated
    pub const BASE_LEN: usize = 1 // is_initialized
        + 1 // bump
        + Config::LEN
        + 1 + 8 // round
        + 4 + 8 // ledger without players
        + 1 + 8 // pending_request
        + 8 // last_request_id
        + 1 + 32 // recent_winner
        + 8; // rounds_completed

    pub fn new(config: Config, bump: u8, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            bump,
            config,
            round: RoundStateMachine::new(now),
            ledger: EntryLedger::default(),
            pending_request: None,
            last_request_id: 0,
            recent_winner: None,
            rounds_completed: 0,
        }
    }

    /// Account size needed to hold `max_players` entries
    pub fn space(max_players: u32) -> usize {
        Self::BASE_LEN + 32 * max_players as usize
    }

    /// True if the raw account data already holds an initialized lottery
    pub fn is_initialized_data(src: &[u8]) -> bool {
        src.first().copied().unwrap_or(0) != 0
    }

    pub fn unpack(src: &[u8]) -> Result<Self, ProgramError> {
        let lottery = Self::deserialize(&mut &src[..])
            .map_err(|_| ProgramError::InvalidAccountData)?;
        if !lottery.is_initialized {
            return Err(RaffleError::NotInitialized.into());
        }
        Ok(lottery)
    }

    pub fn pack(&self, dst: &mut [u8]) -> ProgramResult {
        let data = self
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        if data.len() > dst.len() {
            return Err(ProgramError::AccountDataTooSmall);
        }
        let (head, tail) = dst.split_at_mut(data.len());
        head.copy_from_slice(&data);
        tail.fill(0);
        Ok(())
    }

    pub fn bump(&self) -> u8 {
        self.bump
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn authority(&self) -> &Pubkey {
        &self.config.authority
    }

    pub fn vrf_coordinator(&self) -> &Pubkey {
        &self.config.vrf_coordinator
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn state(&self) -> RaffleState {
        self.round.state()
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.ledger.player(index)
    }

    pub fn players(&self) -> &[Pubkey] {
        self.ledger.snapshot().players
    }

    pub fn number_of_players(&self) -> usize {
        self.ledger.len()
    }

    pub fn pool_balance(&self) -> u64 {
        self.ledger.pool_balance()
    }

    pub fn ledger(&self) -> &EntryLedger {
        &self.ledger
    }

    pub fn round(&self) -> &RoundStateMachine {
        &self.round
    }

    pub fn recent_winner(&self) -> Option<&Pubkey> {
        self.recent_winner.as_ref()
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.round.last_timestamp()
    }

    pub fn pending_request(&self) -> Option<u64> {
        self.pending_request
    }

    pub fn last_request_id(&self) -> u64 {
        self.last_request_id
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }

    pub fn request_confirmations(&self) -> u16 {
        REQUEST_CONFIRMATIONS
    }
}
