// Verifiable randomness requests for the upkeep raffle
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    log::sol_log_data,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::raffle_error::RaffleError;

/// Log tag the off-chain oracle listens for
pub const RANDOM_WORDS_REQUESTED: &[u8] = b"RandomWordsRequested";

/// Parameters of one randomness request
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Capability to ask an oracle for random words.
///
/// The answer arrives later through a separate fulfillment call carrying the
/// returned request id.
pub trait RandomnessRequester {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError>;
}

/// Publishes requests as program log data for the oracle network.
///
/// Ids are sequential per lottery account, so an id is never handed out twice.
pub struct OracleLogRequester<'a> {
    lottery: &'a Pubkey,
    last_request_id: u64,
}

impl<'a> OracleLogRequester<'a> {
    pub fn new(lottery: &'a Pubkey, last_request_id: u64) -> Self {
        Self {
            lottery,
            last_request_id,
        }
    }
}

impl RandomnessRequester for OracleLogRequester<'_> {
    fn request_random_words(&mut self, request: &RandomnessRequest) -> Result<u64, ProgramError> {
        let request_id = self
            .last_request_id
            .checked_add(1)
            .ok_or(RaffleError::MathOverflow)?;
        let payload = request
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;

        sol_log_data(&[
            RANDOM_WORDS_REQUESTED,
            self.lottery.as_ref(),
            &request_id.to_le_bytes()[..],
            &payload[..],
        ]);
        msg!(
            "Random words requested: id={}, subscription={}, words={}",
            request_id,
            request.subscription_id,
            request.num_words
        );

        self.last_request_id = request_id;
        Ok(request_id)
    }
}

/// Index of the winning entry for a random word, `None` when nobody entered
pub fn winner_index(random_word: u64, participant_count: usize) -> Option<usize> {
    if participant_count == 0 {
        return None;
    }
    Some((random_word % participant_count as u64) as usize)
}
