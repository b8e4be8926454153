use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

use crate::upkeep::UpkeepCheck;

/// Errors that may be returned by the upkeep raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Entry value below the entrance fee
    #[error("Not enough lamports sent to enter the raffle")]
    InsufficientStake,

    /// Entry attempted while a winner is being calculated
    #[error("Raffle is not open")]
    RoundNotOpen,

    /// performUpkeep called before the round can be closed
    #[error("Upkeep not needed: {0}")]
    UpkeepConditionsNotMet(UpkeepCheck),

    /// Fulfillment does not match the outstanding randomness request
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// Pool payout to the winner could not complete
    #[error("Transfer of the pool to the winner failed")]
    FundTransferFailed,

    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    #[error("Invalid lottery configuration")]
    InvalidConfig,

    #[error("Lottery account already initialized")]
    AlreadyInitialized,

    #[error("Lottery account not initialized")]
    NotInitialized,

    /// Only the configured oracle coordinator may deliver randomness
    #[error("Only the oracle coordinator can fulfill")]
    OnlyCoordinatorCanFulfill,

    #[error("Lottery has reached its maximum number of entries")]
    LotteryFull,

    #[error("No random words supplied")]
    MissingRandomWords,

    /// The randomness request could not be issued
    #[error("Randomness request failed")]
    RandomnessRequestFailed,

    #[error("Arithmetic overflow")]
    MathOverflow,

    /// A closed round was found without any entrant to pay
    #[error("No entrant to select a winner from")]
    NoEntrants,
}

impl RaffleError {
    /// Stable code reported through `ProgramError::Custom`
    pub fn code(&self) -> u32 {
        match self {
            RaffleError::InsufficientStake => 0,
            RaffleError::RoundNotOpen => 1,
            RaffleError::UpkeepConditionsNotMet(_) => 2,
            RaffleError::UnknownRequest => 3,
            RaffleError::FundTransferFailed => 4,
            RaffleError::InvalidInstructionData => 5,
            RaffleError::InvalidConfig => 6,
            RaffleError::AlreadyInitialized => 7,
            RaffleError::NotInitialized => 8,
            RaffleError::OnlyCoordinatorCanFulfill => 9,
            RaffleError::LotteryFull => 10,
            RaffleError::MissingRandomWords => 11,
            RaffleError::RandomnessRequestFailed => 12,
            RaffleError::MathOverflow => 13,
            RaffleError::NoEntrants => 14,
        }
    }
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e.code())
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
