use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    entrypoint::ProgramResult,
    log::sol_log_data,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};

/// Notifications published by the lottery
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    /// A participant joined the current round
    RaffleEnter { player: Pubkey, amount: u64 },
    /// The round closed and randomness was requested
    RequestedRaffleWinner { request_id: u64 },
    /// Randomness arrived and the pool was paid out
    WinnerPicked {
        winner: Pubkey,
        amount: u64,
        request_id: u64,
        round: u64,
    },
}

impl RaffleEvent {
    /// Write the event to the program log, readable and borsh-encoded
    pub fn emit(&self) -> ProgramResult {
        match self {
            RaffleEvent::RaffleEnter { player, amount } => {
                msg!("RaffleEnter: player={}, amount={}", player, amount)
            }
            RaffleEvent::RequestedRaffleWinner { request_id } => {
                msg!("RequestedRaffleWinner: request_id={}", request_id)
            }
            RaffleEvent::WinnerPicked {
                winner,
                amount,
                request_id,
                round,
            } => msg!(
                "WinnerPicked: winner={}, amount={}, request_id={}, round={}",
                winner,
                amount,
                request_id,
                round
            ),
        }
        let data = self
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        sol_log_data(&[data.as_slice()]);
        Ok(())
    }
}
