// Upkeep raffle - clock, payout and address helpers
use solana_program::{
    account_info::AccountInfo,
    clock::{Clock, UnixTimestamp},
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    sysvar::Sysvar,
};

use crate::{raffle_error::RaffleError, raffle_state::LOTTERY_SEED};

/// Source of the current unix time
pub trait TimeSource {
    fn unix_timestamp(&self) -> UnixTimestamp;
}

/// Clock sysvar snapshot taken once per instruction
pub struct SysvarClock {
    unix_timestamp: UnixTimestamp,
}

impl SysvarClock {
    pub fn get() -> Result<Self, ProgramError> {
        let clock = Clock::get()?;
        Ok(Self {
            unix_timestamp: clock.unix_timestamp,
        })
    }
}

impl TimeSource for SysvarClock {
    fn unix_timestamp(&self) -> UnixTimestamp {
        self.unix_timestamp
    }
}

/// Capability to move pool funds to a recipient
pub trait FundsTransfer {
    fn transfer(&mut self, to: &Pubkey, amount: u64) -> ProgramResult;
}

/// Pays out of the program-owned lottery account by moving lamports directly.
pub struct LamportPayout<'a, 'b> {
    from: &'a AccountInfo<'b>,
    recipient: &'a AccountInfo<'b>,
    rent: Rent,
}

impl<'a, 'b> LamportPayout<'a, 'b> {
    pub fn new(from: &'a AccountInfo<'b>, recipient: &'a AccountInfo<'b>, rent: Rent) -> Self {
        Self {
            from,
            recipient,
            rent,
        }
    }
}

impl FundsTransfer for LamportPayout<'_, '_> {
    fn transfer(&mut self, to: &Pubkey, amount: u64) -> ProgramResult {
        if self.recipient.key != to {
            msg!("Recipient {} is not the selected winner {}", self.recipient.key, to);
            return Err(ProgramError::InvalidArgument);
        }
        if !self.recipient.is_writable || !self.from.is_writable {
            msg!("Payout accounts must be writable");
            return Err(ProgramError::InvalidArgument);
        }

        let floor = self.rent.minimum_balance(self.from.data_len());
        let remaining = self
            .from
            .lamports()
            .checked_sub(amount)
            .ok_or(ProgramError::InsufficientFunds)?;
        if remaining < floor {
            msg!("Payout would leave the lottery below rent exemption");
            return Err(ProgramError::InsufficientFunds);
        }
        let credited = self
            .recipient
            .lamports()
            .checked_add(amount)
            .ok_or(RaffleError::MathOverflow)?;

        **self.from.try_borrow_mut_lamports()? = remaining;
        **self.recipient.try_borrow_mut_lamports()? = credited;
        Ok(())
    }
}

/// Find the program derived address of the lottery created by `authority`
pub fn find_lottery_address(program_id: &Pubkey, authority: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[LOTTERY_SEED, authority.as_ref()], program_id)
}
