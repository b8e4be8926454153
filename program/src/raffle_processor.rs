use crate::raffle_error::RaffleError;
use crate::raffle_instruction::{LotteryParams, RaffleInstruction};
use crate::raffle_state::{Config, Lottery, LOTTERY_SEED};
use crate::utils::{find_lottery_address, LamportPayout, SysvarClock, TimeSource};
use crate::vrf::OracleLogRequester;

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{rent::Rent, Sysvar},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeLottery(params) => {
                msg!("Instruction: Initialize Lottery");
                Self::process_initialize_lottery(accounts, params, program_id)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep { .. } => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            RaffleInstruction::PerformUpkeep { .. } => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, program_id)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
        }
    }

    /// Log a lottery error before it is flattened into a program error code
    fn report(error: RaffleError) -> ProgramError {
        msg!("Error: {}", error);
        error.into()
    }

    /// Load the lottery from an account owned by this program
    fn load_lottery(lottery_info: &AccountInfo, program_id: &Pubkey) -> Result<Lottery, ProgramError> {
        if lottery_info.owner != program_id {
            msg!("Lottery account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let lottery = Lottery::unpack(&lottery_info.data.borrow())?;
        Ok(lottery)
    }

    /// Process the InitializeLottery instruction
    ///
    /// Creates the lottery PDA sized for `max_players` entries and opens the first round
    fn process_initialize_lottery(
        accounts: &[AccountInfo],
        params: LotteryParams,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let vrf_coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !authority_info.is_signer {
            msg!("Authority must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_lottery, bump_seed) = find_lottery_address(program_id, authority_info.key);
        if *lottery_info.key != expected_lottery {
            msg!("Invalid lottery account address");
            return Err(ProgramError::InvalidArgument);
        }

        let config = Config {
            authority: *authority_info.key,
            vrf_coordinator: *vrf_coordinator_info.key,
            entrance_fee: params.entrance_fee,
            interval: params.interval,
            callback_gas_limit: params.callback_gas_limit,
            gas_lane: params.gas_lane,
            subscription_id: params.subscription_id,
            max_players: params.max_players,
        };
        config.validate().map_err(Self::report)?;

        if lottery_info.owner == program_id {
            if Lottery::is_initialized_data(&lottery_info.data.borrow()) {
                return Err(Self::report(RaffleError::AlreadyInitialized));
            }
        } else {
            Self::create_lottery_account(
                authority_info,
                lottery_info,
                system_program_info,
                Lottery::space(config.max_players),
                &[LOTTERY_SEED, authority_info.key.as_ref(), &[bump_seed]],
                program_id,
            )?;
        }

        let clock = SysvarClock::get()?;
        let lottery = Lottery::new(config, bump_seed, clock.unix_timestamp());
        lottery.pack(&mut lottery_info.data.borrow_mut())?;

        msg!(
            "Lottery initialized: EntranceFee={}, Interval={}s, Coordinator={}, MaxPlayers={}",
            config.entrance_fee,
            config.interval,
            config.vrf_coordinator,
            config.max_players
        );
        Ok(())
    }

    /// Create the lottery PDA, also when someone already sent lamports to its address
    fn create_lottery_account<'a>(
        payer_info: &AccountInfo<'a>,
        lottery_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        space: usize,
        seeds: &[&[u8]],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let rent_lamports = Rent::get()?.minimum_balance(space);
        msg!("Creating lottery account with {} bytes", space);

        if lottery_info.lamports() == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    lottery_info.key,
                    rent_lamports,
                    space as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    lottery_info.clone(),
                    system_program_info.clone(),
                ],
                &[seeds],
            );
        }

        // Pre-funded address: create_account would fail, so top up and claim it
        let shortfall = rent_lamports.saturating_sub(lottery_info.lamports());
        if shortfall > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, lottery_info.key, shortfall),
                &[
                    payer_info.clone(),
                    lottery_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(lottery_info.key, space as u64),
            &[lottery_info.clone(), system_program_info.clone()],
            &[seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(lottery_info.key, program_id),
            &[lottery_info.clone(), system_program_info.clone()],
            &[seeds],
        )
    }

    fn process_enter_raffle(
        accounts: &[AccountInfo],
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut lottery = Self::load_lottery(lottery_info, program_id)?;
        let event = lottery
            .enter(*player_info.key, amount)
            .map_err(Self::report)?;

        invoke(
            &system_instruction::transfer(player_info.key, lottery_info.key, amount),
            &[
                player_info.clone(),
                lottery_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        lottery.pack(&mut lottery_info.data.borrow_mut())?;
        event.emit()
    }

    /// Process CheckUpkeep instruction
    ///
    /// Read-only: the answer is returned as `[upkeep_needed, time_passed, is_open, has_balance, has_players]`
    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let lottery_info = next_account_info(account_info_iter)?;

        let lottery = Self::load_lottery(lottery_info, program_id)?;
        let check = lottery.check_upkeep(&SysvarClock::get()?);

        msg!("Upkeep needed: {} ({})", check.upkeep_needed(), check);
        set_return_data(&check.to_return_data());
        Ok(())
    }

    /// Process PerformUpkeep instruction - step 1 of the draw
    ///
    /// Re-checks the upkeep conditions, closes the round and requests randomness
    fn process_perform_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let lottery_info = next_account_info(account_info_iter)?;

        if !lottery_info.is_writable {
            msg!("Lottery account must be writable");
            return Err(ProgramError::InvalidArgument);
        }

        let mut lottery = Self::load_lottery(lottery_info, program_id)?;
        let clock = SysvarClock::get()?;
        let mut requester = OracleLogRequester::new(lottery_info.key, lottery.last_request_id());

        let event = lottery
            .perform_upkeep(&clock, &mut requester)
            .map_err(Self::report)?;

        lottery.pack(&mut lottery_info.data.borrow_mut())?;
        event.emit()
    }

    /// Process FulfillRandomWords instruction - step 2 of the draw
    ///
    /// Only the configured oracle coordinator may deliver the random words
    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut lottery = Self::load_lottery(lottery_info, program_id)?;

        if !coordinator_info.is_signer || coordinator_info.key != lottery.vrf_coordinator() {
            return Err(Self::report(RaffleError::OnlyCoordinatorCanFulfill));
        }

        let clock = SysvarClock::get()?;
        let mut payout = LamportPayout::new(lottery_info, winner_info, Rent::get()?);

        let event = lottery
            .fulfill_random_words(request_id, random_words, &clock, &mut payout)
            .map_err(Self::report)?;

        lottery.pack(&mut lottery_info.data.borrow_mut())?;
        event.emit()
    }
}
