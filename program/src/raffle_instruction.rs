use arrayref::array_ref;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::mem::size_of;

use crate::{raffle_error::RaffleError, utils::find_lottery_address};

/// Construction parameters of a lottery
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LotteryParams {
    /// Minimum stake in lamports
    pub entrance_fee: u64,
    /// Minimum seconds between rounds
    pub interval: u64,
    /// Compute budget reserved for the oracle's fulfillment
    pub callback_gas_limit: u32,
    /// Oracle key hash
    pub gas_lane: [u8; 32],
    /// Oracle subscription funding the requests
    pub subscription_id: u64,
    /// Entries per round the account is sized for
    pub max_players: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaffleInstruction {
    /// Create and initialize the lottery account
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The authority creating the lottery, pays for the account
    /// 1. `[writable]` The lottery account (PDA of `["lottery", authority]`)
    /// 2. `[]` The oracle coordinator allowed to deliver randomness
    /// 3. `[]` The system program
    InitializeLottery(LotteryParams),

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player paying the stake
    /// 1. `[writable]` The lottery account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Stake in lamports, at least the entrance fee
        amount: u64,
    },

    /// Report whether upkeep is needed through the program return data
    ///
    /// Accounts expected:
    /// 0. `[]` The lottery account
    CheckUpkeep {
        /// Opaque automation payload, ignored
        check_data: Vec<u8>,
    },

    /// Close the round and request randomness (anyone may call)
    ///
    /// Accounts expected:
    /// 0. `[writable]` The lottery account
    PerformUpkeep {
        /// Opaque automation payload, ignored
        perform_data: Vec<u8>,
    },

    /// Deliver random words for the pending request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The oracle coordinator
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The selected winner
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_u64(rest)?;
                let (callback_gas_limit, rest) = Self::unpack_u32(rest)?;
                let (gas_lane, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (subscription_id, rest) = Self::unpack_u64(rest)?;
                let (max_players, _) = Self::unpack_u32(rest)?;
                Self::InitializeLottery(LotteryParams {
                    entrance_fee,
                    interval,
                    callback_gas_limit,
                    gas_lane,
                    subscription_id,
                    max_players,
                })
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => {
                let (check_data, _) = Self::unpack_bytes(rest)?;
                Self::CheckUpkeep { check_data }
            }
            3 => {
                let (perform_data, _) = Self::unpack_bytes(rest)?;
                Self::PerformUpkeep { perform_data }
            }
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = Self::unpack_u32(rest)?;
                if rest.len() / 8 < count as usize {
                    return Err(RaffleError::InvalidInstructionData.into());
                }
                let mut random_words = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (word, tail) = Self::unpack_u64(rest)?;
                    random_words.push(word);
                    rest = tail;
                }
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            _ => return Err(RaffleError::InvalidInstructionData.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::InitializeLottery(params) => {
                buf.push(0);
                buf.extend_from_slice(&params.entrance_fee.to_le_bytes());
                buf.extend_from_slice(&params.interval.to_le_bytes());
                buf.extend_from_slice(&params.callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&params.gas_lane);
                buf.extend_from_slice(&params.subscription_id.to_le_bytes());
                buf.extend_from_slice(&params.max_players.to_le_bytes());
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep { check_data } => {
                buf.push(2);
                Self::pack_bytes(&mut buf, check_data);
            }
            Self::PerformUpkeep { perform_data } => {
                buf.push(3);
                Self::pack_bytes(&mut buf, perform_data);
            }
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
                for word in random_words {
                    buf.extend_from_slice(&word.to_le_bytes());
                }
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        if input.len() < 8 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(8);
        Ok((u64::from_le_bytes(*array_ref![value, 0, 8]), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        if input.len() < 4 {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(4);
        Ok((u32::from_le_bytes(*array_ref![value, 0, 4]), rest))
    }

    fn unpack_fixed_bytes<const N: usize>(input: &[u8]) -> Result<([u8; N], &[u8]), ProgramError> {
        if input.len() < N {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = input.split_at(N);
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(value);
        Ok((bytes, rest))
    }

    fn unpack_bytes(input: &[u8]) -> Result<(Vec<u8>, &[u8]), ProgramError> {
        if input.is_empty() {
            return Ok((Vec::new(), input));
        }
        let (len, rest) = Self::unpack_u32(input)?;
        if rest.len() < len as usize {
            return Err(RaffleError::InvalidInstructionData.into());
        }
        let (value, rest) = rest.split_at(len as usize);
        Ok((value.to_vec(), rest))
    }

    fn pack_bytes(buf: &mut Vec<u8>, data: &[u8]) {
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);
    }
}

/// Create initialize_lottery instruction
pub fn initialize_lottery(
    program_id: &Pubkey,
    authority: &Pubkey,
    vrf_coordinator: &Pubkey,
    params: LotteryParams,
) -> Instruction {
    let (lottery, _) = find_lottery_address(program_id, authority);
    let accounts = vec![
        AccountMeta::new(*authority, true),
        AccountMeta::new(lottery, false),
        AccountMeta::new_readonly(*vrf_coordinator, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::InitializeLottery(params).pack(),
    }
}

/// Create enter_raffle instruction
pub fn enter_raffle(program_id: &Pubkey, player: &Pubkey, lottery: &Pubkey, amount: u64) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*player, true),
        AccountMeta::new(*lottery, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::EnterRaffle { amount }.pack(),
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, lottery: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*lottery, false)],
        data: RaffleInstruction::CheckUpkeep { check_data: vec![] }.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(program_id: &Pubkey, lottery: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*lottery, false)],
        data: RaffleInstruction::PerformUpkeep { perform_data: vec![] }.pack(),
    }
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    vrf_coordinator: &Pubkey,
    lottery: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*vrf_coordinator, true),
        AccountMeta::new(*lottery, false),
        AccountMeta::new(*winner, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack(),
    }
}
