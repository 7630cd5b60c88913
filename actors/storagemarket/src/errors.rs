// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt::Display;

use fil_market_runtime::ActorError;
use fvm_shared::error::ExitCode;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use thiserror::Error;

/// Expected failures of the storage market, each aborting with its own exit code.
///
/// Messages are fixed per code; call sites attach the offending values with [`MarketError::detail`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum MarketError {
    #[error("pledge must be at least the minimum number of sectors")]
    PledgeTooLow = 33,
    #[error("unknown miner")]
    UnknownMiner = 34,
    #[error("ask id not found")]
    UnknownAsk = 35,
    #[error("bid id not found")]
    UnknownBid = 36,
    #[error("ask owner is not a registered miner")]
    AskOwnerNotFound = 37,
    #[error("caller is not the owner of the bid")]
    NotBidOwner = 38,
    #[error("not enough space in ask for bid")]
    InsufficientSpace = 39,
    #[error("signature failed to validate")]
    InvalidSignature = 40,
    #[error("unknown deal id")]
    UnknownDeal = 41,
    #[error("miner tried to commit someone else's deal")]
    NotDealOwner = 42,
    #[error("deal already committed")]
    DealCommitted = 43,
    #[error("must send price * size funds to create bid")]
    InsufficientBidFunds = 44,
    #[error("bid already used by a deal")]
    BidAlreadyUsed = 45,
}

impl MarketError {
    pub fn exit_code(self) -> ExitCode {
        ExitCode::new(self as u32)
    }

    /// Recovers the market error an exit code stands for, if any.
    pub fn from_exit_code(code: ExitCode) -> Option<Self> {
        Self::from_u32(code.value())
    }

    /// Converts into an actor error whose message carries extra detail after the fixed text.
    pub fn detail(self, detail: impl Display) -> ActorError {
        ActorError::actor_specific(self as u32, format!("{}: {}", self, detail))
    }
}

impl From<MarketError> for ActorError {
    fn from(e: MarketError) -> Self {
        ActorError::actor_specific(e as u32, e.to_string())
    }
}
