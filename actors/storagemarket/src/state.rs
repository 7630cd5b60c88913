// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fil_market_runtime::{actor_error, ActorError, Config, Set, DEFAULT_HAMT_CONFIG};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;
use fvm_shared::bigint::{bigint_ser, BigInt};
use num_traits::{Signed, Zero};

use crate::orderbook::Orderbook;
use crate::MarketError;

pub const MINERS_CONFIG: Config = DEFAULT_HAMT_CONFIG;

pub type MinerSet<BS> = Set<BS, Address>;

/// Market actor state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct State {
    /// Registered storage miners, by ID address.
    pub miners: Option<Cid>,
    pub orderbook: Orderbook,
    /// Sectors committed across all miners.
    #[serde(with = "bigint_ser")]
    pub total_committed_storage: BigInt,
}

impl State {
    pub fn new() -> Self {
        State { miners: None, orderbook: Orderbook::default(), total_committed_storage: BigInt::zero() }
    }

    pub fn load_miners<BS: Blockstore>(&self, store: BS) -> Result<MinerSet<BS>, ActorError> {
        MinerSet::load_or_empty(store, &self.miners, MINERS_CONFIG, "miners")
    }

    pub fn register_miner<BS: Blockstore>(
        &mut self,
        store: &BS,
        miner: &Address,
    ) -> Result<(), ActorError> {
        let mut miners = self.load_miners(store)?;
        if !miners.put(miner)? {
            return Err(actor_error!(illegal_state; "miner {} already registered", miner));
        }
        self.miners = Some(miners.flush()?);
        Ok(())
    }

    pub fn is_miner<BS: Blockstore>(&self, store: &BS, addr: &Address) -> Result<bool, ActorError> {
        self.load_miners(store)?.has(addr)
    }

    /// Fails with `UnknownMiner` unless `addr` is registered.
    pub fn require_miner<BS: Blockstore>(
        &self,
        store: &BS,
        addr: &Address,
    ) -> Result<(), ActorError> {
        if !self.is_miner(store, addr)? {
            return Err(MarketError::UnknownMiner.detail(addr));
        }
        Ok(())
    }

    /// Applies a signed change to the committed storage total, which may not go below zero.
    pub fn update_power(&mut self, delta: &BigInt) -> Result<(), ActorError> {
        let total = &self.total_committed_storage + delta;
        if total.is_negative() {
            return Err(actor_error!(illegal_argument;
                "power delta {} would make total committed storage {} negative",
                delta, self.total_committed_storage));
        }
        self.total_committed_storage = total;
        Ok(())
    }
}
