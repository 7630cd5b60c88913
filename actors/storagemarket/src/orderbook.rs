// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;

use cid::Cid;
use fil_market_runtime::{ActorError, Config, Map2, MapKey, DEFAULT_HAMT_CONFIG};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use itertools::Itertools;

use crate::deal::Deal;
use crate::types::{Ask, AskID, Bid, BidID, DealID};
use crate::MarketError;

pub const ASKS_CONFIG: Config = DEFAULT_HAMT_CONFIG;
pub const BIDS_CONFIG: Config = DEFAULT_HAMT_CONFIG;
pub const DEALS_CONFIG: Config = DEFAULT_HAMT_CONFIG;

pub type AskMap<BS> = Map2<BS, OrderKey, Ask>;
pub type BidMap<BS> = Map2<BS, OrderKey, Bid>;
pub type DealMap<BS> = Map2<BS, OrderKey, Deal>;

const KEY_RADIX: u32 = 36;
const KEY_DIGITS: &[u8; KEY_RADIX as usize] = b"0123456789abcdefghijklmnopqrstuvwxyz";
/// Digits in the longest key, that of `u64::MAX`.
const KEY_WIDTH: usize = 13;

/// HAMT key of an order or deal: its id written in lower-case base 36.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey(pub u64);

impl OrderKey {
    /// Parses a key, accepting only the exact text `Display` produces for some id.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("empty order key".to_string());
        }
        if s.len() > 1 && s.starts_with('0') {
            return Err(format!("order key {:?} has leading zeros", s));
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()) {
            return Err(format!("order key {:?} is not lower-case base 36", s));
        }
        u64::from_str_radix(s, KEY_RADIX)
            .map(OrderKey)
            .map_err(|e| format!("order key {:?} is not a valid id: {}", s, e))
    }

    /// Writes the key's digits into the tail of `buf` and returns them.
    fn encode(self, buf: &mut [u8; KEY_WIDTH]) -> &[u8] {
        let mut n = self.0;
        let mut start = KEY_WIDTH;
        loop {
            start -= 1;
            buf[start] = KEY_DIGITS[(n % KEY_RADIX as u64) as usize];
            n /= KEY_RADIX as u64;
            if n == 0 {
                return &buf[start..];
            }
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; KEY_WIDTH];
        let digits = std::str::from_utf8(self.encode(&mut buf)).map_err(|_| fmt::Error)?;
        f.write_str(digits)
    }
}

impl MapKey for OrderKey {
    fn from_bytes(b: &[u8]) -> Result<Self, String> {
        let s = std::str::from_utf8(b).map_err(|e| format!("order key is not utf-8: {}", e))?;
        OrderKey::parse(s)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let mut buf = [0u8; KEY_WIDTH];
        Ok(self.encode(&mut buf).to_vec())
    }
}

/// The asks, bids and deals of the market, with the counters that number them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Orderbook {
    pub next_ask_id: AskID,
    pub next_bid_id: BidID,
    pub next_deal_id: DealID,
    pub asks: Option<Cid>,
    pub bids: Option<Cid>,
    pub deals: Option<Cid>,
}

impl Orderbook {
    pub fn load_asks<BS: Blockstore>(&self, store: BS) -> Result<AskMap<BS>, ActorError> {
        AskMap::load_or_empty(store, &self.asks, ASKS_CONFIG, "asks")
    }

    pub fn load_bids<BS: Blockstore>(&self, store: BS) -> Result<BidMap<BS>, ActorError> {
        BidMap::load_or_empty(store, &self.bids, BIDS_CONFIG, "bids")
    }

    pub fn load_deals<BS: Blockstore>(&self, store: BS) -> Result<DealMap<BS>, ActorError> {
        DealMap::load_or_empty(store, &self.deals, DEALS_CONFIG, "deals")
    }

    /// Records a new ask and returns it with its freshly allocated id.
    pub fn add_ask<BS: Blockstore>(
        &mut self,
        store: &BS,
        price: TokenAmount,
        size: u64,
        owner: Address,
    ) -> Result<Ask, ActorError> {
        let ask = Ask { id: self.next_ask_id, price, size, owner };
        let mut asks = self.load_asks(store)?;
        insert_new(&mut asks, ask.id, ask.clone())?;
        self.asks = Some(asks.flush()?);
        self.next_ask_id += 1;
        Ok(ask)
    }

    /// Records a new bid and returns it with its freshly allocated id.
    pub fn add_bid<BS: Blockstore>(
        &mut self,
        store: &BS,
        price: TokenAmount,
        size: u64,
        collateral: TokenAmount,
        owner: Address,
    ) -> Result<Bid, ActorError> {
        let bid = Bid { id: self.next_bid_id, price, size, collateral, owner, used: false };
        let mut bids = self.load_bids(store)?;
        insert_new(&mut bids, bid.id, bid.clone())?;
        self.bids = Some(bids.flush()?);
        self.next_bid_id += 1;
        Ok(bid)
    }

    pub fn get_ask<BS: Blockstore>(&self, store: &BS, id: AskID) -> Result<Option<Ask>, ActorError> {
        Ok(self.load_asks(store)?.get(&OrderKey(id))?.cloned())
    }

    pub fn get_bid<BS: Blockstore>(&self, store: &BS, id: BidID) -> Result<Option<Bid>, ActorError> {
        Ok(self.load_bids(store)?.get(&OrderKey(id))?.cloned())
    }

    pub fn get_deal<BS: Blockstore>(
        &self,
        store: &BS,
        id: DealID,
    ) -> Result<Option<Deal>, ActorError> {
        Ok(self.load_deals(store)?.get(&OrderKey(id))?.cloned())
    }

    /// Records a deal together with the ask and bid it consumed, which must
    /// already reflect the deal (ask size reduced, bid marked used).
    pub fn add_deal<BS: Blockstore>(
        &mut self,
        store: &BS,
        deal: Deal,
        ask: Ask,
        bid: Bid,
    ) -> Result<DealID, ActorError> {
        let id = self.next_deal_id;

        let mut asks = self.load_asks(store)?;
        replace_existing(&mut asks, ask.id, ask)?;
        let mut bids = self.load_bids(store)?;
        replace_existing(&mut bids, bid.id, bid)?;
        let mut deals = self.load_deals(store)?;
        insert_new(&mut deals, id, deal)?;

        self.asks = Some(asks.flush()?);
        self.bids = Some(bids.flush()?);
        self.deals = Some(deals.flush()?);
        self.next_deal_id += 1;
        Ok(id)
    }

    /// Marks a deal committed on behalf of its provider.
    pub fn commit_deal<BS: Blockstore>(
        &mut self,
        store: &BS,
        id: DealID,
        provider: &Address,
    ) -> Result<Deal, ActorError> {
        let mut deals = self.load_deals(store)?;
        let mut deal = deals
            .get(&OrderKey(id))?
            .cloned()
            .ok_or_else(|| MarketError::UnknownDeal.detail(format!("deal {}", id)))?;
        if deal.provider != *provider {
            return Err(MarketError::NotDealOwner
                .detail(format!("deal {} belongs to {}, not {}", id, deal.provider, provider)));
        }
        if deal.committed {
            return Err(MarketError::DealCommitted.detail(format!("deal {}", id)));
        }
        deal.committed = true;
        deals.set(&OrderKey(id), deal.clone())?;
        self.deals = Some(deals.flush()?);
        Ok(deal)
    }

    /// All asks in id order.
    pub fn all_asks<BS: Blockstore>(&self, store: &BS) -> Result<Vec<Ask>, ActorError> {
        collect_by_id(&self.load_asks(store)?, |ask| ask.id)
    }

    /// All bids in id order.
    pub fn all_bids<BS: Blockstore>(&self, store: &BS) -> Result<Vec<Bid>, ActorError> {
        collect_by_id(&self.load_bids(store)?, |bid| bid.id)
    }
}

fn insert_new<BS, V>(map: &mut Map2<BS, OrderKey, V>, id: u64, value: V) -> Result<(), ActorError>
where
    BS: Blockstore,
    V: serde::de::DeserializeOwned + serde::Serialize + PartialEq,
{
    if !map.set_if_absent(&OrderKey(id), value)? {
        return Err(ActorError::illegal_state(format!("id {} is already allocated", id)));
    }
    Ok(())
}

fn replace_existing<BS, V>(
    map: &mut Map2<BS, OrderKey, V>,
    id: u64,
    value: V,
) -> Result<(), ActorError>
where
    BS: Blockstore,
    V: serde::de::DeserializeOwned + serde::Serialize + PartialEq,
{
    if map.set(&OrderKey(id), value)?.is_none() {
        return Err(ActorError::illegal_state(format!("id {} was not present", id)));
    }
    Ok(())
}

/// Walks an index, checking every record against the id its key encodes.
fn collect_by_id<BS, V, F>(map: &Map2<BS, OrderKey, V>, id_of: F) -> Result<Vec<V>, ActorError>
where
    BS: Blockstore,
    V: serde::de::DeserializeOwned + serde::Serialize + Clone,
    F: Fn(&V) -> u64,
{
    let mut out = Vec::new();
    map.for_each(|key, value| {
        if key.0 != id_of(value) {
            return Err(ActorError::illegal_state(format!(
                "record with id {} stored under key {}",
                id_of(value),
                key
            )));
        }
        out.push(value.clone());
        Ok(())
    })?;
    Ok(out.into_iter().sorted_by_key(|v| id_of(v)).collect())
}
