// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::{BTreeMap, HashSet};

use fil_market_runtime::MessageAccumulator;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::Address;
use num_traits::Signed;

use crate::{Ask, AskID, Bid, BidID, Deal, DealID, State};

#[derive(Default, Clone)]
pub struct StateSummary {
    pub miners: HashSet<Address>,
    pub asks: BTreeMap<AskID, Ask>,
    pub bids: BTreeMap<BidID, Bid>,
    pub deals: BTreeMap<DealID, Deal>,
}

/// Checks internal invariants of market state
pub fn check_state_invariants<BS: Blockstore>(
    state: &State,
    store: &BS,
) -> (StateSummary, MessageAccumulator) {
    let acc = MessageAccumulator::default();

    acc.require(
        !state.total_committed_storage.is_negative(),
        &format!("total committed storage is negative {}", state.total_committed_storage),
    );

    let miners = check_miners(state, store, &acc);
    let asks = check_asks(state, store, &miners, &acc.with_prefix("asks: "));
    let bids = check_bids(state, store, &acc.with_prefix("bids: "));
    let deals = check_deals(state, store, &asks, &bids, &acc.with_prefix("deals: "));

    (StateSummary { miners, asks, bids, deals }, acc)
}

fn check_miners<BS: Blockstore>(
    state: &State,
    store: &BS,
    acc: &MessageAccumulator,
) -> HashSet<Address> {
    let mut miners = HashSet::new();
    match state.load_miners(store) {
        Ok(set) => {
            let ret = set.for_each(|miner| {
                miners.insert(miner);
                Ok(())
            });
            acc.require_no_error(ret, "error iterating miners");
        }
        Err(e) => acc.add(&format!("error loading miners: {}", e)),
    }
    miners
}

fn check_asks<BS: Blockstore>(
    state: &State,
    store: &BS,
    miners: &HashSet<Address>,
    acc: &MessageAccumulator,
) -> BTreeMap<AskID, Ask> {
    let mut asks = BTreeMap::new();
    let next_id = state.orderbook.next_ask_id;
    match state.orderbook.load_asks(store) {
        Ok(map) => {
            let ret = map.for_each(|key, ask| {
                acc.require(key.0 == ask.id, &format!("ask {} stored under key {}", ask.id, key));
                acc.require(
                    ask.id < next_id,
                    &format!("ask {} not below next ask id {}", ask.id, next_id),
                );
                acc.require(
                    !ask.price.is_negative(),
                    &format!("ask {} has negative price {}", ask.id, ask.price),
                );
                acc.require(
                    miners.contains(&ask.owner),
                    &format!("ask {} owner {} is not a registered miner", ask.id, ask.owner),
                );
                asks.insert(ask.id, ask.clone());
                Ok(())
            });
            acc.require_no_error(ret, "error iterating asks");
        }
        Err(e) => acc.add(&format!("error loading asks: {}", e)),
    }
    asks
}

fn check_bids<BS: Blockstore>(
    state: &State,
    store: &BS,
    acc: &MessageAccumulator,
) -> BTreeMap<BidID, Bid> {
    let mut bids = BTreeMap::new();
    let next_id = state.orderbook.next_bid_id;
    match state.orderbook.load_bids(store) {
        Ok(map) => {
            let ret = map.for_each(|key, bid| {
                acc.require(key.0 == bid.id, &format!("bid {} stored under key {}", bid.id, key));
                acc.require(
                    bid.id < next_id,
                    &format!("bid {} not below next bid id {}", bid.id, next_id),
                );
                acc.require(
                    !bid.price.is_negative(),
                    &format!("bid {} has negative price {}", bid.id, bid.price),
                );
                acc.require(
                    bid.collateral >= bid.required_collateral(),
                    &format!(
                        "bid {} collateral {} below required {}",
                        bid.id,
                        bid.collateral,
                        bid.required_collateral()
                    ),
                );
                bids.insert(bid.id, bid.clone());
                Ok(())
            });
            acc.require_no_error(ret, "error iterating bids");
        }
        Err(e) => acc.add(&format!("error loading bids: {}", e)),
    }
    bids
}

fn check_deals<BS: Blockstore>(
    state: &State,
    store: &BS,
    asks: &BTreeMap<AskID, Ask>,
    bids: &BTreeMap<BidID, Bid>,
    acc: &MessageAccumulator,
) -> BTreeMap<DealID, Deal> {
    let mut deals = BTreeMap::new();
    let mut deal_by_bid: BTreeMap<BidID, DealID> = BTreeMap::new();
    let next_id = state.orderbook.next_deal_id;
    let map = match state.orderbook.load_deals(store) {
        Ok(map) => map,
        Err(e) => {
            acc.add(&format!("error loading deals: {}", e));
            return deals;
        }
    };

    let ret = map.for_each(|key, deal| {
        let id = key.0;
        acc.require(id < next_id, &format!("deal {} not below next deal id {}", id, next_id));

        match asks.get(&deal.ask_id) {
            Some(ask) => acc.require(
                deal.provider == ask.owner,
                &format!("deal {} provider {} is not ask owner {}", id, deal.provider, ask.owner),
            ),
            None => acc.add(&format!("deal {} references missing ask {}", id, deal.ask_id)),
        }
        match bids.get(&deal.bid_id) {
            Some(bid) => {
                acc.require(
                    deal.client == bid.owner,
                    &format!("deal {} client {} is not bid owner {}", id, deal.client, bid.owner),
                );
                acc.require(bid.used, &format!("deal {} bid {} not marked used", id, bid.id));
            }
            None => acc.add(&format!("deal {} references missing bid {}", id, deal.bid_id)),
        }
        if let Some(other) = deal_by_bid.insert(deal.bid_id, id) {
            acc.add(&format!("bid {} used by deals {} and {}", deal.bid_id, other, id));
        }

        deals.insert(id, deal.clone());
        Ok(())
    });
    acc.require_no_error(ret, "error iterating deals");
    deals
}
