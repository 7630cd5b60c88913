// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::anyhow;
use fil_actor_storagemarket::{Deal, MarketError, State};
use fil_market_runtime::test_utils::*;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;

mod harness;

use harness::*;

/// A miner with a 100 byte ask and a client with a 40 byte bid against it.
fn setup_orders() -> (MockRuntime, Address) {
    let rt = setup();
    let miner = registered_miner(&rt, MINER_ID);
    assert_eq!(0, add_ask(&rt, miner, TokenAmount::from_atto(2), 100).unwrap());
    assert_eq!(
        0,
        add_bid(&rt, client(), TokenAmount::from_atto(2), 40, TokenAmount::from_atto(80)).unwrap()
    );
    (rt, miner)
}

#[test]
fn publish_consumes_ask_space_and_bid() {
    let (rt, miner) = setup_orders();
    let id = add_deal(&rt, 0, 0).unwrap();
    assert_eq!(0, id);

    assert_eq!(
        Deal { ask_id: 0, bid_id: 0, provider: miner, client: client(), committed: false },
        get_deal(&rt, id)
    );
    assert_eq!(60, get_ask(&rt, 0).size);
    assert!(get_bid(&rt, 0).used);
    check_state(&rt);
}

#[test]
fn deal_ids_increase_from_zero() {
    let (rt, _) = setup_orders();
    add_bid(&rt, client(), TokenAmount::from_atto(2), 60, TokenAmount::from_atto(120)).unwrap();
    assert_eq!(0, add_deal(&rt, 0, 0).unwrap());
    assert_eq!(1, add_deal(&rt, 0, 1).unwrap());
    assert_eq!(0, get_ask(&rt, 0).size);

    let st: State = rt.get_state();
    assert_eq!(2, st.orderbook.next_deal_id);
    check_state(&rt);
}

#[test]
fn commit_once_by_provider() {
    let (rt, miner) = setup_orders();
    let id = add_deal(&rt, 0, 0).unwrap();

    expect_abort_contains_message(
        MarketError::NotDealOwner.exit_code(),
        "miner tried to commit someone else's deal",
        commit_deal(&rt, client(), id),
    );
    assert!(!get_deal(&rt, id).committed);

    commit_deal(&rt, miner, id).unwrap();
    assert!(get_deal(&rt, id).committed);

    expect_abort(MarketError::DealCommitted.exit_code(), commit_deal(&rt, miner, id));
    check_state(&rt);
}

#[test]
fn unknown_deal() {
    let (rt, miner) = setup_orders();
    expect_abort(MarketError::UnknownDeal.exit_code(), commit_deal(&rt, miner, 0));
    expect_abort(MarketError::UnknownDeal.exit_code(), try_get_deal(&rt, 0));
}

#[test]
fn unknown_orders() {
    let (rt, _) = setup_orders();
    expect_abort(
        MarketError::UnknownAsk.exit_code(),
        add_deal_with(&rt, client(), 1, 0, None, vec![]),
    );
    expect_abort(
        MarketError::UnknownBid.exit_code(),
        add_deal_with(&rt, client(), 0, 1, None, vec![]),
    );
}

#[test]
fn only_bid_owner_publishes() {
    let (rt, _) = setup_orders();
    let before = *rt.state.borrow();
    expect_abort(
        MarketError::NotBidOwner.exit_code(),
        add_deal_with(&rt, owner(), 0, 0, None, vec![]),
    );
    assert_eq!(before, *rt.state.borrow());
}

#[test]
fn ask_owner_must_be_registered() {
    let (rt, _) = setup_orders();
    // Asks can only be placed by miners, so plant one directly in state.
    let mut st: State = rt.get_state();
    st.orderbook
        .add_ask(&rt.store, TokenAmount::from_atto(1), 100, Address::new_id(4242))
        .unwrap();
    rt.replace_state(&st);

    expect_abort(
        MarketError::AskOwnerNotFound.exit_code(),
        add_deal_with(&rt, client(), 1, 0, None, vec![]),
    );
}

#[test]
fn bid_larger_than_ask_rejected() {
    let (rt, _) = setup_orders();
    add_bid(&rt, client(), TokenAmount::from_atto(1), 101, TokenAmount::from_atto(101)).unwrap();
    expect_abort_contains_message(
        MarketError::InsufficientSpace.exit_code(),
        "not enough space in ask for bid",
        add_deal(&rt, 0, 1),
    );
    assert_eq!(100, get_ask(&rt, 0).size);
    assert!(!get_bid(&rt, 1).used);
}

#[test]
fn bid_used_once() {
    let (rt, _) = setup_orders();
    add_deal(&rt, 0, 0).unwrap();
    expect_abort(MarketError::BidAlreadyUsed.exit_code(), add_deal(&rt, 0, 0));
    assert_eq!(60, get_ask(&rt, 0).size);
    check_state(&rt);
}

#[test]
fn bad_ask_signature() {
    let (rt, _) = setup_orders();
    let deal = Deal::new(&get_ask(&rt, 0), &get_bid(&rt, 0));
    // The bid signature is never checked once the ask signature fails.
    expect_abort_contains_message(
        MarketError::InvalidSignature.exit_code(),
        "ask signature",
        add_deal_with(&rt, client(), 0, 0, Some(&deal), vec![Err(anyhow!("bad signature"))]),
    );
    assert!(!get_bid(&rt, 0).used);
    expect_abort(MarketError::UnknownDeal.exit_code(), try_get_deal(&rt, 0));
}

#[test]
fn bad_bid_signature() {
    let (rt, _) = setup_orders();
    let deal = Deal::new(&get_ask(&rt, 0), &get_bid(&rt, 0));
    expect_abort_contains_message(
        MarketError::InvalidSignature.exit_code(),
        "bid signature",
        add_deal_with(&rt, client(), 0, 0, Some(&deal), vec![Ok(()), Err(anyhow!("wrong key"))]),
    );
    assert_eq!(100, get_ask(&rt, 0).size);

    // Correctly signed, the same deal goes through.
    assert_eq!(0, add_deal(&rt, 0, 0).unwrap());
    check_state(&rt);
}
