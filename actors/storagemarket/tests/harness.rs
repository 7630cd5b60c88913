// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#![allow(dead_code)]

use fil_actor_storagemarket::ext::init::{ExecParams, ExecReturn, EXEC_METHOD};
use fil_actor_storagemarket::ext::miner::MinerConstructorParams;
use fil_actor_storagemarket::testing::check_state_invariants;
use fil_actor_storagemarket::{
    Actor as MarketActor, AddAskParams, AddBidParams, AddDealParams, Ask, AskID, Bid, BidID,
    CommitDealParams, CreateMinerParams, CreateMinerReturn, Deal, DealID, GetAllAsksReturn,
    GetAllBidsReturn, GetTotalStorageReturn, Method, OrderQueryParams, State, UpdatePowerParams,
};
use fil_market_runtime::test_utils::*;
use fil_market_runtime::{ActorError, CALLER_TYPES_SIGNABLE, INIT_ACTOR_ADDR, SYSTEM_ACTOR_ADDR};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::address::Address;
use fvm_shared::bigint::BigInt;
use fvm_shared::crypto::signature::Signature;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::MethodNum;
use num_traits::Zero;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const OWNER_ID: u64 = 101;
pub const CLIENT_ID: u64 = 102;
pub const MINER_ID: u64 = 1000;

pub fn owner() -> Address {
    Address::new_id(OWNER_ID)
}

pub fn client() -> Address {
    Address::new_id(CLIENT_ID)
}

pub fn setup() -> MockRuntime {
    init_logging();
    let rt = MockRuntime::default();
    construct_and_verify(&rt);
    rt
}

pub fn construct_and_verify(rt: &MockRuntime) {
    rt.set_caller(*SYSTEM_ACTOR_CODE_ID, SYSTEM_ACTOR_ADDR);
    rt.expect_validate_caller_addr(vec![SYSTEM_ACTOR_ADDR]);
    let ret = rt.call::<MarketActor>(Method::Constructor as MethodNum, None).unwrap();
    assert!(ret.is_none());
    rt.verify();
}

fn block<T: Serialize>(v: &T) -> Option<IpldBlock> {
    IpldBlock::serialize_cbor(v).unwrap()
}

fn decode<T: DeserializeOwned>(ret: Option<IpldBlock>) -> T {
    ret.expect("expected a return value").deserialize().unwrap()
}

/// Invokes a method, checking that every expectation was met when it succeeds
/// and discarding leftover expectations when it fails.
pub fn call(
    rt: &MockRuntime,
    method: Method,
    params: Option<IpldBlock>,
) -> Result<Option<IpldBlock>, ActorError> {
    let ret = rt.call::<MarketActor>(method as MethodNum, params);
    if ret.is_ok() {
        rt.verify();
    } else {
        rt.reset();
    }
    ret
}

/// Creates a miner owned by `owner` whose ID address will be `Address::new_id(miner_id)`.
pub fn create_miner(
    rt: &MockRuntime,
    owner: Address,
    miner_id: u64,
    pledge_sectors: u64,
    value: TokenAmount,
) -> CreateMinerReturn {
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, owner);
    rt.set_received(value.clone());
    rt.set_balance(value.clone());
    rt.expect_validate_caller_type(CALLER_TYPES_SIGNABLE.to_vec());

    let public_key = vec![1, 2, 3];
    let peer_id = format!("peer-{}", miner_id).into_bytes();
    let exec_ret = ExecReturn {
        id_address: Address::new_id(miner_id),
        robust_address: Address::new_actor(&miner_id.to_be_bytes()),
    };
    let ctor = MinerConstructorParams {
        owner,
        public_key: public_key.clone(),
        pledge_sectors,
        peer_id: peer_id.clone(),
        collateral: value.clone(),
    };
    let exec = ExecParams {
        code_cid: *MINER_ACTOR_CODE_ID,
        constructor_params: RawBytes::serialize(ctor).unwrap(),
    };
    rt.expect_send(
        INIT_ACTOR_ADDR,
        EXEC_METHOD,
        block(&exec),
        value,
        block(&exec_ret),
        ExitCode::OK,
    );

    let params = CreateMinerParams { pledge_sectors, public_key, peer_id };
    let ret: CreateMinerReturn =
        decode(call(rt, Method::CreateMiner, block(&params)).unwrap());
    assert_eq!(exec_ret.id_address, ret.id_address);
    assert_eq!(exec_ret.robust_address, ret.robust_address);
    ret
}

/// A registered miner with the minimum pledge.
pub fn registered_miner(rt: &MockRuntime, miner_id: u64) -> Address {
    create_miner(rt, owner(), miner_id, rt.policy.minimum_pledge_sectors, TokenAmount::zero())
        .id_address
}

pub fn add_ask(
    rt: &MockRuntime,
    miner: Address,
    price: TokenAmount,
    size: u64,
) -> Result<AskID, ActorError> {
    rt.set_caller(*MINER_ACTOR_CODE_ID, miner);
    rt.set_received(TokenAmount::zero());
    rt.expect_validate_caller_any();
    call(rt, Method::AddAsk, block(&AddAskParams { price, size })).map(decode)
}

pub fn add_bid(
    rt: &MockRuntime,
    bidder: Address,
    price: TokenAmount,
    size: u64,
    value: TokenAmount,
) -> Result<BidID, ActorError> {
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, bidder);
    rt.set_received(value);
    rt.expect_validate_caller_any();
    call(rt, Method::AddBid, block(&AddBidParams { price, size })).map(decode)
}

/// Submits a deal as `caller`, with signature checks answered by `sig_results`
/// in order (ask signature first, then bid signature).
pub fn add_deal_with(
    rt: &MockRuntime,
    caller: Address,
    ask_id: AskID,
    bid_id: BidID,
    expected: Option<&Deal>,
    sig_results: Vec<anyhow::Result<()>>,
) -> Result<DealID, ActorError> {
    let ask_signature = Signature::new_secp256k1(vec![0xa5; 65]);
    let bid_signature = Signature::new_secp256k1(vec![0xb1; 65]);
    if let Some(deal) = expected {
        let plaintext = deal.signing_bytes().unwrap();
        let signers =
            [(ask_signature.clone(), deal.provider), (bid_signature.clone(), deal.client)];
        for ((sig, signer), result) in signers.into_iter().zip(sig_results) {
            rt.expect_verify_signature(ExpectedVerifySig {
                sig,
                signer,
                plaintext: plaintext.clone(),
                result,
            });
        }
    }

    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, caller);
    rt.set_received(TokenAmount::zero());
    rt.expect_validate_caller_any();
    let params = AddDealParams { ask_id, bid_id, ask_signature, bid_signature };
    call(rt, Method::AddDeal, block(&params)).map(decode)
}

/// Publishes a well-signed deal between an existing ask and bid, as the bid owner.
pub fn add_deal(rt: &MockRuntime, ask_id: AskID, bid_id: BidID) -> Result<DealID, ActorError> {
    let ask = get_ask(rt, ask_id);
    let bid = get_bid(rt, bid_id);
    let deal = Deal::new(&ask, &bid);
    add_deal_with(rt, bid.owner, ask_id, bid_id, Some(&deal), vec![Ok(()), Ok(())])
}

pub fn commit_deal(rt: &MockRuntime, caller: Address, deal_id: DealID) -> Result<(), ActorError> {
    rt.set_caller(*MINER_ACTOR_CODE_ID, caller);
    rt.set_received(TokenAmount::zero());
    rt.expect_validate_caller_any();
    let ret = call(rt, Method::CommitDeal, block(&CommitDealParams { deal_id }))?;
    assert!(ret.is_none());
    Ok(())
}

pub fn update_power(rt: &MockRuntime, caller: Address, delta: i64) -> Result<(), ActorError> {
    rt.set_caller(*MINER_ACTOR_CODE_ID, caller);
    rt.set_received(TokenAmount::zero());
    rt.expect_validate_caller_any();
    let ret = call(rt, Method::UpdatePower, block(&UpdatePowerParams { delta: delta.into() }))?;
    assert!(ret.is_none());
    Ok(())
}

fn query(
    rt: &MockRuntime,
    method: Method,
    params: Option<IpldBlock>,
) -> Result<Option<IpldBlock>, ActorError> {
    rt.set_caller(*ACCOUNT_ACTOR_CODE_ID, client());
    rt.set_received(TokenAmount::zero());
    rt.expect_validate_caller_any();
    call(rt, method, params)
}

pub fn get_total_storage(rt: &MockRuntime) -> BigInt {
    let ret: GetTotalStorageReturn = decode(query(rt, Method::GetTotalStorage, None).unwrap());
    ret.total
}

pub fn try_get_ask(rt: &MockRuntime, id: AskID) -> Result<Ask, ActorError> {
    query(rt, Method::GetAsk, block(&OrderQueryParams { id })).map(decode)
}

pub fn get_ask(rt: &MockRuntime, id: AskID) -> Ask {
    try_get_ask(rt, id).unwrap()
}

pub fn try_get_bid(rt: &MockRuntime, id: BidID) -> Result<Bid, ActorError> {
    query(rt, Method::GetBid, block(&OrderQueryParams { id })).map(decode)
}

pub fn get_bid(rt: &MockRuntime, id: BidID) -> Bid {
    try_get_bid(rt, id).unwrap()
}

pub fn try_get_deal(rt: &MockRuntime, id: DealID) -> Result<Deal, ActorError> {
    query(rt, Method::GetDeal, block(&OrderQueryParams { id })).map(decode)
}

pub fn get_deal(rt: &MockRuntime, id: DealID) -> Deal {
    try_get_deal(rt, id).unwrap()
}

pub fn get_all_asks(rt: &MockRuntime) -> Vec<Ask> {
    let ret: GetAllAsksReturn = decode(query(rt, Method::GetAllAsks, None).unwrap());
    ret.asks
}

pub fn get_all_bids(rt: &MockRuntime) -> Vec<Bid> {
    let ret: GetAllBidsReturn = decode(query(rt, Method::GetAllBids, None).unwrap());
    ret.bids
}

pub fn check_state(rt: &MockRuntime) {
    let st: State = rt.get_state();
    let (_, acc) = check_state_invariants(&st, &rt.store);
    acc.assert_empty();
}
