// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fil_market_runtime::runtime::builtins::Type;
use fil_market_runtime::runtime::{ActorCode, Runtime};
use fil_market_runtime::{
    actor_dispatch, actor_error, deserialize_block, extract_send_result, ActorContext,
    ActorError, AsActorErrors, CALLER_TYPES_SIGNABLE, INIT_ACTOR_ADDR, SYSTEM_ACTOR_ADDR,
};
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::econ::TokenAmount;
use fvm_shared::METHOD_CONSTRUCTOR;
use log::info;
use num_derive::FromPrimitive;

use crate::deal::verify_deal_signature;
use crate::ext::init::{ExecParams, ExecReturn, EXEC_METHOD};
use crate::ext::miner::MinerConstructorParams;

pub use self::deal::{sign_deal, Deal, DealSigner};
pub use self::errors::MarketError;
pub use self::state::State;
pub use self::types::*;

pub mod deal;
mod errors;
pub mod ext;
pub mod orderbook;
mod state;
pub mod testing;
mod types;

#[cfg(feature = "fil-actor")]
fil_market_runtime::wasm_trampoline!(Actor);

/// Storage market actor methods available
#[derive(FromPrimitive)]
#[repr(u64)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR,
    CreateMiner = 2,
    AddAsk = 3,
    AddBid = 4,
    AddDeal = 5,
    CommitDeal = 6,
    UpdatePower = 7,
    GetTotalStorage = 8,
    GetAsk = 9,
    GetBid = 10,
    GetAllAsks = 11,
    GetAllBids = 12,
    GetDeal = 13,
}

/// Storage Market Actor
pub struct Actor;

impl Actor {
    pub fn constructor(rt: &impl Runtime) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(std::iter::once(&SYSTEM_ACTOR_ADDR))?;
        rt.create(&State::new())?;
        Ok(())
    }

    /// Creates a storage miner owned by the caller through the Init actor and registers it.
    pub fn create_miner(
        rt: &impl Runtime,
        params: CreateMinerParams,
    ) -> Result<CreateMinerReturn, ActorError> {
        rt.validate_immediate_caller_type(CALLER_TYPES_SIGNABLE)?;

        let minimum = rt.policy().minimum_pledge_sectors;
        if params.pledge_sectors < minimum {
            return Err(MarketError::PledgeTooLow
                .detail(format!("pledged {}, minimum is {}", params.pledge_sectors, minimum)));
        }

        let owner = rt.message().caller();
        let value = rt.message().value_received();
        let constructor_params = RawBytes::serialize(MinerConstructorParams {
            owner,
            public_key: params.public_key,
            pledge_sectors: params.pledge_sectors,
            peer_id: params.peer_id,
            collateral: value.clone(),
        })
        .or_serialization("failed to serialize miner constructor params")?;
        let exec = ExecParams {
            code_cid: rt.get_code_cid_for_type(Type::StorageMiner),
            constructor_params,
        };

        let ret: ExecReturn = deserialize_block(
            extract_send_result(rt.send(
                &INIT_ACTOR_ADDR,
                EXEC_METHOD,
                IpldBlock::serialize_cbor(&exec)
                    .or_serialization("failed to serialize exec params")?,
                value,
            ))
            .context("failed to create miner")?,
        )?;

        rt.transaction(|st: &mut State, rt| st.register_miner(rt.store(), &ret.id_address))?;
        info!("created miner {} for owner {}", ret.id_address, owner);

        Ok(CreateMinerReturn { id_address: ret.id_address, robust_address: ret.robust_address })
    }

    /// Records an ask from a registered miner, returning its id.
    /// Unregistered callers are rejected before the ask itself is looked at.
    pub fn add_ask(rt: &impl Runtime, params: AddAskParams) -> Result<AskID, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let owner = rt.message().caller();

        let ask = rt.transaction(|st: &mut State, rt| {
            st.require_miner(rt.store(), &owner)?;
            check_price(&params.price)?;
            st.orderbook.add_ask(rt.store(), params.price, params.size, owner)
        })?;
        info!("recorded ask {} from {}: {} bytes at {}", ask.id, ask.owner, ask.size, ask.price);
        Ok(ask.id)
    }

    /// Records a bid backed by the funds sent with it, returning its id.
    pub fn add_bid(rt: &impl Runtime, params: AddBidParams) -> Result<BidID, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        check_price(&params.price)?;
        let owner = rt.message().caller();
        let collateral = rt.message().value_received();

        let required = &params.price * params.size;
        if collateral < required {
            return Err(MarketError::InsufficientBidFunds
                .detail(format!("sent {}, required {}", collateral, required)));
        }

        let bid = rt.transaction(|st: &mut State, rt| {
            st.orderbook.add_bid(rt.store(), params.price, params.size, collateral, owner)
        })?;
        info!(
            "recorded bid {} from {}: {} bytes at {}, collateral {}",
            bid.id, bid.owner, bid.size, bid.price, bid.collateral
        );
        Ok(bid.id)
    }

    /// Publishes a deal between an ask and a bid signed by both owners.
    /// Only the bid owner may publish.
    pub fn add_deal(rt: &impl Runtime, params: AddDealParams) -> Result<DealID, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let caller = rt.message().caller();

        rt.transaction(|st: &mut State, rt| {
            let store = rt.store();
            let mut ask = st
                .orderbook
                .get_ask(store, params.ask_id)?
                .ok_or_else(|| MarketError::UnknownAsk.detail(format!("ask {}", params.ask_id)))?;
            let mut bid = st
                .orderbook
                .get_bid(store, params.bid_id)?
                .ok_or_else(|| MarketError::UnknownBid.detail(format!("bid {}", params.bid_id)))?;

            if bid.owner != caller {
                return Err(MarketError::NotBidOwner
                    .detail(format!("bid {} belongs to {}, not {}", bid.id, bid.owner, caller)));
            }
            if !st.is_miner(store, &ask.owner)? {
                return Err(MarketError::AskOwnerNotFound.detail(ask.owner));
            }
            if bid.used {
                return Err(MarketError::BidAlreadyUsed.detail(format!("bid {}", bid.id)));
            }
            if bid.size > ask.size {
                return Err(MarketError::InsufficientSpace.detail(format!(
                    "bid {} needs {} bytes, ask {} has {}",
                    bid.id, bid.size, ask.id, ask.size
                )));
            }

            let deal = Deal::new(&ask, &bid);
            if !verify_deal_signature(rt, &deal, &params.ask_signature, &deal.provider) {
                return Err(MarketError::InvalidSignature.detail("ask signature"));
            }
            if !verify_deal_signature(rt, &deal, &params.bid_signature, &deal.client) {
                return Err(MarketError::InvalidSignature.detail("bid signature"));
            }

            ask.size -= bid.size;
            bid.used = true;
            let id = st.orderbook.add_deal(store, deal, ask, bid)?;
            info!("published deal {} for ask {} and bid {}", id, params.ask_id, params.bid_id);
            Ok(id)
        })
    }

    /// Marks a deal committed. Only the deal's provider may commit it, and only once.
    pub fn commit_deal(rt: &impl Runtime, params: CommitDealParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let caller = rt.message().caller();
        rt.transaction(|st: &mut State, rt| {
            st.orderbook.commit_deal(rt.store(), params.deal_id, &caller)?;
            Ok(())
        })
    }

    /// Adjusts the committed storage total on behalf of a registered miner.
    pub fn update_power(rt: &impl Runtime, params: UpdatePowerParams) -> Result<(), ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let caller = rt.message().caller();
        rt.transaction(|st: &mut State, rt| {
            st.require_miner(rt.store(), &caller)?;
            st.update_power(&params.delta)
        })
    }

    pub fn get_total_storage(rt: &impl Runtime) -> Result<GetTotalStorageReturn, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let st: State = rt.state()?;
        Ok(GetTotalStorageReturn { total: st.total_committed_storage })
    }

    pub fn get_ask(rt: &impl Runtime, params: GetAskParams) -> Result<Ask, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let st: State = rt.state()?;
        st.orderbook
            .get_ask(rt.store(), params.id)?
            .ok_or_else(|| MarketError::UnknownAsk.detail(format!("ask {}", params.id)))
    }

    pub fn get_bid(rt: &impl Runtime, params: GetBidParams) -> Result<Bid, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let st: State = rt.state()?;
        st.orderbook
            .get_bid(rt.store(), params.id)?
            .ok_or_else(|| MarketError::UnknownBid.detail(format!("bid {}", params.id)))
    }

    pub fn get_deal(rt: &impl Runtime, params: GetDealParams) -> Result<Deal, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let st: State = rt.state()?;
        st.orderbook
            .get_deal(rt.store(), params.id)?
            .ok_or_else(|| MarketError::UnknownDeal.detail(format!("deal {}", params.id)))
    }

    /// All asks, ordered by id.
    pub fn get_all_asks(rt: &impl Runtime) -> Result<GetAllAsksReturn, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let st: State = rt.state()?;
        Ok(GetAllAsksReturn { asks: st.orderbook.all_asks(rt.store())? })
    }

    /// All bids, ordered by id.
    pub fn get_all_bids(rt: &impl Runtime) -> Result<GetAllBidsReturn, ActorError> {
        rt.validate_immediate_caller_accept_any()?;
        let st: State = rt.state()?;
        Ok(GetAllBidsReturn { bids: st.orderbook.all_bids(rt.store())? })
    }
}

fn check_price(price: &TokenAmount) -> Result<(), ActorError> {
    if price.is_negative() {
        return Err(actor_error!(illegal_argument; "price {} must not be negative", price));
    }
    Ok(())
}

impl ActorCode for Actor {
    type Methods = Method;

    fn name() -> &'static str {
        "StorageMarket"
    }

    actor_dispatch! {
        Constructor => constructor,
        CreateMiner => create_miner,
        AddAsk => add_ask,
        AddBid => add_bid,
        AddDeal => add_deal,
        CommitDeal => commit_deal,
        UpdatePower => update_power,
        GetTotalStorage => get_total_storage,
        GetAsk => get_ask,
        GetBid => get_bid,
        GetAllAsks => get_all_asks,
        GetAllBids => get_all_bids,
        GetDeal => get_deal,
    }
}
