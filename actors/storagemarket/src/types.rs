// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::strict_bytes;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;
use fvm_shared::bigint::{bigint_ser, BigInt};
use fvm_shared::crypto::signature::Signature;
use fvm_shared::econ::TokenAmount;
use serde::{Deserialize, Serialize};

pub type AskID = u64;
pub type BidID = u64;
pub type DealID = u64;

/// A miner's offer to sell storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Ask {
    pub id: AskID,
    /// Price per byte.
    pub price: TokenAmount,
    /// Bytes still available; reduced as deals consume the ask.
    pub size: u64,
    pub owner: Address,
}

/// A client's offer to buy storage, backed by the funds sent when it was placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Bid {
    pub id: BidID,
    /// Price per byte.
    pub price: TokenAmount,
    pub size: u64,
    pub collateral: TokenAmount,
    pub owner: Address,
    /// Set once a deal has been made against this bid.
    pub used: bool,
}

impl Bid {
    /// The funds a bid must be backed by.
    pub fn required_collateral(&self) -> TokenAmount {
        &self.price * self.size
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct CreateMinerParams {
    pub pledge_sectors: u64,
    #[serde(with = "strict_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "strict_bytes")]
    pub peer_id: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct CreateMinerReturn {
    /// Canonical ID-based address for the actor.
    pub id_address: Address,
    /// Re-org safe address for created actor.
    pub robust_address: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct AddAskParams {
    pub price: TokenAmount,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct AddBidParams {
    pub price: TokenAmount,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct AddDealParams {
    pub ask_id: AskID,
    pub bid_id: BidID,
    pub ask_signature: Signature,
    pub bid_signature: Signature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitDealParams {
    pub deal_id: DealID,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdatePowerParams {
    #[serde(with = "bigint_ser")]
    pub delta: BigInt,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GetTotalStorageReturn {
    #[serde(with = "bigint_ser")]
    pub total: BigInt,
}

/// Identifies one order or deal by id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderQueryParams {
    pub id: u64,
}

pub type GetAskParams = OrderQueryParams;
pub type GetBidParams = OrderQueryParams;
pub type GetDealParams = OrderQueryParams;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GetAllAsksReturn {
    pub asks: Vec<Ask>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GetAllBidsReturn {
    pub bids: Vec<Bid>,
}
