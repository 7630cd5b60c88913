// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context;
use fil_market_runtime::runtime::Primitives;
use fvm_ipld_encoding::to_vec;
use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;
use fvm_shared::crypto::signature::Signature;
use log::debug;

use crate::types::{Ask, AskID, Bid, BidID};

/// An agreement to store a bid's data under an ask.
#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Deal {
    pub ask_id: AskID,
    pub bid_id: BidID,
    /// Owner of the ask.
    pub provider: Address,
    /// Owner of the bid.
    pub client: Address,
    pub committed: bool,
}

impl Deal {
    /// The uncommitted deal matching an ask against a bid.
    pub fn new(ask: &Ask, bid: &Bid) -> Self {
        Deal {
            ask_id: ask.id,
            bid_id: bid.id,
            provider: ask.owner,
            client: bid.owner,
            committed: false,
        }
    }

    /// The bytes both parties sign: the encoding of the deal before it is committed.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, fvm_ipld_encoding::Error> {
        to_vec(&Deal { committed: false, ..self.clone() })
    }
}

/// Something holding keys that can sign on behalf of addresses, such as a wallet.
pub trait DealSigner {
    fn sign_bytes(&self, data: &[u8], address: &Address) -> anyhow::Result<Signature>;
}

/// Signs a deal as `address`.
pub fn sign_deal(
    deal: &Deal,
    signer: &impl DealSigner,
    address: &Address,
) -> anyhow::Result<Signature> {
    let bytes = deal.signing_bytes().context("failed to encode deal for signing")?;
    signer.sign_bytes(&bytes, address)
}

/// Checks that `signature` is `address`'s signature over the deal.
/// Any failure, including one to encode the deal, counts as an invalid signature.
pub fn verify_deal_signature(
    primitives: &impl Primitives,
    deal: &Deal,
    signature: &Signature,
    address: &Address,
) -> bool {
    let bytes = match deal.signing_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("failed to encode deal {}/{} for verification: {}", deal.ask_id, deal.bid_id, e);
            return false;
        }
    };
    match primitives.verify_signature(signature, address, &bytes) {
        Ok(()) => true,
        Err(e) => {
            debug!("signature by {} on deal {}/{} rejected: {}", address, deal.ask_id, deal.bid_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fil_market_runtime::test_utils::{verify_secp_signature, SecpKey};
    use fvm_shared::econ::TokenAmount;

    struct Wallet(Vec<SecpKey>);

    impl DealSigner for Wallet {
        fn sign_bytes(&self, data: &[u8], address: &Address) -> anyhow::Result<Signature> {
            let key = self
                .0
                .iter()
                .find(|k| k.address == *address)
                .ok_or_else(|| anyhow::anyhow!("no key for {}", address))?;
            Ok(key.sign(data))
        }
    }

    struct SecpVerifier;

    impl Primitives for SecpVerifier {
        fn verify_signature(
            &self,
            signature: &Signature,
            signer: &Address,
            plaintext: &[u8],
        ) -> anyhow::Result<()> {
            verify_secp_signature(signature, signer, plaintext)
        }
    }

    fn deal_between(provider: &SecpKey, client: &SecpKey) -> Deal {
        let ask = Ask { id: 3, price: TokenAmount::from_atto(5), size: 100, owner: provider.address };
        let bid = Bid {
            id: 9,
            price: TokenAmount::from_atto(5),
            size: 40,
            collateral: TokenAmount::from_atto(200),
            owner: client.address,
            used: false,
        };
        Deal::new(&ask, &bid)
    }

    #[test]
    fn signed_deal_verifies_for_signer() {
        let provider = SecpKey::new(1);
        let client = SecpKey::new(2);
        let deal = deal_between(&provider, &client);
        let wallet = Wallet(vec![provider, client]);

        let sig = sign_deal(&deal, &wallet, &deal.provider).unwrap();
        assert!(verify_deal_signature(&SecpVerifier, &deal, &sig, &deal.provider));
        assert!(!verify_deal_signature(&SecpVerifier, &deal, &sig, &deal.client));
    }

    #[test]
    fn signature_covers_uncommitted_deal() {
        let provider = SecpKey::new(1);
        let client = SecpKey::new(2);
        let mut deal = deal_between(&provider, &client);
        let wallet = Wallet(vec![provider, client]);
        let sig = sign_deal(&deal, &wallet, &deal.client).unwrap();

        deal.committed = true;
        assert!(verify_deal_signature(&SecpVerifier, &deal, &sig, &deal.client));

        deal.bid_id += 1;
        assert!(!verify_deal_signature(&SecpVerifier, &deal, &sig, &deal.client));
    }

    #[test]
    fn signing_for_unknown_address_fails() {
        let provider = SecpKey::new(1);
        let client = SecpKey::new(2);
        let deal = deal_between(&provider, &client);
        let wallet = Wallet(vec![provider]);
        assert!(sign_deal(&deal, &wallet, &deal.client).is_err());
    }

    #[test]
    fn malformed_signature_is_invalid() {
        let provider = SecpKey::new(1);
        let client = SecpKey::new(2);
        let deal = deal_between(&provider, &client);
        let garbage = Signature::new_secp256k1(vec![7; 12]);
        assert!(!verify_deal_signature(&SecpVerifier, &deal, &garbage, &deal.provider));
    }
}
