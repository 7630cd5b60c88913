// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_encoding::DAG_CBOR;
use lazy_static::lazy_static;
use multihash::{Code, MultihashDigest};

lazy_static! {
    /// The state root of an actor that has not yet been constructed: an empty CBOR array.
    pub static ref EMPTY_ARR_CID: Cid = {
        // 0x80 is the CBOR header of an array of length zero.
        Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&[0x80]))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_ipld_encoding::to_vec;

    #[test]
    fn matches_encoded_empty_array() {
        let empty: [u8; 0] = [];
        let bytes = to_vec(&empty).unwrap();
        assert_eq!(vec![0x80], bytes);
        assert_eq!(*EMPTY_ARR_CID, Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&bytes)));
    }
}
