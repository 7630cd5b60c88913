// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::tuple::*;
use fvm_shared::address::Address;

pub mod init {
    use super::*;
    use cid::Cid;
    use fvm_ipld_encoding::RawBytes;

    pub const EXEC_METHOD: u64 = 2;

    /// Init actor Exec Params
    #[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
    pub struct ExecParams {
        pub code_cid: Cid,
        pub constructor_params: RawBytes,
    }

    /// Init actor Exec Return value
    #[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
    pub struct ExecReturn {
        /// ID based address for created actor
        pub id_address: Address,
        /// Reorg safe address for actor
        pub robust_address: Address,
    }
}

pub mod miner {
    use super::*;
    use fvm_ipld_encoding::strict_bytes;
    use fvm_shared::econ::TokenAmount;

    /// Constructor parameters of a storage miner created by the market.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
    pub struct MinerConstructorParams {
        pub owner: Address,
        #[serde(with = "strict_bytes")]
        pub public_key: Vec<u8>,
        pub pledge_sectors: u64,
        #[serde(with = "strict_bytes")]
        pub peer_id: Vec<u8>,
        /// Funds forwarded from the CreateMiner message.
        pub collateral: TokenAmount,
    }
}
