// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub trait RuntimePolicy {
    fn policy(&self) -> &Policy;
}

/// Network-tunable constants consulted by the market actors.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Policy {
    /// The least number of sectors a miner may pledge on creation.
    pub minimum_pledge_sectors: u64,
}

impl Default for Policy {
    fn default() -> Policy {
        Policy { minimum_pledge_sectors: policy_constants::MINIMUM_PLEDGE_SECTORS }
    }
}

pub mod policy_constants {
    #[cfg(not(feature = "small-pledge"))]
    pub const MINIMUM_PLEDGE_SECTORS: u64 = 10;

    #[cfg(feature = "small-pledge")]
    pub const MINIMUM_PLEDGE_SECTORS: u64 = 1;
}
