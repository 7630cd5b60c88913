// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use num_derive::FromPrimitive;

/// Identifies the builtin actor types by the index the VM assigns their code.
#[derive(PartialEq, Eq, Clone, Copy, PartialOrd, Ord, FromPrimitive, Debug)]
#[repr(i32)]
pub enum Type {
    System = 1,
    Init = 2,
    Account = 4,
    StorageMiner = 6,
    StorageMarket = 7,
    Multisig = 9,
}

impl Type {
    pub const fn name(&self) -> &'static str {
        match *self {
            Type::System => "system",
            Type::Init => "init",
            Type::Account => "account",
            Type::StorageMiner => "storageminer",
            Type::StorageMarket => "storagemarket",
            Type::Multisig => "multisig",
        }
    }
}
