// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::runtime::builtins::Type;

pub const HAMT_BIT_WIDTH: u32 = 5;

/// Actor types whose messages originate from a signing party.
pub const CALLER_TYPES_SIGNABLE: &[Type] = &[Type::Account, Type::Multisig];
