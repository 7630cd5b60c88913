// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::{ActorError, AsActorError};
use fvm_shared::error::ExitCode;
use std::fmt::Display;

// Shorthands for the codes raised when state or messages cannot be encoded or read back.
pub trait AsActorErrors<T>: Sized {
    fn or_with_illegal_state<C, F>(self, f: F) -> Result<T, ActorError>
    where
        C: Display + 'static,
        F: FnOnce() -> C;

    fn or_serialization<C>(self, context: C) -> Result<T, ActorError>
    where
        C: Display + 'static;
}

impl<T, E: Display> AsActorErrors<T> for Result<T, E> {
    fn or_with_illegal_state<C, F>(self, f: F) -> Result<T, ActorError>
    where
        C: Display + 'static,
        F: FnOnce() -> C,
    {
        self.with_context_code(ExitCode::USR_ILLEGAL_STATE, f)
    }

    fn or_serialization<C>(self, context: C) -> Result<T, ActorError>
    where
        C: Display + 'static,
    {
        self.context_code(ExitCode::USR_SERIALIZATION, context)
    }
}
