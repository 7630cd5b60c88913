// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::CborStore;
use fvm_shared::address::Address;
use fvm_shared::crypto::signature::Signature;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use fvm_shared::{MethodNum, Response};
use multihash::Code;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use self::actor_code::*;
pub use self::policy::*;
use crate::runtime::builtins::Type;
use crate::{actor_error, ActorError, AsActorError, SendError};

mod actor_code;
pub mod builtins;
pub mod policy;

#[cfg(feature = "fil-actor")]
mod actor_blockstore;
#[cfg(feature = "fil-actor")]
pub mod fvm;

pub(crate) mod empty;

pub use empty::EMPTY_ARR_CID;

/// The VM services available to an executing actor method.
pub trait Runtime: Primitives + RuntimePolicy {
    type Blockstore: Blockstore;

    /// The message being executed.
    fn message(&self) -> &dyn MessageInfo;

    /// Every exported method validates its caller exactly once, through one of these.
    fn validate_immediate_caller_accept_any(&self) -> Result<(), ActorError>;
    fn validate_immediate_caller_is<'a, I>(&self, addresses: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Address>;
    fn validate_immediate_caller_type<'a, I>(&self, types: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Type>;

    /// Writes the initial state. Fails once the actor has state.
    fn create<T: Serialize>(&self, obj: &T) -> Result<(), ActorError> {
        let root = self.get_state_root()?;
        if root != *EMPTY_ARR_CID {
            return Err(actor_error!(illegal_state; "actor state already exists at {}", root));
        }
        let root = self
            .store()
            .put_cbor(obj, Code::Blake2b256)
            .context_code(ExitCode::USR_ILLEGAL_STATE, "failed to write initial state")?;
        self.set_state_root(&root)
    }

    /// A read-only copy of the current state.
    fn state<T: DeserializeOwned>(&self) -> Result<T, ActorError> {
        let root = self.get_state_root()?;
        self.store()
            .get_cbor(&root)
            .context_code(ExitCode::USR_SERIALIZATION, "failed to decode state")?
            .context_code(ExitCode::USR_ILLEGAL_STATE, format!("no state at root {}", root))
    }

    fn get_state_root(&self) -> Result<Cid, ActorError>;

    fn set_state_root(&self, root: &Cid) -> Result<(), ActorError>;

    /// Runs `f` against a mutable copy of the state and commits the copy only if `f`
    /// succeeds. Sends are rejected while `f` runs.
    fn transaction<S, RT, F>(&self, f: F) -> Result<RT, ActorError>
    where
        S: Serialize + DeserializeOwned,
        F: FnOnce(&mut S, &Self) -> Result<RT, ActorError>;

    fn store(&self) -> &Self::Blockstore;

    /// Sends `value` and a method call to another actor. A failure of the callee comes back
    /// as the response's exit code; `SendError` means the message was never delivered.
    fn send(
        &self,
        to: &Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
    ) -> Result<Response, SendError>;

    /// The code CID installed for a builtin actor type.
    fn get_code_cid_for_type(&self, typ: Type) -> Cid;
}

/// The fields of the executing message that actors read.
pub trait MessageInfo {
    /// The immediate caller, as an ID address.
    fn caller(&self) -> Address;

    /// The funds transferred with the message.
    fn value_received(&self) -> TokenAmount;
}

pub trait Primitives {
    /// Checks that `signature` over `plaintext` was made by `signer`.
    fn verify_signature(
        &self,
        signature: &Signature,
        signer: &Address,
        plaintext: &[u8],
    ) -> Result<(), anyhow::Error>;
}
