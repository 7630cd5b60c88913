// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cell::Cell;

use anyhow::anyhow;
use cid::multihash::Code;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::CborStore;
use fvm_sdk as fvm;
use fvm_sdk::NO_DATA_BLOCK_ID;
use fvm_shared::address::Address;
use fvm_shared::crypto::signature::Signature;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::{ErrorNumber, ExitCode};
use fvm_shared::sys::SendFlags;
use fvm_shared::{MethodNum, Response};
use num_traits::FromPrimitive;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::runtime::actor_blockstore::ActorBlockstore;
use crate::runtime::builtins::Type;
use crate::runtime::{ActorCode, MessageInfo, Policy, Primitives, Runtime, RuntimePolicy};
use crate::{actor_error, ActorError, AsActorError, SendError};

/// The runtime an actor sees when executing inside the FVM.
pub struct FvmRuntime<B = ActorBlockstore> {
    blockstore: B,
    /// Set while a state transaction is open. Sends are rejected meanwhile.
    in_transaction: Cell<bool>,
    caller_validated: Cell<bool>,
    policy: Policy,
}

impl Default for FvmRuntime {
    fn default() -> Self {
        FvmRuntime {
            blockstore: ActorBlockstore,
            in_transaction: Cell::new(false),
            caller_validated: Cell::new(false),
            policy: Policy::default(),
        }
    }
}

impl<B> FvmRuntime<B> {
    /// Records a successful caller check, failing if one was already made.
    fn mark_validated(&self) -> Result<(), ActorError> {
        if self.caller_validated.replace(true) {
            return Err(actor_error!(assertion_failed; "caller validated more than once"));
        }
        Ok(())
    }
}

/// Reads message fields through syscalls on demand.
struct FvmMessage;

impl MessageInfo for FvmMessage {
    fn caller(&self) -> Address {
        Address::new_id(fvm::message::caller())
    }

    fn value_received(&self) -> TokenAmount {
        fvm::message::value_received()
    }
}

impl<B> Runtime for FvmRuntime<B>
where
    B: Blockstore,
{
    type Blockstore = B;

    fn message(&self) -> &dyn MessageInfo {
        &FvmMessage
    }

    fn validate_immediate_caller_accept_any(&self) -> Result<(), ActorError> {
        self.mark_validated()
    }

    fn validate_immediate_caller_is<'a, I>(&self, addresses: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        let caller = self.message().caller();
        if !addresses.into_iter().any(|a| *a == caller) {
            return Err(actor_error!(forbidden; "caller {} is not permitted", caller));
        }
        self.mark_validated()
    }

    fn validate_immediate_caller_type<'a, I>(&self, types: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Type>,
    {
        let caller = self.message().caller();
        let typ = fvm::actor::get_actor_code_cid(&caller)
            .and_then(|code| fvm::actor::get_builtin_actor_type(&code))
            .and_then(Type::from_i32)
            .with_context_code(ExitCode::USR_FORBIDDEN, || {
                format!("caller {} is not a builtin actor", caller)
            })?;
        if !types.into_iter().any(|t| *t == typ) {
            return Err(actor_error!(forbidden;
                "caller {} of type {} is not permitted", caller, typ.name()));
        }
        self.mark_validated()
    }

    fn get_state_root(&self) -> Result<Cid, ActorError> {
        Ok(fvm::sself::root()?)
    }

    fn set_state_root(&self, root: &Cid) -> Result<(), ActorError> {
        Ok(fvm::sself::set_root(root)?)
    }

    fn transaction<S, RT, F>(&self, f: F) -> Result<RT, ActorError>
    where
        S: Serialize + DeserializeOwned,
        F: FnOnce(&mut S, &Self) -> Result<RT, ActorError>,
    {
        let mut state: S = self.state()?;
        self.in_transaction.set(true);
        let result = f(&mut state, self);
        self.in_transaction.set(false);

        let ret = result?;
        let root = self
            .blockstore
            .put_cbor(&state, Code::Blake2b256)
            .context_code(ExitCode::USR_ILLEGAL_STATE, "failed to write state")?;
        self.set_state_root(&root)?;
        Ok(ret)
    }

    fn store(&self) -> &B {
        &self.blockstore
    }

    fn send(
        &self,
        to: &Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
    ) -> Result<Response, SendError> {
        if self.in_transaction.get() {
            return Err(SendError(ErrorNumber::IllegalOperation));
        }
        fvm::send::send(to, method, params, value, None, SendFlags::empty()).map_err(SendError)
    }

    fn get_code_cid_for_type(&self, typ: Type) -> Cid {
        fvm::actor::get_code_cid_for_type(typ as i32)
    }
}

impl<B> Primitives for FvmRuntime<B>
where
    B: Blockstore,
{
    fn verify_signature(
        &self,
        signature: &Signature,
        signer: &Address,
        plaintext: &[u8],
    ) -> anyhow::Result<()> {
        match fvm::crypto::verify_signature(signature, signer, plaintext) {
            Ok(true) => Ok(()),
            Ok(false) => Err(anyhow!("signature does not match {}", signer)),
            Err(e) => Err(anyhow!("signature check failed: {}", e)),
        }
    }
}

impl<B> RuntimePolicy for FvmRuntime<B> {
    fn policy(&self) -> &Policy {
        &self.policy
    }
}

/// Entry point shared by actors compiled to Wasm. Reads the method and params from the
/// message, invokes the actor, and either aborts with the actor's exit code or returns
/// the handle of the written return block.
pub fn trampoline<C: ActorCode>(params: u32) -> u32 {
    init_logging(C::name());

    std::panic::set_hook(Box::new(|info| {
        fvm::vm::abort(ExitCode::USR_ASSERTION_FAILED.value(), Some(&format!("{}", info)))
    }));

    let method = fvm::message::method_number();
    let params = fvm::message::params_raw(params).unwrap_or_else(|e| {
        let msg = format!("params block invalid: {}", e);
        fvm::vm::abort(ExitCode::USR_SERIALIZATION.value(), Some(&msg))
    });

    let rt = FvmRuntime::default();
    let ret = C::invoke_method(&rt, method, params)
        .unwrap_or_else(|err| fvm::vm::abort(err.exit_code().value(), Some(err.msg())));

    // Checked after the error path, as a method may fail before it could validate the caller.
    if !rt.caller_validated.get() {
        fvm::vm::abort(ExitCode::USR_ASSERTION_FAILED.value(), Some("failed to validate caller"))
    }

    match ret {
        None => NO_DATA_BLOCK_ID,
        Some(ret_block) => fvm::ipld::put_block(ret_block.codec, ret_block.data.as_slice())
            .unwrap_or_else(|e| {
                let msg = format!("failed to write result: {}", e);
                fvm::vm::abort(ExitCode::USR_SERIALIZATION.value(), Some(&msg))
            }),
    }
}

/// Routes `log` records to the debug syscall, prefixed with the actor name and level.
/// Nothing is installed unless the VM has debugging enabled.
fn init_logging(actor: &'static str) {
    struct Logger {
        actor: &'static str,
    }

    impl log::Log for Logger {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            let msg = format!("{} [{}] {}", self.actor, record.level(), record.args());
            fvm::debug::log(msg);
        }

        fn flush(&self) {}
    }

    if fvm::debug::enabled() {
        // A logger can only be installed once per instance; a second attempt is harmless.
        if log::set_boxed_logger(Box::new(Logger { actor })).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    }
}
