// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_hamt::Sha256;
use fvm_shared::error::{ErrorNumber, ExitCode};
use fvm_shared::Response;
use serde::de::DeserializeOwned;

pub use self::actor_error::*;
pub use self::builtin::*;
pub use self::util::*;

pub mod actor_error;
pub mod builtin;
pub mod runtime;
pub mod util;

mod dispatch;
#[doc(hidden)]
pub use dispatch::dispatch;

#[cfg(feature = "test_utils")]
pub mod test_utils;

/// Hashing used for all HAMT keys in actor state.
pub type Hasher = Sha256;

/// Declares the Wasm entrypoint of an actor, delegating to the FVM trampoline.
#[macro_export]
macro_rules! wasm_trampoline {
    ($target:ty) => {
        #[no_mangle]
        #[cfg(target_arch = "wasm32")]
        pub extern "C" fn invoke(param: u32) -> u32 {
            $crate::runtime::fvm::trampoline::<$target>(param)
        }
    };
}

/// The syscall error raised when a message could not be sent at all.
/// Failures of the receiving method are reported through the response exit code instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendError(pub ErrorNumber);

impl From<SendError> for ActorError {
    fn from(SendError(e): SendError) -> Self {
        match e {
            ErrorNumber::InsufficientFunds => {
                actor_error!(insufficient_funds; "not enough funds to send message")
            }
            ErrorNumber::NotFound => actor_error!(not_found; "send target does not exist"),
            ErrorNumber::IllegalOperation => {
                actor_error!(assertion_failed; "send is not permitted here: {}", e)
            }
            e => actor_error!(unspecified; "send failed: {}", e),
        }
    }
}

/// Converts the outcome of a send into the callee's return block, turning a
/// non-zero exit code into an error carrying that code.
pub fn extract_send_result(
    res: Result<Response, SendError>,
) -> Result<Option<IpldBlock>, ActorError> {
    let ret = res?;
    if ret.exit_code.is_success() {
        Ok(ret.return_data)
    } else {
        Err(ActorError::checked(ret.exit_code, format!("send aborted with code {}", ret.exit_code)))
    }
}

/// Deserializes a return block that is required to be present.
pub fn deserialize_block<T>(ret: Option<IpldBlock>) -> Result<T, ActorError>
where
    T: DeserializeOwned,
{
    ret.context_code(ExitCode::USR_ASSERTION_FAILED, "return expected")?
        .deserialize()
        .exit_code(ExitCode::USR_SERIALIZATION)
}
