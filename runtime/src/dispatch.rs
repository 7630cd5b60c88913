// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use castaway::cast;
use std::marker::PhantomData;

use fvm_ipld_encoding::ipld_block::IpldBlock;
use serde::{Deserialize, Serialize};

use crate::{actor_error, ActorError};

/// Generates `ActorCode::invoke_method` from a table of method variants and the
/// `Self` functions that handle them:
///
/// ```ignore
/// impl ActorCode for Actor {
///     type Methods = Method;
///     actor_dispatch! {
///         Constructor => constructor,
///         AddAsk => add_ask,
///     }
/// }
/// ```
///
/// Unknown method numbers fail with `USR_UNHANDLED_MESSAGE`.
#[macro_export]
macro_rules! actor_dispatch {
    ($($method:ident => $func:ident,)*) => {
        fn invoke_method<RT>(
            rt: &RT,
            method: fvm_shared::MethodNum,
            args: Option<fvm_ipld_encoding::ipld_block::IpldBlock>,
        ) -> Result<Option<fvm_ipld_encoding::ipld_block::IpldBlock>, $crate::ActorError>
        where
            RT: $crate::runtime::Runtime,
        {
            match <Self::Methods as num_traits::FromPrimitive>::from_u64(method) {
                $(Some(Self::Methods::$method) => $crate::dispatch(rt, Self::$func, &args),)*
                None => Err($crate::actor_error!(unhandled_message; "no method {}", method)),
            }
        }
    };
}

/// A handler that can be invoked with an optional params block.
/// Implemented for handlers taking no params and for those taking one.
pub trait Dispatch<'de, RT> {
    fn call(self, rt: &RT, args: &'de Option<IpldBlock>) -> Result<Option<IpldBlock>, ActorError>;
}

pub struct Dispatcher<F, A> {
    func: F,
    _marker: PhantomData<fn(A)>,
}

/// Decodes the params a handler expects, calls it, and encodes what it returns.
/// A `()` return produces no block.
#[doc(hidden)]
pub fn dispatch<'de, F, A, RT>(
    rt: &RT,
    func: F,
    arg: &'de Option<IpldBlock>,
) -> Result<Option<IpldBlock>, ActorError>
where
    Dispatcher<F, A>: Dispatch<'de, RT>,
{
    Dispatcher { func, _marker: PhantomData }.call(rt, arg)
}

fn into_block<T: Serialize>(v: T) -> Result<Option<IpldBlock>, ActorError> {
    if cast!(&v, &()).is_ok() {
        return Ok(None);
    }
    Ok(IpldBlock::serialize_cbor(&v)?)
}

impl<'de, F, R, RT> Dispatch<'de, RT> for Dispatcher<F, ()>
where
    F: FnOnce(&RT) -> Result<R, ActorError>,
    R: Serialize,
{
    fn call(self, rt: &RT, args: &'de Option<IpldBlock>) -> Result<Option<IpldBlock>, ActorError> {
        if args.is_some() {
            return Err(actor_error!(illegal_argument; "method takes no params"));
        }
        into_block((self.func)(rt)?)
    }
}

impl<'de, F, A, R, RT> Dispatch<'de, RT> for Dispatcher<F, (A,)>
where
    F: FnOnce(&RT, A) -> Result<R, ActorError>,
    A: Deserialize<'de>,
    R: Serialize,
{
    fn call(self, rt: &RT, args: &'de Option<IpldBlock>) -> Result<Option<IpldBlock>, ActorError> {
        let params = args
            .as_ref()
            .ok_or_else(|| actor_error!(illegal_argument; "method requires params"))?
            .deserialize()?;
        into_block((self.func)(rt, params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_shared::error::ExitCode;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct OrderQuery {
        id: u64,
    }

    struct Book;

    fn lookup(_: &Book, q: OrderQuery) -> Result<u64, ActorError> {
        Ok(q.id + 1)
    }

    fn touch(_: &Book) -> Result<(), ActorError> {
        Ok(())
    }

    #[test]
    fn dispatches_by_arity() {
        let rt = Book;
        let arg = IpldBlock::serialize_cbor(&OrderQuery { id: 41 }).unwrap();

        let ret = dispatch(&rt, lookup, &arg).unwrap();
        assert_eq!(42u64, ret.unwrap().deserialize::<u64>().unwrap());
        assert!(dispatch(&rt, touch, &None).unwrap().is_none());

        let err = dispatch(&rt, lookup, &None).unwrap_err();
        assert_eq!(ExitCode::USR_ILLEGAL_ARGUMENT, err.exit_code());
        let err = dispatch(&rt, touch, &arg).unwrap_err();
        assert_eq!(ExitCode::USR_ILLEGAL_ARGUMENT, err.exit_code());
    }

    #[test]
    fn malformed_params_are_serialization_errors() {
        let rt = Book;
        let arg = IpldBlock::serialize_cbor(&"not a query").unwrap();
        let err = dispatch(&rt, lookup, &arg).unwrap_err();
        assert_eq!(ExitCode::USR_SERIALIZATION, err.exit_code());
    }
}
