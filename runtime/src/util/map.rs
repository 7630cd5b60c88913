// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt::Debug;
use std::marker::PhantomData;

use anyhow::anyhow;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_hamt as hamt;
use fvm_shared::address::Address;
use fvm_shared::error::ExitCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::builtin::HAMT_BIT_WIDTH;
use crate::{ActorError, AsActorError, AsActorErrors, Hasher};

/// A HAMT with typed keys. Storage failures surface as illegal state, and
/// messages name the index they came from.
pub struct Map2<BS, K, V>
where
    BS: Blockstore,
    K: MapKey,
    V: DeserializeOwned + Serialize,
{
    hamt: hamt::Hamt<BS, V, hamt::BytesKey, Hasher>,
    name: &'static str,
    key_type: PhantomData<K>,
}

/// A typed key with a canonical byte encoding.
/// `from_bytes` must reject anything `to_bytes` would never produce.
pub trait MapKey: Sized + Debug {
    fn from_bytes(b: &[u8]) -> Result<Self, String>;
    fn to_bytes(&self) -> Result<Vec<u8>, String>;
}

pub type Config = hamt::Config;

pub const DEFAULT_HAMT_CONFIG: Config =
    Config { bit_width: HAMT_BIT_WIDTH, min_data_depth: 0, max_array_width: 3 };

impl<BS, K, V> Map2<BS, K, V>
where
    BS: Blockstore,
    K: MapKey,
    V: DeserializeOwned + Serialize,
{
    /// Opens the index rooted at `root`. No root means nothing was written yet.
    pub fn load_or_empty(
        store: BS,
        root: &Option<Cid>,
        config: Config,
        name: &'static str,
    ) -> Result<Self, ActorError> {
        let hamt = match root {
            Some(root) => hamt::Hamt::load_with_config(root, store, config)
                .or_with_illegal_state(|| format!("failed to load {} index at {}", name, root))?,
            None => hamt::Hamt::new_with_config(store, config),
        };
        Ok(Self { hamt, name, key_type: PhantomData })
    }

    /// Writes pending changes and returns the new root.
    pub fn flush(&mut self) -> Result<Cid, ActorError> {
        let name = self.name;
        self.hamt.flush().or_with_illegal_state(|| format!("failed to flush {} index", name))
    }

    pub fn get(&self, key: &K) -> Result<Option<&V>, ActorError> {
        let k = self.key_bytes(key)?;
        self.hamt
            .get(&k)
            .or_with_illegal_state(|| format!("failed to read {:?} from {}", key, self.name))
    }

    pub fn contains_key(&self, key: &K) -> Result<bool, ActorError> {
        let k = self.key_bytes(key)?;
        self.hamt
            .contains_key(&k)
            .or_with_illegal_state(|| format!("failed to look up {:?} in {}", key, self.name))
    }

    /// Stores `value` under `key`, returning what it replaced.
    pub fn set(&mut self, key: &K, value: V) -> Result<Option<V>, ActorError>
    where
        V: PartialEq,
    {
        let k = self.key_bytes(key)?;
        let name = self.name;
        self.hamt
            .set(k.into(), value)
            .or_with_illegal_state(|| format!("failed to write {:?} to {}", key, name))
    }

    /// Stores `value` unless `key` is taken. Returns whether it was stored.
    pub fn set_if_absent(&mut self, key: &K, value: V) -> Result<bool, ActorError>
    where
        V: PartialEq,
    {
        let k = self.key_bytes(key)?;
        let name = self.name;
        self.hamt
            .set_if_absent(k.into(), value)
            .or_with_illegal_state(|| format!("failed to write {:?} to {}", key, name))
    }

    /// Visits every entry in hash order. A key that does not decode is illegal state,
    /// and an error returned by `f` stops the walk and is passed through unchanged.
    pub fn for_each<F>(&self, mut f: F) -> Result<(), ActorError>
    where
        F: FnMut(K, &V) -> Result<(), ActorError>,
    {
        let name = self.name;
        self.hamt
            .for_each(|k, v| {
                let key = K::from_bytes(k)
                    .or_with_illegal_state(|| format!("undecodable key in {}", name))?;
                f(key, v).map_err(|e| anyhow!(e))
            })
            .map_err(|err| match err {
                hamt::Error::Dynamic(e) => e.downcast::<ActorError>().unwrap_or_else(|e| {
                    ActorError::illegal_state(format!("failed to walk {}: {}", name, e))
                }),
                e => ActorError::illegal_state(format!("failed to walk {}: {}", name, e)),
            })
    }

    fn key_bytes(&self, key: &K) -> Result<Vec<u8>, ActorError> {
        key.to_bytes().with_context_code(ExitCode::USR_ASSERTION_FAILED, || {
            format!("cannot encode {:?} as a {} key", key, self.name)
        })
    }
}

impl MapKey for Address {
    fn from_bytes(b: &[u8]) -> Result<Self, String> {
        Address::from_bytes(b).map_err(|e| e.to_string())
    }

    fn to_bytes(&self) -> Result<Vec<u8>, String> {
        Ok(Address::to_bytes(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fvm_ipld_blockstore::MemoryBlockstore;

    type Owners<'a> = Map2<&'a MemoryBlockstore, Address, String>;

    #[test]
    fn missing_root_is_an_empty_index() {
        let bs = MemoryBlockstore::new();
        let mut m = Owners::load_or_empty(&bs, &None, DEFAULT_HAMT_CONFIG, "owners").unwrap();
        assert!(m.get(&Address::new_id(7)).unwrap().is_none());

        assert!(m.set_if_absent(&Address::new_id(7), "seven".to_string()).unwrap());
        assert!(!m.set_if_absent(&Address::new_id(7), "again".to_string()).unwrap());
        assert_eq!(
            Some("seven".to_string()),
            m.set(&Address::new_id(7), "replaced".to_string()).unwrap()
        );
        let root = m.flush().unwrap();

        let reloaded =
            Owners::load_or_empty(&bs, &Some(root), DEFAULT_HAMT_CONFIG, "owners").unwrap();
        assert_eq!("replaced", reloaded.get(&Address::new_id(7)).unwrap().unwrap());
        assert!(reloaded.contains_key(&Address::new_id(7)).unwrap());
        assert!(!reloaded.contains_key(&Address::new_id(8)).unwrap());
    }

    #[test]
    fn callback_errors_keep_their_code() {
        let bs = MemoryBlockstore::new();
        let mut m = Owners::load_or_empty(&bs, &None, DEFAULT_HAMT_CONFIG, "owners").unwrap();
        m.set(&Address::new_id(1), "one".to_string()).unwrap();
        let err = m.for_each(|_, _| Err(ActorError::forbidden("stop".to_string()))).unwrap_err();
        assert_eq!(ActorError::forbidden("stop".to_string()), err);
    }
}
