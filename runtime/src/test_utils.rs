// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use core::fmt;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

use anyhow::{anyhow, ensure};
use cid::multihash::{Code, Multihash as OtherMultihash};
use cid::Cid;
use fvm_ipld_blockstore::MemoryBlockstore;
use fvm_ipld_encoding::ipld_block::IpldBlock;
use fvm_ipld_encoding::CborStore;
use fvm_shared::address::Address;
use fvm_shared::crypto::signature::{Signature, SignatureType};
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::{ErrorNumber, ExitCode};
use fvm_shared::{MethodNum, Response};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::runtime::builtins::Type;
use crate::runtime::{
    ActorCode, MessageInfo, Policy, Primitives, Runtime, RuntimePolicy, EMPTY_ARR_CID,
};
use crate::{actor_error, ActorError, SendError};

lazy_static! {
    pub static ref SYSTEM_ACTOR_CODE_ID: Cid = make_builtin(b"fil/test/system");
    pub static ref INIT_ACTOR_CODE_ID: Cid = make_builtin(b"fil/test/init");
    pub static ref ACCOUNT_ACTOR_CODE_ID: Cid = make_builtin(b"fil/test/account");
    pub static ref MINER_ACTOR_CODE_ID: Cid = make_builtin(b"fil/test/storageminer");
    pub static ref MARKET_ACTOR_CODE_ID: Cid = make_builtin(b"fil/test/storagemarket");
    pub static ref MULTISIG_ACTOR_CODE_ID: Cid = make_builtin(b"fil/test/multisig");
    pub static ref ACTOR_TYPES: BTreeMap<Cid, Type> = [
        (*SYSTEM_ACTOR_CODE_ID, Type::System),
        (*INIT_ACTOR_CODE_ID, Type::Init),
        (*ACCOUNT_ACTOR_CODE_ID, Type::Account),
        (*MINER_ACTOR_CODE_ID, Type::StorageMiner),
        (*MARKET_ACTOR_CODE_ID, Type::StorageMarket),
        (*MULTISIG_ACTOR_CODE_ID, Type::Multisig),
    ]
    .into_iter()
    .collect();
    pub static ref ACTOR_CODES: BTreeMap<Type, Cid> =
        ACTOR_TYPES.iter().map(|(cid, typ)| (*typ, *cid)).collect();
}

const IPLD_RAW: u64 = 0x55;

/// Returns an identity CID for bz.
pub fn make_builtin(bz: &[u8]) -> Cid {
    Cid::new_v1(IPLD_RAW, OtherMultihash::wrap(0, bz).expect("name too long"))
}

/// Installs an env-configured logger for tests. Safe to call more than once.
pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

pub struct MockRuntime {
    pub caller: RefCell<Address>,
    pub caller_type: RefCell<Cid>,
    pub value_received: RefCell<TokenAmount>,

    // Actor State
    pub state: RefCell<Option<Cid>>,
    pub balance: RefCell<TokenAmount>,

    // VM Impl
    pub in_call: RefCell<bool>,
    pub store: MemoryBlockstore,
    pub in_transaction: RefCell<bool>,
    pub caller_validated: RefCell<bool>,

    // Expectations
    pub expectations: RefCell<Expectations>,

    // policy
    pub policy: Policy,
}

#[derive(Default)]
pub struct Expectations {
    pub expect_validate_caller_any: bool,
    pub expect_validate_caller_addr: Option<Vec<Address>>,
    pub expect_validate_caller_type: Option<Vec<Type>>,
    pub expect_sends: VecDeque<ExpectedMessage>,
    pub expect_verify_sigs: VecDeque<ExpectedVerifySig>,
}

impl Expectations {
    fn reset(&mut self) {
        *self = Default::default();
    }

    fn verify(&mut self) {
        assert!(!self.expect_validate_caller_any, "expected ValidateCallerAny, not received");
        assert!(
            self.expect_validate_caller_addr.is_none(),
            "expected ValidateCallerAddr {:?}, not received",
            self.expect_validate_caller_addr
        );
        assert!(
            self.expect_validate_caller_type.is_none(),
            "expected ValidateCallerType {:?}, not received",
            self.expect_validate_caller_type
        );
        assert!(
            self.expect_sends.is_empty(),
            "expected all message to be send, unsent messages {:?}",
            self.expect_sends
        );
        assert!(
            self.expect_verify_sigs.is_empty(),
            "expect_verify_sigs: {:?}, not received",
            self.expect_verify_sigs
        );
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            caller: RefCell::new(Address::new_id(0)),
            caller_type: RefCell::new(Default::default()),
            value_received: Default::default(),
            state: Default::default(),
            balance: Default::default(),
            in_call: Default::default(),
            store: Default::default(),
            in_transaction: Default::default(),
            caller_validated: Default::default(),
            expectations: Default::default(),
            policy: Default::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExpectedMessage {
    pub to: Address,
    pub method: MethodNum,
    pub params: Option<IpldBlock>,
    pub value: TokenAmount,

    // returns from applying expectedMessage
    pub send_return: Option<IpldBlock>,
    pub exit_code: ExitCode,
}

#[derive(Debug)]
pub struct ExpectedVerifySig {
    pub sig: Signature,
    pub signer: Address,
    pub plaintext: Vec<u8>,
    pub result: Result<(), anyhow::Error>,
}

pub fn expect_abort_contains_message<T: fmt::Debug>(
    expect_exit_code: ExitCode,
    expect_msg: &str,
    res: Result<T, ActorError>,
) {
    let err = res.expect_err(&format!(
        "expected abort with exit code {}, but call succeeded",
        expect_exit_code
    ));
    assert_eq!(
        err.exit_code(),
        expect_exit_code,
        "expected failure with exit code {}, but failed with exit code {}; error message: {}",
        expect_exit_code,
        err.exit_code(),
        err.msg(),
    );
    let err_msg = err.msg();
    assert!(
        err.msg().contains(expect_msg),
        "expected err message '{}' to contain '{}'",
        err_msg,
        expect_msg,
    );
}

pub fn expect_abort<T: fmt::Debug>(exit_code: ExitCode, res: Result<T, ActorError>) {
    expect_abort_contains_message(exit_code, "", res);
}

impl MockRuntime {
    ///// Runtime access for tests /////

    pub fn get_state<T: DeserializeOwned>(&self) -> T {
        self.store_get(self.state.borrow().as_ref().unwrap())
    }

    pub fn replace_state<T: Serialize>(&self, obj: &T) {
        self.state.replace(Some(self.store_put(obj)));
    }

    pub fn set_balance(&self, amount: TokenAmount) {
        self.balance.replace(amount);
    }

    pub fn set_received(&self, amount: TokenAmount) {
        self.value_received.replace(amount);
    }

    pub fn set_caller(&self, code_id: Cid, address: Address) {
        self.caller.replace(address);
        self.caller_type.replace(code_id);
    }

    /// Invokes a method as the VM would. State changes are discarded if the method fails,
    /// and a successful method must have validated its caller.
    pub fn call<A: ActorCode>(
        &self,
        method_num: MethodNum,
        params: Option<IpldBlock>,
    ) -> Result<Option<IpldBlock>, ActorError> {
        self.in_call.replace(true);
        self.caller_validated.replace(false);
        let prev_state = *self.state.borrow();
        let res = A::invoke_method(self, method_num, params);

        if res.is_err() {
            self.state.replace(prev_state);
        } else {
            assert!(
                *self.caller_validated.borrow(),
                "method {} of {} returned without validating the caller",
                method_num,
                A::name()
            );
        }
        self.in_call.replace(false);
        res
    }

    /// Verifies that all mock expectations have been met.
    pub fn verify(&self) {
        self.expectations.borrow_mut().verify()
    }

    /// Clears all mock expectations.
    pub fn reset(&self) {
        self.expectations.borrow_mut().reset();
    }

    ///// Mock expectations /////

    pub fn expect_validate_caller_addr(&self, addr: Vec<Address>) {
        assert!(!addr.is_empty(), "addrs must be non-empty");
        self.expectations.borrow_mut().expect_validate_caller_addr = Some(addr);
    }

    pub fn expect_validate_caller_type(&self, types: Vec<Type>) {
        assert!(!types.is_empty(), "types must be non-empty");
        self.expectations.borrow_mut().expect_validate_caller_type = Some(types);
    }

    pub fn expect_validate_caller_any(&self) {
        self.expectations.borrow_mut().expect_validate_caller_any = true;
    }

    pub fn expect_verify_signature(&self, exp: ExpectedVerifySig) {
        self.expectations.borrow_mut().expect_verify_sigs.push_back(exp);
    }

    pub fn expect_send(
        &self,
        to: Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
        send_return: Option<IpldBlock>,
        exit_code: ExitCode,
    ) {
        self.expectations.borrow_mut().expect_sends.push_back(ExpectedMessage {
            to,
            method,
            params,
            value,
            send_return,
            exit_code,
        })
    }

    ///// Private helpers /////

    fn require_in_call(&self) {
        assert!(*self.in_call.borrow(), "invalid runtime invocation outside of method call")
    }

    fn mark_validated(&self) {
        assert!(!*self.caller_validated.borrow(), "caller validated more than once");
        self.caller_validated.replace(true);
    }

    fn store_put<T: Serialize>(&self, o: &T) -> Cid {
        self.store.put_cbor(&o, Code::Blake2b256).unwrap()
    }

    fn store_get<T: DeserializeOwned>(&self, cid: &Cid) -> T {
        self.store.get_cbor(cid).unwrap().unwrap()
    }
}

impl MessageInfo for MockRuntime {
    fn caller(&self) -> Address {
        *self.caller.borrow()
    }
    fn value_received(&self) -> TokenAmount {
        self.value_received.borrow().clone()
    }
}

impl Runtime for MockRuntime {
    type Blockstore = MemoryBlockstore;

    fn message(&self) -> &dyn MessageInfo {
        self.require_in_call();
        self
    }

    fn validate_immediate_caller_accept_any(&self) -> Result<(), ActorError> {
        self.require_in_call();
        assert!(
            self.expectations.borrow().expect_validate_caller_any,
            "unexpected validate-caller-any"
        );
        self.expectations.borrow_mut().expect_validate_caller_any = false;
        self.mark_validated();
        Ok(())
    }

    fn validate_immediate_caller_is<'a, I>(&self, addresses: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        self.require_in_call();

        let addrs: Vec<Address> = addresses.into_iter().cloned().collect();
        let expected_addrs = self
            .expectations
            .borrow_mut()
            .expect_validate_caller_addr
            .take()
            .expect("unexpected validate caller addrs");
        assert_eq!(
            addrs, expected_addrs,
            "unexpected validate caller addrs {:?}, expected {:?}",
            addrs, expected_addrs
        );

        let caller = self.caller();
        if addrs.contains(&caller) {
            self.mark_validated();
            return Ok(());
        }
        Err(actor_error!(forbidden;
                "caller address {:?} forbidden, allowed: {:?}",
                caller, &addrs
        ))
    }

    fn validate_immediate_caller_type<'a, I>(&self, types: I) -> Result<(), ActorError>
    where
        I: IntoIterator<Item = &'a Type>,
    {
        self.require_in_call();

        let types: Vec<Type> = types.into_iter().cloned().collect();
        let expected_types = self
            .expectations
            .borrow_mut()
            .expect_validate_caller_type
            .take()
            .expect("unexpected validate caller code");
        assert_eq!(
            types, expected_types,
            "unexpected validate caller code {:?}, expected {:?}",
            types, expected_types,
        );

        let caller_type = *self.caller_type.borrow();
        match ACTOR_TYPES.get(&caller_type) {
            Some(typ) if types.contains(typ) => {
                self.mark_validated();
                Ok(())
            }
            _ => Err(actor_error!(forbidden; "caller type {:?} forbidden, allowed: {:?}",
                caller_type, types)),
        }
    }

    fn get_state_root(&self) -> Result<Cid, ActorError> {
        Ok(self.state.borrow().unwrap_or(*EMPTY_ARR_CID))
    }

    fn set_state_root(&self, root: &Cid) -> Result<(), ActorError> {
        self.state.replace(Some(*root));
        Ok(())
    }

    fn transaction<S, RT, F>(&self, f: F) -> Result<RT, ActorError>
    where
        S: Serialize + DeserializeOwned,
        F: FnOnce(&mut S, &Self) -> Result<RT, ActorError>,
    {
        if *self.in_transaction.borrow() {
            return Err(actor_error!(assertion_failed; "nested transaction"));
        }
        let mut read_only = self.state()?;
        self.in_transaction.replace(true);
        let ret = f(&mut read_only, self);
        if ret.is_ok() {
            self.state.replace(Some(self.store_put(&read_only)));
        }
        self.in_transaction.replace(false);
        ret
    }

    fn store(&self) -> &MemoryBlockstore {
        &self.store
    }

    fn send(
        &self,
        to: &Address,
        method: MethodNum,
        params: Option<IpldBlock>,
        value: TokenAmount,
    ) -> Result<Response, SendError> {
        self.require_in_call();
        if *self.in_transaction.borrow() {
            return Err(SendError(ErrorNumber::IllegalOperation));
        }

        let expected_msg = self.expectations.borrow_mut().expect_sends.pop_front();
        let expected_msg = expected_msg.unwrap_or_else(|| {
            panic!(
                "unexpected message to: {:?} method: {:?}, value: {:?}, params: {:?}",
                to, method, value, params
            )
        });

        assert!(
            expected_msg.to == *to
                && expected_msg.method == method
                && expected_msg.params == params
                && expected_msg.value == value,
            "message being sent does not match expectation.\n\
             Message  - to: {:?}, method: {:?}, value: {:?}, params: {:?}\n\
             Expected - to: {:?}, method: {:?}, value: {:?}, params: {:?}",
            to,
            method,
            value,
            params,
            expected_msg.to,
            expected_msg.method,
            expected_msg.value,
            expected_msg.params,
        );

        {
            let mut balance = self.balance.borrow_mut();
            if value > *balance {
                return Err(SendError(ErrorNumber::InsufficientFunds));
            }
            *balance -= value;
        }

        Ok(Response { exit_code: expected_msg.exit_code, return_data: expected_msg.send_return })
    }

    fn get_code_cid_for_type(&self, typ: Type) -> Cid {
        self.require_in_call();
        ACTOR_CODES.get(&typ).cloned().unwrap()
    }
}

impl Primitives for MockRuntime {
    fn verify_signature(
        &self,
        signature: &Signature,
        signer: &Address,
        plaintext: &[u8],
    ) -> anyhow::Result<()> {
        let exp = self.expectations.borrow_mut().expect_verify_sigs.pop_front();
        let exp = exp.unwrap_or_else(|| {
            panic!(
                "unexpected signature verification sig: {:?}, signer: {}, plaintext: {}",
                signature,
                signer,
                hex::encode(plaintext)
            )
        });
        if exp.sig != *signature || exp.signer != *signer || &exp.plaintext[..] != plaintext {
            panic!(
                "unexpected signature verification\n\
                sig: {:?}, signer: {}, plaintext: {}\n\
                expected sig: {:?}, signer: {}, plaintext: {}",
                signature,
                signer,
                hex::encode(plaintext),
                exp.sig,
                exp.signer,
                hex::encode(exp.plaintext)
            )
        }
        exp.result
    }
}

impl RuntimePolicy for MockRuntime {
    fn policy(&self) -> &Policy {
        &self.policy
    }
}

pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_simd::Params::new()
        .hash_length(32)
        .to_state()
        .update(data)
        .finalize()
        .as_bytes()
        .try_into()
        .unwrap()
}

/// A deterministic secp256k1 key for producing real signatures in tests.
pub struct SecpKey {
    secret: libsecp256k1::SecretKey,
    pub address: Address,
}

impl SecpKey {
    /// Derives a key from a non-zero seed byte.
    pub fn new(seed: u8) -> Self {
        assert_ne!(seed, 0, "seed must be non-zero");
        let secret = libsecp256k1::SecretKey::parse(&[seed; 32]).unwrap();
        let public = libsecp256k1::PublicKey::from_secret_key(&secret);
        let address = Address::new_secp256k1(&public.serialize()).unwrap();
        SecpKey { secret, address }
    }

    /// Signs the blake2b-256 digest of data, appending the recovery id to the signature.
    pub fn sign(&self, data: &[u8]) -> Signature {
        let msg = libsecp256k1::Message::parse(&blake2b_256(data));
        let (sig, recovery_id) = libsecp256k1::sign(&msg, &self.secret);
        let mut bytes = sig.serialize().to_vec();
        bytes.push(recovery_id.serialize());
        Signature::new_secp256k1(bytes)
    }
}

/// Checks a signature made by [`SecpKey::sign`] by recovering the signer's address.
pub fn verify_secp_signature(
    signature: &Signature,
    signer: &Address,
    plaintext: &[u8],
) -> anyhow::Result<()> {
    ensure!(signature.sig_type == SignatureType::Secp256k1, "not a secp256k1 signature");
    ensure!(signature.bytes.len() == 65, "invalid signature length {}", signature.bytes.len());

    let msg = libsecp256k1::Message::parse(&blake2b_256(plaintext));
    let sig = libsecp256k1::Signature::parse_standard_slice(&signature.bytes[..64])
        .map_err(|e| anyhow!("invalid signature: {:?}", e))?;
    let recovery_id = libsecp256k1::RecoveryId::parse(signature.bytes[64])
        .map_err(|e| anyhow!("invalid recovery id: {:?}", e))?;
    let public = libsecp256k1::recover(&msg, &sig, &recovery_id)
        .map_err(|e| anyhow!("failed to recover public key: {:?}", e))?;
    let recovered = Address::new_secp256k1(&public.serialize())?;
    ensure!(recovered == *signer, "signature is from {}, not {}", recovered, signer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secp_signatures_verify_for_their_signer_only() {
        let alice = SecpKey::new(1);
        let bob = SecpKey::new(2);
        let sig = alice.sign(b"deal bytes");

        verify_secp_signature(&sig, &alice.address, b"deal bytes").unwrap();
        assert!(verify_secp_signature(&sig, &bob.address, b"deal bytes").is_err());
        assert!(verify_secp_signature(&sig, &alice.address, b"other bytes").is_err());
    }

    #[test]
    fn builtin_codes_resolve_both_ways() {
        for (typ, cid) in ACTOR_CODES.iter() {
            assert_eq!(Some(typ), ACTOR_TYPES.get(cid));
        }
        assert_eq!(ACTOR_TYPES.len(), ACTOR_CODES.len());
    }
}
