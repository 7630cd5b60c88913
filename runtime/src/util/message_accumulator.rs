// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

/// Collects the violations found while checking state invariants.
#[derive(Default)]
pub struct MessageAccumulator {
    /// Shared with accumulators derived through `with_prefix()`.
    msgs: Rc<RefCell<Vec<String>>>,
    /// Prefix for every new message, e.g. the state component being checked.
    prefix: String,
}

impl MessageAccumulator {
    /// Returns an accumulator backed by the same collection that prefixes each new message.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        MessageAccumulator { msgs: self.msgs.clone(), prefix: self.prefix.to_owned() + prefix }
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.borrow().is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.msgs.borrow().to_owned()
    }

    pub fn add(&self, msg: &str) {
        self.msgs.borrow_mut().push(format!("{}{msg}", self.prefix));
    }

    /// Adds a message if predicate is false
    pub fn require(&self, predicate: bool, msg: &str) {
        if !predicate {
            self.add(msg);
        }
    }

    /// Adds a message if result is `Err`.
    pub fn require_no_error<V, E: Display>(&self, result: Result<V, E>, msg: &str) {
        if let Err(e) = result {
            self.add(&format!("{msg}: {e}"));
        }
    }

    /// Panics listing every accumulated message, if there are any.
    pub fn assert_empty(&self) {
        assert!(self.is_empty(), "{}", self.messages().join("\n"));
    }

    /// Panics unless the accumulated messages match the patterns one for one.
    pub fn assert_expected(&self, expected_patterns: &[&str]) {
        let messages = self.messages();
        assert_eq!(
            messages.len(),
            expected_patterns.len(),
            "wrong message count, got:\n{}",
            messages.join("\n")
        );
        for (msg, pattern) in messages.iter().zip(expected_patterns) {
            assert!(msg.contains(pattern), "message '{}' does not contain '{}'", msg, pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_on_predicate() {
        let acc = MessageAccumulator::default();
        acc.require(true, "ask 0 has an owner");
        assert!(acc.is_empty());

        acc.require(false, "bid 3 is overdrawn");
        assert_eq!(acc.messages(), vec!["bid 3 is overdrawn"]);
        assert!(!acc.is_empty());
    }

    #[test]
    fn require_no_error() {
        let failed: Result<(), String> = Err("missing root".to_owned());
        let acc = MessageAccumulator::default();
        acc.require_no_error(failed, "loading deals");
        assert_eq!(acc.messages(), vec!["loading deals: missing root"]);
    }

    #[test]
    fn prefixes_share_messages() {
        let acc = MessageAccumulator::default();
        acc.add("state");

        let asks = acc.with_prefix("asks: ");
        asks.add("duplicate id");

        assert_eq!(acc.messages(), vec!["state", "asks: duplicate id"]);
        asks.assert_expected(&["state", "duplicate"]);
    }
}
