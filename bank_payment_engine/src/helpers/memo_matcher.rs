//! Locates the order number that a customer embedded in a bank transfer memo.
//!
//! Customers are asked to put the order code (e.g. `DH45`) in the transfer description, but banks and customers add
//! all kinds of noise around it: names, "thanh toan", reference numbers, changed case, and separators between the
//! marker and the digits. The matcher looks for the marker, an optional single separator, and a run of digits, anywhere
//! in the memo. The first match that yields a valid order id wins.
use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::db_types::OrderId;

pub const DEFAULT_MEMO_MARKER: &str = "DH";

static DEFAULT_MATCHER: Lazy<MemoMatcher> = Lazy::new(MemoMatcher::default);

/// Extracts the order id from a memo using the default `DH` marker.
pub fn extract_order_id(memo: &str) -> Option<OrderId> {
    DEFAULT_MATCHER.extract_order_id(memo)
}

#[derive(Debug, Clone)]
pub struct MemoMatcher {
    pattern: Regex,
}

impl MemoMatcher {
    /// Creates a matcher for the given marker. The marker is matched literally and case-insensitively.
    pub fn new(marker: &str) -> Self {
        let pattern = format!(r"(?i){}[_\-:#. ]?(\d+)", regex::escape(marker.trim()));
        // The marker is escaped, so the pattern is always valid
        #[allow(clippy::expect_used)]
        let pattern = Regex::new(&pattern).expect("memo pattern is a valid regex");
        Self { pattern }
    }

    pub fn extract_order_id(&self, memo: &str) -> Option<OrderId> {
        let result = self
            .pattern
            .captures_iter(memo)
            .filter_map(|c| c.get(1))
            .find_map(|m| m.as_str().parse::<i64>().ok())
            .map(OrderId::from);
        trace!("🔍️ Memo \"{memo}\" matched order {result:?}");
        result
    }
}

impl Default for MemoMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_MARKER)
    }
}
