mod memo_matcher;

pub use memo_matcher::{extract_order_id, MemoMatcher, DEFAULT_MEMO_MARKER};
