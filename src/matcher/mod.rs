//! Route matching.
//!
//! Resolution of `(method, path)` runs in this order:
//!
//! 1. The bloom filter over static paths. A miss skips the hash index.
//! 2. The per-method hash index of literal-only patterns. A hit returns
//!    immediately without touching the trie.
//! 3. The per-method trie, preferring at every node a literal child, then a
//!    parameter child, then a wildcard. A dead end backtracks to the next
//!    candidate of the nearest ancestor.
//! 4. Without a match, the other methods are probed to tell 405 from 404.
//!
//! Per-parameter [`Constraint`]s are checked on the route the trie selected.
//! A failing constraint makes the request a 404; it never steers the trie
//! towards another branch.

mod bloom;
mod constraint;
mod pattern;
mod route;
mod table;
mod tree;

pub use constraint::Constraint;
pub use pattern::{Pattern, Segment};
pub use route::RouteEntry;
pub use table::{Lookup, RouteTable};

pub(crate) use table::allow_header;
