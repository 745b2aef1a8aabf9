//! Prototype embedding index: one L2-normalized embedding per identity,
//! searched by cosine similarity.
//!
//! Two interchangeable backends implement [`VecIndex`]:
//!
//! - [`FlatIndex`]: exact, exhaustive scan. O(1) amortized adds.
//! - [`IvfIndex`]: approximate, k-means partitioned inverted lists for
//!   large collections (crate feature `ivf`, on by default).
//!
//! [`PrototypeIndex`] picks one of them from a count hint, adds
//! reader/writer locking and a query cache, and is what callers hold.
//! Removing a prototype rebuilds the backend from the remaining ones and
//! costs O(n).

mod cache;
pub mod cosine;
pub mod error;
pub mod flat;
pub mod index;
#[cfg(feature = "ivf")]
pub mod ivf;
pub mod snapshot;
pub mod vecstore;

pub use cosine::{cosine_similarity, dot, l2_normalize, normalized};
pub use error::VecError;
pub use flat::FlatIndex;
pub use index::{
    approximate_available, Backend, BackendKind, IndexConfig, IndexReader, PrototypeIndex,
};
#[cfg(feature = "ivf")]
pub use ivf::{IvfConfig, IvfIndex};
pub use snapshot::{load as load_snapshot, save as save_snapshot, Snapshot};
pub use vecstore::{Prototype, SearchResult, VecIndex};
