//! Confidence-gated assignment of face embeddings to known identities.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use faceid_assign::{Action, AssignConfig, PrototypeAssigner};
//! use faceid_vecstore::{IndexConfig, PrototypeIndex};
//!
//! let index = Arc::new(PrototypeIndex::open(
//!     IndexConfig { dim: 3, ..IndexConfig::default() },
//!     0,
//! ));
//! index.add("person:001", &[1.0, 0.0, 0.0], Some("Ada")).unwrap();
//!
//! let assigner = PrototypeAssigner::new(index, AssignConfig::default()).unwrap();
//! let decision = assigner.assign(&[0.9, 0.1, 0.0]).unwrap();
//! assert_eq!(decision.action, Action::AutoAssign);
//! ```
//!
//! # Design
//!
//! Each decision is independent: the assigner queries up to `top_k`
//! candidates at or above `review_min` and maps the best one to
//! [`Action::AutoAssign`] (>= `auto_assign_min`), [`Action::Review`], or
//! [`Action::Unknown`]. "Unknown" is a result, never an error.

mod assigner;
mod decision;
mod error;

pub use assigner::{decide, AssignConfig, PrototypeAssigner};
pub use decision::{Action, Decision};
pub use error::AssignError;
