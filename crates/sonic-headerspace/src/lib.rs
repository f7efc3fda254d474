//! Symbolic packet header spaces.
//!
//! A [`HeaderSpace`] is a possibly-infinite set of packet headers, stored as
//! a finite union of [`Cube`]s. Each cube is a conjunction of one
//! [`IntervalSet`] per [`HeaderField`]. The representation is closed under
//! intersection, union and difference, which is what line-reachability
//! analysis needs.
//!
//! ```text
//! HeaderSpace = Cube ∪ Cube ∪ ...
//! Cube        = srcIp ∈ S₀ ∧ dstIp ∈ S₁ ∧ ... ∧ fragmentOffset ∈ S₉
//! Sᵢ          = [a, b] ∪ [c, d] ∪ ...   (IntervalSet)
//! ```
//!
//! A concrete [`Flow`] is one point in that space.

mod cube;
mod error;
mod field;
mod flow;
mod interval;
mod space;

pub use cube::Cube;
pub use error::SpaceError;
pub use field::{HeaderField, FIELD_COUNT};
pub use flow::Flow;
pub use interval::IntervalSet;
pub use space::HeaderSpace;
