//! `storefront-core`: domain foundation building blocks.
//!
//! Pure domain primitives shared by the catalog and shop crates (no IO).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, UserId};
pub use money::{Money, ensure_storable, max_money, round_money};
