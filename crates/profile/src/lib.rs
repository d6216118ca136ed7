//! Profile resolution for EvoWeb.
//!
//! Turns raw signals and a visit counter into a stable [`UserProfile`] and an
//! ordered [`InterestSet`].
//!
//! [`UserProfile`]: evoweb_core::UserProfile
//! [`InterestSet`]: evoweb_core::InterestSet

pub mod catalog;
pub mod interests;
pub mod resolver;

pub use catalog::StaticCatalog;
pub use interests::{InterestRule, InterestTaxonomy};
pub use resolver::ProfileResolver;
