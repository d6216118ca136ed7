//! Profile resolver: visit count (or explicit id) → catalog profile.

use std::sync::Arc;

use evoweb_core::error::ProfileError;
use evoweb_core::profile::{InterestSet, ProfileCatalog, UserProfile};
use evoweb_core::signals::UserSignals;
use tracing::debug;

use crate::catalog::StaticCatalog;
use crate::interests::InterestTaxonomy;

/// Selects profiles from a catalog and derives interests from signals.
///
/// Pure: the same inputs always produce the same profile.
#[derive(Clone)]
pub struct ProfileResolver {
    catalog: Arc<dyn ProfileCatalog>,
    taxonomy: InterestTaxonomy,
}

impl ProfileResolver {
    pub fn new(catalog: Arc<dyn ProfileCatalog>, taxonomy: InterestTaxonomy) -> Self {
        Self { catalog, taxonomy }
    }

    /// Built-in catalog and taxonomy.
    pub fn builtin() -> Self {
        Self::new(Arc::new(StaticCatalog::builtin()), InterestTaxonomy::builtin())
    }

    pub fn catalog(&self) -> &dyn ProfileCatalog {
        self.catalog.as_ref()
    }

    /// Resolve the profile for a visit.
    ///
    /// An `explicit_profile_id` that names a catalog entry wins. Otherwise the
    /// entry at `(visit_count - 1) % catalog_len` is returned. `signals` do not
    /// influence selection.
    ///
    /// `visit_count` must be at least 1; callers clamp before calling.
    pub fn resolve_profile(
        &self,
        visit_count: u32,
        _signals: &UserSignals,
        explicit_profile_id: Option<&str>,
    ) -> Result<UserProfile, ProfileError> {
        if visit_count < 1 {
            return Err(ProfileError::InvalidArgument(format!(
                "visit_count must be >= 1, got {visit_count}"
            )));
        }

        if let Some(profile) = explicit_profile_id.and_then(|id| self.catalog.find(id)) {
            debug!(profile = %profile.id, "Using explicit profile");
            return Ok(profile.clone());
        }

        if self.catalog.is_empty() {
            return Err(ProfileError::EmptyCatalog);
        }

        let index = (visit_count as usize - 1) % self.catalog.len();
        let profile = self.catalog.get(index).ok_or(ProfileError::EmptyCatalog)?;
        debug!(visit_count, index, profile = %profile.id, "Rotated profile");
        Ok(profile.clone())
    }

    /// Interests inferred from signal keys, in taxonomy order.
    pub fn derive_interests(&self, signals: &UserSignals) -> InterestSet {
        self.taxonomy.derive(signals)
    }
}

impl Default for ProfileResolver {
    fn default() -> Self {
        Self::builtin()
    }
}
