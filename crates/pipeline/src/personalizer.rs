//! End-to-end personalization of one page load.
//!
//! Order is fixed: claim the generation slot, record the visit, resolve the
//! profile, derive interests, build the prompt, generate, then cache what was
//! shown. A request turned away as busy records nothing.
//!
//! Visit history and the cached page live either in the store's shared key
//! space ([`Personalizer::personalize`], one visitor per store) or under a
//! visitor id ([`Personalizer::personalize_for`], many visitors per store).

use std::path::Path;
use std::sync::Arc;

use evoweb_config::AppConfig;
use evoweb_core::error::{Error, Result};
use evoweb_core::generation::{GenerationRequest, GenerationResult};
use evoweb_core::profile::InterestSet;
use evoweb_core::signals::{DeviceInfo, UserSignals, VisitState};
use evoweb_core::storage::{CachedContent, KeyValueStore};
use evoweb_profile::{InterestTaxonomy, ProfileResolver, StaticCatalog};
use evoweb_storage::{ContentCache, VisitTracker};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::orchestrator::GenerationOrchestrator;
use crate::prompt::PromptBuilder;

/// What one page load produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedPage {
    pub request_id: String,
    pub profile_id: String,
    pub visit_state: VisitState,
    pub interests: InterestSet,
    pub result: GenerationResult,
}

pub struct Personalizer {
    resolver: ProfileResolver,
    prompts: PromptBuilder,
    orchestrator: GenerationOrchestrator,
    visits: VisitTracker,
    cache: ContentCache,
    explicit_profile_id: Option<String>,
}

impl Personalizer {
    pub fn new(orchestrator: GenerationOrchestrator, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            resolver: ProfileResolver::builtin(),
            prompts: PromptBuilder::new(),
            orchestrator,
            visits: VisitTracker::new(store.clone()),
            cache: ContentCache::new(store),
            explicit_profile_id: None,
        }
    }

    /// Wire everything from configuration: storage, engine and profile pin.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store = evoweb_storage::build_from_config(&config.storage).await?;
        let gateway = evoweb_engine::build_from_config(&config.engine)?;
        let orchestrator = GenerationOrchestrator::from_config(gateway, &config.engine);
        let mut personalizer = Self::new(orchestrator, store)
            .with_explicit_profile(config.profile.explicit_profile_id.clone());
        if let Some(path) = &config.profile.catalog_path {
            let catalog = load_catalog(path).await?;
            personalizer = personalizer.with_resolver(ProfileResolver::new(
                Arc::new(catalog),
                InterestTaxonomy::builtin(),
            ));
        }
        Ok(personalizer)
    }

    pub fn with_resolver(mut self, resolver: ProfileResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Pin a catalog profile instead of rotating by visit count.
    pub fn with_explicit_profile(mut self, profile_id: Option<String>) -> Self {
        self.explicit_profile_id = profile_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.orchestrator
    }

    pub fn resolver(&self) -> &ProfileResolver {
        &self.resolver
    }

    pub fn visits(&self) -> &VisitTracker {
        &self.visits
    }

    /// Personalize one page load, keeping history in the store's shared keys.
    ///
    /// Errors only for a generation already in flight, storage failures while
    /// recording the visit, or profile resolution failures. Failing to cache
    /// the result is logged and does not affect what is returned.
    pub async fn personalize(&self, signals: &UserSignals, device: &DeviceInfo) -> Result<PersonalizedPage> {
        self.run(&self.visits, &self.cache, signals, device).await
    }

    /// Personalize one page load for `visitor_id`, whose visit count and
    /// cached page are kept apart from every other visitor's.
    pub async fn personalize_for(
        &self,
        visitor_id: &str,
        signals: &UserSignals,
        device: &DeviceInfo,
    ) -> Result<PersonalizedPage> {
        let visits = self.visits.for_visitor(visitor_id);
        let cache = self.cache.for_visitor(visitor_id);
        self.run(&visits, &cache, signals, device).await
    }

    /// The last page shown, if any.
    pub async fn cached(&self) -> Result<Option<CachedContent>> {
        Ok(self.cache.load_latest().await?)
    }

    /// The last page shown to `visitor_id`, if any.
    pub async fn cached_for(&self, visitor_id: &str) -> Result<Option<CachedContent>> {
        Ok(self.cache.for_visitor(visitor_id).load_latest().await?)
    }

    async fn run(
        &self,
        visits: &VisitTracker,
        cache: &ContentCache,
        signals: &UserSignals,
        device: &DeviceInfo,
    ) -> Result<PersonalizedPage> {
        let slot = self.orchestrator.reserve()?;
        let visit_state = visits.track_visit().await?;

        let profile = self.resolver.resolve_profile(
            visit_state.visit_count,
            signals,
            self.explicit_profile_id.as_deref(),
        )?;
        let interests = self.resolver.derive_interests(signals);
        let prompt = self.prompts.build(&profile, &visit_state, device, &interests);

        let request = GenerationRequest::new(profile, visit_state, device.clone(), interests, prompt);
        info!(
            request_id = %request.id,
            profile = %request.profile.id,
            visit_count = request.visit_state.visit_count,
            interests = ?request.interests.as_slice(),
            "Personalizing page"
        );

        let result = slot.generate(&request).await;

        if let Err(e) = cache.save(&CachedContent::now(result.html())).await {
            warn!(request_id = %request.id, error = %e, "Failed to cache generated page");
        }

        Ok(PersonalizedPage {
            request_id: request.id,
            profile_id: request.profile.id,
            visit_state: request.visit_state,
            interests: request.interests,
            result,
        })
    }
}

/// Read a JSON profile catalog. An unreadable, malformed or empty file is a
/// configuration error.
async fn load_catalog(path: &Path) -> Result<StaticCatalog> {
    let config_error = |reason: String| Error::Config {
        message: format!("profile catalog {}: {reason}", path.display()),
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| config_error(e.to_string()))?;
    let catalog = StaticCatalog::from_json(&json).map_err(|e| config_error(e.to_string()))?;
    if catalog.profiles().is_empty() {
        return Err(config_error("no profiles defined".into()));
    }
    debug!(path = %path.display(), profiles = catalog.profiles().len(), "Loaded profile catalog");
    Ok(catalog)
}
