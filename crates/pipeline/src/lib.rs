//! # EvoWeb Pipeline
//!
//! Turns a page load into HTML:
//!
//! 1. **Track** the visit ([`evoweb_storage::VisitTracker`])
//! 2. **Resolve** a profile and derive interests ([`evoweb_profile::ProfileResolver`])
//! 3. **Prompt** the model ([`PromptBuilder`])
//! 4. **Generate** with a bounded wait ([`GenerationOrchestrator`])
//! 5. **Extract** the markup, or fall back to a static page ([`extract()`], [`static_fallback`])
//! 6. **Cache** what was shown ([`evoweb_storage::ContentCache`])
//!
//! [`Personalizer`] runs the whole sequence.

pub mod extract;
pub mod fallback;
pub mod orchestrator;
pub mod personalizer;
pub mod prompt;

pub use extract::extract;
pub use fallback::{FallbackTier, static_fallback, status_message};
pub use orchestrator::{GenerationOrchestrator, OrchestratorState, Reservation};
pub use personalizer::{PersonalizedPage, Personalizer};
pub use prompt::{PromptBuilder, build_prompt};
