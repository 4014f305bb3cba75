//! The per-attempt generation state machine.
//!
//! State lives inside the machine and every transition is synchronous: the
//! UI reports load outcomes (`candidate_failed` / `candidate_loaded`) and
//! reads `current_candidate` back. No IO happens here, which keeps the
//! whole try-next-on-failure flow testable without a rendering
//! environment.

use tracing::{debug, warn};

use crate::catalog::MediaCatalog;
use crate::endpoint::GenerativeEndpoint;
use crate::error::{MediaError, Result};
use crate::resolver::resolve;

/// Where a generation attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    /// No attempt in progress.
    Ready,
    /// Presenting candidate `index`; waiting on the load outcome.
    Trying { index: usize },
    /// Candidate `index` loaded. Terminal for this attempt.
    Succeeded { index: usize },
    /// Every candidate failed. Terminal until the caller starts a new
    /// attempt.
    Exhausted,
}

/// Drives one media-generation flow: builds the candidate list for a
/// prompt and advances through it as the UI reports load failures.
///
/// The variation counter increments on [`Generation::regenerate`], so a
/// regenerate for the same prompt produces a different pool rotation while
/// staying reproducible for that `(prompt, variation)` pair.
#[derive(Debug, Clone)]
pub struct Generation {
    catalog: MediaCatalog,
    endpoint: Option<(GenerativeEndpoint, u64)>,
    variation: u32,
    candidates: Vec<String>,
    state: GenerationState,
}

impl Generation {
    /// Create a machine resolving against the given catalog.
    pub fn new(catalog: MediaCatalog) -> Self {
        Self {
            catalog,
            endpoint: None,
            variation: 0,
            candidates: Vec::new(),
            state: GenerationState::Ready,
        }
    }

    /// Put a generative endpoint ahead of the catalog tiers. `base_seed`
    /// is threaded in explicitly; the machine never draws randomness.
    pub fn with_endpoint(mut self, endpoint: GenerativeEndpoint, base_seed: u64) -> Self {
        self.endpoint = Some((endpoint, base_seed));
        self
    }

    /// Current attempt state.
    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Current variation counter.
    pub fn variation(&self) -> u32 {
        self.variation
    }

    /// The full candidate list of the current attempt.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The candidate the UI should be presenting, if any.
    pub fn current_candidate(&self) -> Option<&str> {
        match self.state {
            GenerationState::Trying { index } | GenerationState::Succeeded { index } => {
                self.candidates.get(index).map(String::as_str)
            }
            GenerationState::Ready | GenerationState::Exhausted => None,
        }
    }

    /// Start an attempt: compute the candidate list and present the first
    /// entry. Blank prompts are rejected before the resolver runs.
    ///
    /// Calling this from any state starts over with a fresh list.
    pub fn generate(&mut self, prompt: &str) -> Result<&str> {
        if prompt.trim().is_empty() {
            return Err(MediaError::EmptyPrompt);
        }
        let prompt = prompt.trim();

        let mut candidates = Vec::new();
        if let Some((endpoint, base_seed)) = &self.endpoint {
            candidates.extend(endpoint.candidates(prompt, *base_seed));
        }
        for url in resolve(prompt, self.variation, &self.catalog) {
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }
        debug!(
            candidates = candidates.len(),
            variation = self.variation,
            "generation attempt started"
        );

        self.candidates = candidates;
        if self.candidates.is_empty() {
            // Nothing configured to try. Treat as an attempt that failed
            // immediately rather than presenting nothing in Trying state.
            self.state = GenerationState::Exhausted;
            return Err(MediaError::NoCandidates);
        }
        self.state = GenerationState::Trying { index: 0 };
        Ok(&self.candidates[0])
    }

    /// Start a new attempt with the next variation counter.
    pub fn regenerate(&mut self, prompt: &str) -> Result<&str> {
        self.variation += 1;
        self.generate(prompt)
    }

    /// Report that the current candidate failed to load. Advances to the
    /// next candidate, or to `Exhausted` when the list runs out.
    pub fn candidate_failed(&mut self) -> GenerationState {
        match self.state {
            GenerationState::Trying { index } => {
                let next = index + 1;
                if next < self.candidates.len() {
                    debug!(index = next, "advancing to next candidate");
                    self.state = GenerationState::Trying { index: next };
                } else {
                    warn!(tried = self.candidates.len(), "all candidates failed");
                    self.state = GenerationState::Exhausted;
                }
            }
            _ => {
                warn!(state = ?self.state, "candidate_failed outside an active attempt");
            }
        }
        self.state
    }

    /// Report that the current candidate loaded. The attempt is done and
    /// the list is kept only for inspection.
    pub fn candidate_loaded(&mut self) -> GenerationState {
        match self.state {
            GenerationState::Trying { index } => {
                debug!(index, "candidate loaded");
                self.state = GenerationState::Succeeded { index };
            }
            _ => {
                warn!(state = ?self.state, "candidate_loaded outside an active attempt");
            }
        }
        self.state
    }
}
