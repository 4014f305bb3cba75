//! # ShareServe Media
//!
//! Deterministic fallback resolution for "media generation" features.
//!
//! Generation here is not model inference: given a free-text prompt, the
//! crate produces an ordered list of candidate resource URLs, and the
//! consuming UI tries them in order until one loads. The chain runs from
//! most- to least-specific source:
//!
//! 1. A generative endpoint (seeded URL construction), when configured
//! 2. A curated keyword catalog (keyword → stock URLs)
//! 3. A general default pool, rotated by a deterministic hash of the prompt
//!
//! ## Determinism
//!
//! The same prompt and variation counter always yield the same candidate
//! list. "Regenerate" increments the variation counter, which perturbs the
//! pool rotation: different from the previous attempt, still reproducible.
//! There is no hidden randomness anywhere in this crate; if an embedder
//! wants a random first seed for the generative endpoint, it draws one at
//! the boundary and passes it in.
//!
//! ## The attempt state machine
//!
//! [`Generation`] owns the try-next-on-failure control flow:
//!
//! ```text
//! Ready --generate()--> Trying(0)
//! Trying(i) --candidate_failed()--> Trying(i+1)   while candidates remain
//! Trying(i) --candidate_failed()--> Exhausted     when the list runs out
//! Trying(i) --candidate_loaded()--> Succeeded(i)
//! any state --generate()/regenerate()--> Trying(0)  with a fresh list
//! ```
//!
//! `Exhausted` is terminal until the caller explicitly starts a new
//! attempt; the machine never retries on its own.
//!
//! ## Example
//!
//! ```ignore
//! use shareserve_media::{Generation, MediaCatalog};
//!
//! let catalog = MediaCatalog::new()
//!     .with_category("city", ["https://cdn.example/city-a.mp4"])
//!     .with_general_pool(["https://cdn.example/default-1.mp4"]);
//!
//! let mut generation = Generation::new(catalog);
//! let first = generation.generate("a futuristic city at night")?.to_string();
//! // UI tries `first`; on a load error:
//! generation.candidate_failed();
//! // on a load success:
//! generation.candidate_loaded();
//! ```

mod catalog;
mod endpoint;
mod error;
mod generation;
mod resolver;

pub use catalog::MediaCatalog;
pub use endpoint::{GenerativeEndpoint, MAX_SEED_ATTEMPTS, SEED_RETRY_STEP};
pub use error::{MediaError, Result};
pub use generation::{Generation, GenerationState};
pub use resolver::{prompt_hash, resolve};
