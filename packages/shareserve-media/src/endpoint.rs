//! Seeded URL construction for a generative image endpoint.
//!
//! The "generation" tier is deterministic URL construction against a
//! third-party endpoint that renders an image per `(prompt, seed)` pair.
//! A failed load is retried by stepping the seed, so the endpoint
//! contributes a short ladder of candidates ahead of the curated catalog.
//! The base seed is supplied by the caller; drawing it randomly (if
//! desired at all) happens at the embedder's boundary, never here.

use std::fmt::Write as _;

/// Seed increment between consecutive endpoint attempts.
pub const SEED_RETRY_STEP: u64 = 1000;

/// Attempts against the endpoint before falling through to the catalog:
/// the initial seed plus three retries.
pub const MAX_SEED_ATTEMPTS: usize = 4;

/// A generative endpoint that renders media from URL parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerativeEndpoint {
    base_url: String,
    width: u32,
    height: u32,
    model: String,
}

impl GenerativeEndpoint {
    /// Create an endpoint with the default render parameters.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            width: 800,
            height: 600,
            model: "flux".to_string(),
        }
    }

    /// Override the render dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Override the render model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Build the render URL for one `(prompt, seed)` pair.
    pub fn render_url(&self, prompt: &str, seed: u64) -> String {
        format!(
            "{}/prompt/{}?seed={}&width={}&height={}&nologo=true&model={}",
            self.base_url.trim_end_matches('/'),
            percent_encode(prompt),
            seed,
            self.width,
            self.height,
            self.model,
        )
    }

    /// The endpoint's candidate ladder: `MAX_SEED_ATTEMPTS` URLs stepping
    /// the seed by [`SEED_RETRY_STEP`] per attempt.
    pub fn candidates(&self, prompt: &str, base_seed: u64) -> Vec<String> {
        (0..MAX_SEED_ATTEMPTS)
            .map(|attempt| self.render_url(prompt, base_seed + attempt as u64 * SEED_RETRY_STEP))
            .collect()
    }
}

/// Percent-encode a prompt for use as a URL path segment.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
