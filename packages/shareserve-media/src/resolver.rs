//! Pure candidate-list resolution.
//!
//! Resolution turns a prompt into an ordered list of candidate URLs. It is
//! a pure function of `(prompt, variation, catalog)`: no IO, no clock, no
//! randomness. The consuming state machine ([`crate::Generation`]) walks
//! the list; this module only builds it.
//!
//! # Algorithm
//!
//! 1. Normalize the prompt: lowercase, split on whitespace, strip
//!    non-letter characters from each token.
//! 2. Exact keyword match: collect category URLs in token order,
//!    deduplicating by URL.
//! 3. If nothing matched, substring match: include a category when its key
//!    occurs anywhere in the normalized prompt.
//! 4. If still nothing, rotate the general pool from a deterministic
//!    offset derived from the prompt hash and the variation counter.
//! 5. Otherwise append the general pool (deduplicated) so the list never
//!    runs dry before the final tier.

use tracing::debug;

use crate::catalog::MediaCatalog;

/// Deterministic hash of a prompt: the wrapping sum of its character
/// codes. Collisions are fine; the hash only spreads prompts across the
/// general pool.
pub fn prompt_hash(prompt: &str) -> u32 {
    prompt.chars().fold(0u32, |acc, c| acc.wrapping_add(c as u32))
}

/// Lowercase the prompt and split it into letter-only tokens.
fn tokens(prompt: &str) -> Vec<String> {
    prompt
        .to_lowercase()
        .split_whitespace()
        .map(|word| word.chars().filter(char::is_ascii_alphabetic).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect()
}

fn push_unique(out: &mut Vec<String>, url: &str) {
    if !out.iter().any(|existing| existing == url) {
        out.push(url.to_string());
    }
}

/// Resolve a prompt into an ordered candidate list.
///
/// The same `(prompt, variation)` pair always yields the identical list
/// for a given catalog. Callers are expected to reject blank prompts
/// before resolving; see [`crate::Generation::generate`].
pub fn resolve(prompt: &str, variation: u32, catalog: &MediaCatalog) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for token in tokens(prompt) {
        if let Some(urls) = catalog.categories.get(&token) {
            for url in urls {
                push_unique(&mut out, url);
            }
        }
    }

    if out.is_empty() {
        // No token matched exactly; fall back to scanning for category
        // keys embedded anywhere in the prompt.
        let normalized = prompt.to_lowercase();
        for (keyword, urls) in &catalog.categories {
            if normalized.contains(keyword.as_str()) {
                for url in urls {
                    push_unique(&mut out, url);
                }
            }
        }
    }

    if out.is_empty() {
        if catalog.general_pool.is_empty() {
            return out;
        }
        let offset =
            (prompt_hash(prompt) as usize + variation as usize) % catalog.general_pool.len();
        debug!(offset, variation, "no keyword match, rotating general pool");
        let mut rotated = catalog.general_pool[offset..].to_vec();
        rotated.extend_from_slice(&catalog.general_pool[..offset]);
        return rotated;
    }

    for url in &catalog.general_pool {
        push_unique(&mut out, url);
    }

    out
}
