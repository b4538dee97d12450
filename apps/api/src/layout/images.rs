//! Image Resolver — maps a placeholder tag to a figure in the asset pool.
//!
//! Matching tiers, first tier with a hit wins, pool order within a tier:
//!   1. tag == asset name
//!   2. tag == asset name without extension
//!   3. tag is a substring of the asset name
//!   4. the extension-less asset name ends with the tag
//!
//! An asset is placed at most once per document. If the best match has
//! already been used the placeholder is unresolved; the resolver does not fall
//! through to a weaker match.

use std::collections::HashSet;

use crate::models::asset::{AssetPool, ImageAsset};

/// Names of assets already placed in the current document. Only grows.
#[derive(Debug, Clone, Default)]
pub struct UsedImageSet {
    names: HashSet<String>,
}

impl UsedImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns false when the name was already present.
    fn mark(&mut self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchTier {
    ExactName,
    ExactStem,
    NameContains,
    StemEndsWith,
}

const TIERS: [MatchTier; 4] = [
    MatchTier::ExactName,
    MatchTier::ExactStem,
    MatchTier::NameContains,
    MatchTier::StemEndsWith,
];

impl MatchTier {
    fn accepts(self, tag: &str, asset: &ImageAsset) -> bool {
        match self {
            MatchTier::ExactName => asset.name == tag,
            MatchTier::ExactStem => asset.stem() == tag,
            MatchTier::NameContains => asset.name.contains(tag),
            MatchTier::StemEndsWith => asset.stem().ends_with(tag),
        }
    }
}

/// Outcome of a single placeholder lookup.
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    /// Matched and now marked as used.
    Resolved(&'a ImageAsset),
    /// The best match was placed earlier in the document.
    AlreadyUsed(&'a ImageAsset),
    Unmatched,
}

/// Best match for `tag` in pool order, without touching the used set.
pub fn best_match<'a>(tag: &str, pool: &'a AssetPool) -> Option<&'a ImageAsset> {
    if tag.is_empty() {
        return None;
    }
    TIERS
        .iter()
        .find_map(|tier| pool.iter().find(|asset| tier.accepts(tag, asset)))
}

/// Looks up `tag` and marks the match as used in one step.
pub fn resolve_detailed<'a>(
    tag: &str,
    pool: &'a AssetPool,
    used: &mut UsedImageSet,
) -> Resolution<'a> {
    match best_match(tag, pool) {
        None => Resolution::Unmatched,
        Some(asset) if used.mark(&asset.name) => Resolution::Resolved(asset),
        Some(asset) => Resolution::AlreadyUsed(asset),
    }
}

pub fn resolve<'a>(
    tag: &str,
    pool: &'a AssetPool,
    used: &mut UsedImageSet,
) -> Option<&'a ImageAsset> {
    match resolve_detailed(tag, pool, used) {
        Resolution::Resolved(asset) => Some(asset),
        Resolution::AlreadyUsed(_) | Resolution::Unmatched => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
