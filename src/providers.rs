use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque markup text substituted for a resolved placeholder token.
pub type Fragment = String;

/// The placeholder kinds the upstream generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaceholderKind {
    ProductBox,
    CtaBox,
    AffiliateLink,
    ImagePlaceholder,
}

impl PlaceholderKind {
    pub const ALL: [PlaceholderKind; 4] = [
        PlaceholderKind::ProductBox,
        PlaceholderKind::CtaBox,
        PlaceholderKind::AffiliateLink,
        PlaceholderKind::ImagePlaceholder,
    ];

    /// Tag name as it appears inside `{{..}}` tokens.
    pub fn as_tag(&self) -> &'static str {
        match self {
            PlaceholderKind::ProductBox => "PRODUCT_BOX",
            PlaceholderKind::CtaBox => "CTA_BOX",
            PlaceholderKind::AffiliateLink => "AFFILIATE_LINK",
            PlaceholderKind::ImagePlaceholder => "IMAGE_PLACEHOLDER",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_tag() == tag)
    }
}

/// Supplies generated fragments by ordinal for one placeholder kind.
///
/// Implementations own all I/O (network calls, image generation, etc.); the
/// resolver only ever sees the returned fragment. `Ok(None)` means the
/// ordinal is unknown upstream and the token should be stripped with a
/// warning rather than failing the document.
#[async_trait]
pub trait FragmentProvider: Send + Sync {
    async fn lookup(&self, ordinal: u32) -> Result<Option<Fragment>>;
}

/// Per-request map from placeholder kind to its provider. Built by the
/// caller for each invocation; nothing here outlives the request.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<PlaceholderKind, Arc<dyn FragmentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: PlaceholderKind, provider: Arc<dyn FragmentProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    pub fn get(&self, kind: PlaceholderKind) -> Option<Arc<dyn FragmentProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Registry of [`StaticProvider`]s from a kind → (ordinal → fragment)
    /// map, the shape the CLI's fragments JSON deserializes into.
    pub fn from_fragment_map(map: HashMap<PlaceholderKind, HashMap<u32, Fragment>>) -> Self {
        let mut registry = Self::new();
        for (kind, fragments) in map {
            registry = registry.register(kind, Arc::new(StaticProvider::new(fragments)));
        }
        registry
    }
}

/// In-memory provider over a fixed ordinal → fragment map. Used by the CLI
/// (fragments come from a JSON file) and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    fragments: HashMap<u32, Fragment>,
}

impl StaticProvider {
    pub fn new(fragments: HashMap<u32, Fragment>) -> Self {
        Self { fragments }
    }

    pub fn single(ordinal: u32, fragment: impl Into<Fragment>) -> Self {
        Self::new(HashMap::from([(ordinal, fragment.into())]))
    }
}

#[async_trait]
impl FragmentProvider for StaticProvider {
    async fn lookup(&self, ordinal: u32) -> Result<Option<Fragment>> {
        Ok(self.fragments.get(&ordinal).cloned())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        for kind in PlaceholderKind::ALL {
            assert_eq!(PlaceholderKind::from_tag(kind.as_tag()), Some(kind));
        }
        assert_eq!(PlaceholderKind::from_tag("PRODUCT"), None);
    }

    #[tokio::test]
    async fn static_provider_lookup() {
        let provider = StaticProvider::single(2, "<div>x</div>");
        assert_eq!(
            provider.lookup(2).await.unwrap().as_deref(),
            Some("<div>x</div>")
        );
        assert_eq!(provider.lookup(0).await.unwrap(), None);
    }

    #[test]
    fn fragment_map_json_shape() {
        let json = r#"{ "PRODUCT_BOX": { "0": "<div>a</div>" }, "CTA_BOX": { "1": "<div>b</div>" } }"#;
        let map: HashMap<PlaceholderKind, HashMap<u32, Fragment>> =
            serde_json::from_str(json).unwrap();
        let registry = ProviderRegistry::from_fragment_map(map);
        assert!(registry.get(PlaceholderKind::ProductBox).is_some());
        assert!(registry.get(PlaceholderKind::AffiliateLink).is_none());
    }
}
