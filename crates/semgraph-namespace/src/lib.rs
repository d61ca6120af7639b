//! Prefix/URI namespace registry and URI minting.
//!
//! An atomic counter behind a concurrent map drives per-kind URI minting,
//! kept explicit and non-cryptographic.

#![allow(dead_code)]

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// The local instance base used for minted URIs, e.g. `<base>/Entity/0-abc123`.
pub const DEFAULT_INSTANCE_BASE: &str = "https://semgraph.local/instance";
/// The domain ontology prefix (`sg:`).
pub const DOMAIN_NAMESPACE: &str = "https://semgraph.local/ontology#";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("unknown prefix: {0}")]
    UnknownPrefix(String),
    #[error("malformed prefixed name: {0}")]
    MalformedPrefixedName(String),
}

/// Classification of a URI's local name, used by the RDF model layer to
/// decide how to treat a reference (class, property, or individual).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind {
    /// Local name starts with an uppercase letter (`Entity`, `Unit`, ...).
    ClassLike,
    /// Local name starts with a lowercase letter (`hasAttribute`, ...).
    PropertyLike,
    /// Anything else (numeric/opaque identifiers, minted instance URIs).
    Individual,
}

/// Bidirectional prefix↔URI registry seeded with the standard vocabularies
/// plus the domain ontology prefix and a local instance base.
pub struct NamespaceRegistry {
    prefix_to_uri: DashMap<String, String>,
    uri_to_prefix: DashMap<String, String>,
    /// Per-kind monotonic mint counters, shared process-wide within one
    /// `NamespaceRegistry` instance — an engine-scoped service passed by
    /// reference, not a process singleton.
    mint_counters: DashMap<String, AtomicU64>,
    instance_base: String,
}

impl NamespaceRegistry {
    /// Build a registry seeded with RDF, RDFS, SKOS, PROV, Dublin Core, the
    /// domain ontology prefix (`sg`), and a local instance base (`inst`).
    pub fn new() -> Self {
        let registry = Self {
            prefix_to_uri: DashMap::new(),
            uri_to_prefix: DashMap::new(),
            mint_counters: DashMap::new(),
            instance_base: DEFAULT_INSTANCE_BASE.to_string(),
        };

        registry.seed("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
        registry.seed("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
        registry.seed("skos", "http://www.w3.org/2004/02/skos/core#");
        registry.seed("prov", "http://www.w3.org/ns/prov#");
        registry.seed("dcterms", "http://purl.org/dc/terms/");
        registry.seed("sg", DOMAIN_NAMESPACE);
        registry.seed("inst", &format!("{DEFAULT_INSTANCE_BASE}#"));
        registry
    }

    /// Build a registry with a custom instance base (useful for tests that
    /// want deterministic, collision-free URIs).
    pub fn with_instance_base(instance_base: impl Into<String>) -> Self {
        let mut registry = Self::new();
        let base = instance_base.into();
        registry.seed("inst", &format!("{base}#"));
        registry.instance_base = base;
        registry
    }

    fn seed(&self, prefix: &str, uri: &str) {
        self.prefix_to_uri
            .insert(prefix.to_string(), uri.to_string());
        self.uri_to_prefix
            .insert(uri.to_string(), prefix.to_string());
    }

    /// Register an additional prefix mapping.
    pub fn register(&self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        self.uri_to_prefix.insert(uri.clone(), prefix.clone());
        self.prefix_to_uri.insert(prefix, uri);
    }

    /// Resolve a `prefix:local` name to its full URI.
    pub fn resolve(&self, prefixed: &str) -> Result<String, NamespaceError> {
        let (prefix, local) = prefixed
            .split_once(':')
            .ok_or_else(|| NamespaceError::MalformedPrefixedName(prefixed.to_string()))?;
        let base = self
            .prefix_to_uri
            .get(prefix)
            .ok_or_else(|| NamespaceError::UnknownPrefix(prefix.to_string()))?;
        Ok(format!("{}{}", base.value(), local))
    }

    /// Compress a full URI into its `prefix:local` form, or return the
    /// original URI unchanged if no registered namespace is a prefix of it.
    pub fn compress(&self, uri: &str) -> String {
        let mut best: Option<(String, String)> = None;
        for entry in self.uri_to_prefix.iter() {
            let ns = entry.key();
            if uri.starts_with(ns.as_str())
                && best.as_ref().map(|(b, _)| ns.len() > b.len()).unwrap_or(true)
            {
                best = Some((ns.clone(), entry.value().clone()));
            }
        }
        if let Some((ns, prefix)) = best {
            let local = &uri[ns.len()..];
            format!("{prefix}:{local}")
        } else {
            uri.to_string()
        }
    }

    /// Mint a fresh, globally-unique-within-this-registry URI of the form
    /// `<base>/<kind>/<monotonic>-<random>`.
    pub fn mint(&self, kind: &str) -> String {
        let counter = self
            .mint_counters
            .entry(kind.to_string())
            .or_insert_with(|| AtomicU64::new(0));
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let random = random_suffix();
        format!("{}/{}/{}-{}", self.instance_base, kind, n, random)
    }

    /// Classify a URI's local name (after the last `/` or `#`).
    pub fn classify(uri: &str) -> UriKind {
        let local = uri.rsplit(&['/', '#'][..]).next().unwrap_or(uri);
        match local.chars().next() {
            Some(c) if c.is_uppercase() => UriKind::ClassLike,
            Some(c) if c.is_lowercase() => UriKind::PropertyLike,
            _ => UriKind::Individual,
        }
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A short pseudo-random suffix for minted URIs. Not security-sensitive —
/// uniqueness across a single mint call is carried by the monotonic counter;
/// this only needs to make cross-instance/cross-process collisions
/// implausible, so a small xorshift seeded from wall clock + thread id is
/// enough and avoids pulling in `rand` for one call site (see DESIGN.md).
fn random_suffix() -> String {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E3779B97F4A7C15)
        ^ thread_fingerprint();
    let mut x = seed | 1;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    format!("{:08x}", (x & 0xFFFF_FFFF) as u32)
}

fn thread_fingerprint() -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolve_known_prefix() {
        let reg = NamespaceRegistry::new();
        assert_eq!(
            reg.resolve("rdf:type").unwrap(),
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"
        );
    }

    #[test]
    fn resolve_unknown_prefix_fails() {
        let reg = NamespaceRegistry::new();
        assert_eq!(
            reg.resolve("xyz:type"),
            Err(NamespaceError::UnknownPrefix("xyz".to_string()))
        );
    }

    #[test]
    fn compress_round_trips() {
        let reg = NamespaceRegistry::new();
        let full = reg.resolve("skos:definition").unwrap();
        assert_eq!(reg.compress(&full), "skos:definition");
    }

    #[test]
    fn compress_unknown_uri_passthrough() {
        let reg = NamespaceRegistry::new();
        let uri = "https://example.com/not-registered";
        assert_eq!(reg.compress(uri), uri);
    }

    #[test]
    fn mint_is_monotonic_per_kind() {
        let reg = NamespaceRegistry::new();
        let a = reg.mint("Entity");
        let b = reg.mint("Entity");
        assert!(a.contains("/Entity/0-"));
        assert!(b.contains("/Entity/1-"));
    }

    #[test]
    fn mint_never_duplicates_across_many_calls() {
        let reg = NamespaceRegistry::new();
        let mut seen = HashSet::new();
        for _ in 0..50_000 {
            let uri = reg.mint("Unit");
            assert!(seen.insert(uri), "minter produced a duplicate URI");
        }
    }

    #[test]
    fn classify_detects_kinds() {
        assert_eq!(
            NamespaceRegistry::classify("https://x/Entity"),
            UriKind::ClassLike
        );
        assert_eq!(
            NamespaceRegistry::classify("https://x/hasAttribute"),
            UriKind::PropertyLike
        );
        assert_eq!(
            NamespaceRegistry::classify("https://x/42"),
            UriKind::Individual
        );
    }

    proptest::proptest! {
        #[test]
        fn mint_counter_strictly_increases(kind in "[a-zA-Z]{1,12}") {
            let reg = NamespaceRegistry::new();
            let first = reg.mint(&kind);
            let second = reg.mint(&kind);
            proptest::prop_assert_ne!(first, second);
        }
    }
}
