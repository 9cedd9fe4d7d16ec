//! Key resolution - configuration keys to control identifiers
//!
//! Two strategies:
//! - exact: a leaf key resolves only to a control with the same identifier
//!   ([`resolve_exact`])
//! - managed: a [`KeyResolver`] built from an explicit mapping or a key list,
//!   with optional approximate completion ([`resolve_managed`])
//!
//! Data flow:
//! ```text
//! ConfigTree keys ──┐
//!                   ├─→ resolve_exact / KeyResolver::build → ResolutionMap
//! control names ────┘
//! ```

use rustc_hash::FxHashSet;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::error::{FormSyncError, Result};
use crate::similarity::{self, ACCEPTANCE_THRESHOLD};
use crate::value::{ConfigTree, Node};

/// What the exact resolver does with a leaf key that has no control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Stop binding the remaining keys of the current tree level
    StopRemaining,
    /// Collect every unmatched key and fail once with all of them
    #[default]
    FailFast,
    /// Leave unmatched keys unbound and carry on
    Skip,
}

/// Final key → control identifier mapping, in resolution order
///
/// Keys keep the order they were resolved in, which follows the data file.
/// Equality ignores that order.
#[derive(Debug, Clone, Default)]
pub struct ResolutionMap {
    entries: Vec<(String, String)>,
}

impl ResolutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| id.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert or replace in place
    pub(crate) fn insert(&mut self, key: impl Into<String>, identifier: impl Into<String>) {
        let key = key.into();
        let identifier = identifier.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = identifier,
            None => self.entries.push((key, identifier)),
        }
    }
}

impl PartialEq for ResolutionMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, id)| other.get(k) == Some(id))
    }
}

impl Eq for ResolutionMap {}

impl Serialize for ResolutionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, identifier) in &self.entries {
            map.serialize_entry(key, identifier)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResolutionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ResolutionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

fn identifier_set<S: AsRef<str>>(available: &[S]) -> FxHashSet<&str> {
    available.iter().map(AsRef::as_ref).collect()
}

// ═══════════════════════════════════════════════════════════════
// Exact-match resolution
// ═══════════════════════════════════════════════════════════════

/// Resolve every leaf key of `tree` to the control with the same identifier
///
/// Nested trees are resolved against the same identifiers when `recursive`
/// is set and skipped otherwise. Unmatched leaves follow `policy`.
pub fn resolve_exact<S: AsRef<str>>(
    tree: &ConfigTree,
    available: &[S],
    recursive: bool,
    policy: UnmatchedPolicy,
) -> Result<ResolutionMap> {
    let available = identifier_set(available);
    let mut map = ResolutionMap::new();
    let mut unresolved = Vec::new();

    exact_level(tree, &available, recursive, policy, &mut map, &mut unresolved);

    if !unresolved.is_empty() {
        return Err(FormSyncError::UnresolvedKeys { keys: unresolved });
    }
    Ok(map)
}

fn exact_level(
    tree: &ConfigTree,
    available: &FxHashSet<&str>,
    recursive: bool,
    policy: UnmatchedPolicy,
    map: &mut ResolutionMap,
    unresolved: &mut Vec<String>,
) {
    for (key, node) in tree.iter() {
        if let Node::Tree(subtree) = node {
            if recursive {
                exact_level(subtree, available, recursive, policy, map, unresolved);
            }
            continue;
        }

        if available.contains(key) {
            map.insert(key, key);
            continue;
        }

        match policy {
            UnmatchedPolicy::FailFast => {
                if !unresolved.iter().any(|k| k == key) {
                    unresolved.push(key.to_string());
                }
            }
            UnmatchedPolicy::Skip => debug!(key, "no control for key, skipped"),
            UnmatchedPolicy::StopRemaining => {
                warn!(key, "no control for key, remaining keys of this level stay unbound");
                return;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Managed resolution (KeyResolver)
// ═══════════════════════════════════════════════════════════════

/// Keys a [`KeyResolver`] was created from
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Explicit key → identifier pairs
    Mapping(Vec<(String, String)>),
    /// Keys to be matched (exactly or approximately) against identifiers
    Keys(Vec<String>),
}

/// Maps configuration keys to control identifiers that do not share a name
///
/// ```
/// use formsync::KeyResolver;
///
/// let mut resolver = KeyResolver::from_mapping([("employed", "has_work")]);
/// resolver.build(&["has_work", "age"]).unwrap();
/// assert_eq!(resolver.built_map().unwrap().get("employed"), Some("has_work"));
/// ```
#[derive(Debug, Clone)]
pub struct KeyResolver {
    source: KeySource,
    suppress_errors: FxHashSet<String>,
    complement_keys: bool,
    log_build_result: bool,
    built: Option<ResolutionMap>,
}

impl KeyResolver {
    /// Create a resolver from explicit key → identifier pairs
    pub fn from_mapping<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_source(KeySource::Mapping(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    /// Create a resolver from a list of keys to match automatically
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::with_source(KeySource::Keys(keys.into_iter().map(Into::into).collect()))
    }

    fn with_source(source: KeySource) -> Self {
        Self {
            source,
            suppress_errors: FxHashSet::default(),
            complement_keys: false,
            log_build_result: false,
            built: None,
        }
    }

    /// Keys allowed to stay unresolved
    pub fn suppress_errors<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.suppress_errors.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Fall back to approximate matching for unresolved keys
    pub fn complement_keys(mut self, enabled: bool) -> Self {
        self.complement_keys = enabled;
        self
    }

    /// Log the built map at info level after `build()`
    pub fn log_build_result(mut self, enabled: bool) -> Self {
        self.log_build_result = enabled;
        self
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }

    pub fn is_suppressed(&self, key: &str) -> bool {
        self.suppress_errors.contains(key)
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// The map produced by the last `build()`
    pub fn built_map(&self) -> Result<&ResolutionMap> {
        self.built.as_ref().ok_or(FormSyncError::ResolverNotBuilt)
    }

    /// Build the resolution map against the available control identifiers
    ///
    /// Building again replaces the previous result.
    /// A failed build leaves the resolver unbuilt.
    pub fn build<S: AsRef<str>>(&mut self, available: &[S]) -> Result<&ResolutionMap> {
        self.built = None;
        let available: Vec<&str> = available.iter().map(AsRef::as_ref).collect();

        let map = match &self.source {
            KeySource::Mapping(pairs) => self.build_from_mapping(pairs, &available)?,
            KeySource::Keys(keys) => self.build_from_keys(keys, &available)?,
        };

        debug!(entries = map.len(), "key resolver built");
        if self.log_build_result {
            match serde_json::to_string_pretty(&map) {
                Ok(dump) => info!("Building successful!\n{}", dump),
                Err(e) => warn!(error = %e, "could not render resolver build result"),
            }
        }

        Ok(&*self.built.insert(map))
    }

    fn build_from_mapping(
        &self,
        pairs: &[(String, String)],
        available: &[&str],
    ) -> Result<ResolutionMap> {
        let mut map = ResolutionMap::new();

        for (key, identifier) in pairs {
            if available.contains(&identifier.as_str()) {
                map.insert(key, identifier);
                continue;
            }
            if self.is_suppressed(key) {
                debug!(key = %key, identifier = %identifier, "unresolved mapping suppressed");
                continue;
            }
            if self.complement_keys {
                if let Some(found) = complete(key, available.iter().copied()) {
                    map.insert(key, found);
                    continue;
                }
            }
            return Err(FormSyncError::UnresolvedKey {
                key: key.clone(),
                identifier: identifier.clone(),
            });
        }

        Ok(map)
    }

    fn build_from_keys(&self, keys: &[String], available: &[&str]) -> Result<ResolutionMap> {
        let mut map = ResolutionMap::new();
        let mut remaining = Vec::new();

        for key in keys {
            if available.contains(&key.as_str()) {
                map.insert(key, key);
            } else {
                remaining.push(key);
            }
        }

        // Identifiers already taken by an exact match are not completion candidates
        let mut pool: Vec<&str> = available
            .iter()
            .copied()
            .filter(|id| !map.contains_key(id))
            .collect();

        for key in remaining {
            if self.complement_keys {
                if let Some(found) = complete(key, pool.iter().copied()) {
                    pool.retain(|id| *id != found);
                    map.insert(key, found);
                    continue;
                }
            }
            if self.is_suppressed(key) {
                debug!(key = %key, "unresolved key suppressed");
                continue;
            }
            return Err(FormSyncError::UnresolvedKey {
                key: key.clone(),
                identifier: key.clone(),
            });
        }

        Ok(map)
    }
}

fn complete<'a>(key: &str, pool: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let (found, score) = similarity::best_match(key, pool, ACCEPTANCE_THRESHOLD)?;
    debug!(key, control = found, score, "key completed by approximate match");
    Some(found)
}

/// Resolve every leaf key of `tree` with a built [`KeyResolver`]
///
/// Each leaf resolves by exact identifier first, then through the resolver's
/// built map. A leaf resolved by neither fails with
/// [`FormSyncError::ControlNotFound`] unless the resolver suppresses it.
pub fn resolve_managed<S: AsRef<str>>(
    tree: &ConfigTree,
    available: &[S],
    resolver: &KeyResolver,
    recursive: bool,
) -> Result<ResolutionMap> {
    let built = resolver.built_map()?;
    let available = identifier_set(available);
    let mut map = ResolutionMap::new();

    managed_level(tree, &available, resolver, built, recursive, &mut map)?;
    Ok(map)
}

fn managed_level(
    tree: &ConfigTree,
    available: &FxHashSet<&str>,
    resolver: &KeyResolver,
    built: &ResolutionMap,
    recursive: bool,
    map: &mut ResolutionMap,
) -> Result<()> {
    for (key, node) in tree.iter() {
        if let Node::Tree(subtree) = node {
            if recursive {
                managed_level(subtree, available, resolver, built, recursive, map)?;
            }
            continue;
        }

        if available.contains(key) {
            map.insert(key, key);
        } else if let Some(identifier) = built.get(key) {
            map.insert(key, identifier);
        } else if resolver.is_suppressed(key) {
            debug!(key, "suppressed key left unbound");
        } else {
            return Err(FormSyncError::ControlNotFound {
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Resolve with a [`KeyResolver`] when one is given, exact matching otherwise
///
/// The resolver is built against `available` first.
pub fn resolve_tree<S: AsRef<str>>(
    tree: &ConfigTree,
    available: &[S],
    resolver: Option<&mut KeyResolver>,
    recursive: bool,
    policy: UnmatchedPolicy,
) -> Result<ResolutionMap> {
    match resolver {
        Some(resolver) => {
            resolver.build(available)?;
            resolve_managed(tree, available, resolver, recursive)
        }
        None => resolve_exact(tree, available, recursive, policy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROLS: [&str; 4] = ["age", "nationality", "employed", "date_of_birth"];

    fn profile() -> ConfigTree {
        ConfigTree::new()
            .with("age", 19)
            .with("nationality", "German")
            .with("employed", false)
    }

    // ─────────────────────────────────────────────────────────────
    // Exact resolution
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn exact_resolves_matching_keys() {
        let map = resolve_exact(&profile(), &CONTROLS, true, UnmatchedPolicy::FailFast).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("nationality"), Some("nationality"));
    }

    #[test]
    fn exact_fail_fast_lists_all_unresolved() {
        let tree = profile().with("height", 180).with("weight", 70);
        let err = resolve_exact(&tree, &CONTROLS, true, UnmatchedPolicy::FailFast).unwrap_err();
        match err {
            FormSyncError::UnresolvedKeys { keys } => assert_eq!(keys, vec!["height", "weight"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn exact_stop_remaining_binds_only_leading_keys() {
        let tree = ConfigTree::new()
            .with("age", 19)
            .with("height", 180)
            .with("employed", false);
        let map =
            resolve_exact(&tree, &CONTROLS, true, UnmatchedPolicy::StopRemaining).unwrap();
        assert!(map.contains_key("age"));
        assert!(!map.contains_key("employed"));
    }

    #[test]
    fn exact_stop_remaining_only_stops_current_level() {
        let tree = ConfigTree::new()
            .with("nested", ConfigTree::new().with("height", 1).with("age", 2))
            .with("employed", false);
        let map =
            resolve_exact(&tree, &CONTROLS, true, UnmatchedPolicy::StopRemaining).unwrap();
        assert!(!map.contains_key("age"));
        assert!(map.contains_key("employed"));
    }

    #[test]
    fn exact_skip_continues() {
        let tree = ConfigTree::new()
            .with("height", 180)
            .with("employed", false);
        let map = resolve_exact(&tree, &CONTROLS, true, UnmatchedPolicy::Skip).unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("employed"));
    }

    #[test]
    fn exact_recurses_only_when_recursive() {
        let tree = ConfigTree::new()
            .with("person", ConfigTree::new().with("age", 19))
            .with("employed", true);
        let map = resolve_exact(&tree, &CONTROLS, true, UnmatchedPolicy::FailFast).unwrap();
        assert!(map.contains_key("age"));

        let flat = resolve_exact(&tree, &CONTROLS, false, UnmatchedPolicy::FailFast).unwrap();
        assert!(!flat.contains_key("age"));
        assert!(!flat.contains_key("person"));
    }

    // ─────────────────────────────────────────────────────────────
    // KeyResolver: mapping mode
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn mapping_mode_accepts_existing_identifiers() {
        let mut resolver = KeyResolver::from_mapping([
            ("current_age", "age"),
            ("has_job", "employed"),
            ("born", "date_of_birth"),
        ]);
        let map = resolver.build(&CONTROLS).unwrap();
        assert_eq!(map.get("current_age"), Some("age"));
        assert_eq!(map.get("has_job"), Some("employed"));
        assert_eq!(map.get("born"), Some("date_of_birth"));
    }

    #[test]
    fn mapping_mode_fails_on_missing_identifier() {
        let mut resolver = KeyResolver::from_mapping([("job", "has_work")]);
        let err = resolver.build(&CONTROLS).unwrap_err();
        assert!(err.to_string().contains("'has_work'"));
        assert!(!resolver.is_built());
    }

    #[test]
    fn mapping_mode_suppressed_key_is_absent() {
        let mut resolver =
            KeyResolver::from_mapping([("job", "has_work")]).suppress_errors(["job"]);
        let map = resolver.build(&CONTROLS).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn mapping_mode_complements_key() {
        let mut resolver =
            KeyResolver::from_mapping([("employ", "has_work")]).complement_keys(true);
        let map = resolver.build(&CONTROLS).unwrap();
        assert_eq!(map.get("employ"), Some("employed"));
    }

    // ─────────────────────────────────────────────────────────────
    // KeyResolver: list mode
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn list_mode_matches_exact_keys() {
        let mut resolver = KeyResolver::from_keys(["age", "employed"]);
        let map = resolver.build(&CONTROLS).unwrap();
        assert_eq!(map.get("age"), Some("age"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn list_mode_completes_close_keys() {
        let mut resolver = KeyResolver::from_keys(["user"]).complement_keys(true);
        let map = resolver.build(&["user_name", "date_of_birth"]).unwrap();
        assert_eq!(map.get("user"), Some("user_name"));
    }

    #[test]
    fn list_mode_rejects_distant_keys() {
        let mut resolver = KeyResolver::from_keys(["xyz123"]).complement_keys(true);
        let err = resolver.build(&["user_name", "date_of_birth"]).unwrap_err();
        assert!(matches!(err, FormSyncError::UnresolvedKey { .. }));
    }

    #[test]
    fn list_mode_suppression_after_failed_completion() {
        let mut resolver = KeyResolver::from_keys(["xyz123", "user"])
            .complement_keys(true)
            .suppress_errors(["xyz123"]);
        let map = resolver.build(&["user_name", "date_of_birth"]).unwrap();
        assert!(!map.contains_key("xyz123"));
        assert_eq!(map.get("user"), Some("user_name"));
    }

    #[test]
    fn list_mode_does_not_complete_to_exact_matches() {
        // "age" is taken by the exact key, so "ages" must not land on it
        let mut resolver = KeyResolver::from_keys(["age", "ages"]).complement_keys(true);
        let err = resolver.build(&["age", "date_of_birth"]).unwrap_err();
        assert!(err.to_string().contains("'ages'"));
    }

    #[test]
    fn built_map_before_build_is_an_error() {
        let resolver = KeyResolver::from_keys(["age"]);
        assert!(matches!(
            resolver.built_map(),
            Err(FormSyncError::ResolverNotBuilt)
        ));
    }

    #[test]
    fn failed_rebuild_clears_previous_result() {
        let mut resolver = KeyResolver::from_keys(["age"]);
        resolver.build(&["age"]).unwrap();
        assert!(resolver.is_built());

        assert!(resolver.build(&["other"]).is_err());
        assert!(!resolver.is_built());
        assert!(matches!(
            resolver.built_map(),
            Err(FormSyncError::ResolverNotBuilt)
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Managed tree resolution
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn managed_prefers_exact_then_built_map() {
        let available = ["age", "has_work", "nationality"];
        let mut resolver = KeyResolver::from_mapping([("employed", "has_work")]);
        let map = resolve_tree(
            &profile(),
            &available,
            Some(&mut resolver),
            true,
            UnmatchedPolicy::FailFast,
        )
        .unwrap();
        assert_eq!(map.get("age"), Some("age"));
        assert_eq!(map.get("employed"), Some("has_work"));
    }

    #[test]
    fn managed_unresolved_leaf_is_control_not_found() {
        let available = ["age", "nationality"];
        let mut resolver = KeyResolver::from_mapping(Vec::<(String, String)>::new());
        resolver.build(&available).unwrap();
        let err = resolve_managed(&profile(), &available, &resolver, true).unwrap_err();
        assert!(matches!(err, FormSyncError::ControlNotFound { key } if key == "employed"));
    }

    #[test]
    fn managed_suppressed_leaf_stays_unbound() {
        let available = ["age", "nationality"];
        let mut resolver =
            KeyResolver::from_keys(["employed"]).suppress_errors(["employed"]);
        resolver.build(&available).unwrap();
        let map = resolve_managed(&profile(), &available, &resolver, true).unwrap();
        assert_eq!(map.len(), 2);
        assert!(!map.contains_key("employed"));
    }

    #[test]
    fn managed_requires_built_resolver() {
        let resolver = KeyResolver::from_keys(["age"]);
        let err = resolve_managed(&profile(), &CONTROLS, &resolver, true).unwrap_err();
        assert!(matches!(err, FormSyncError::ResolverNotBuilt));
    }

    #[test]
    fn resolution_keeps_tree_order() {
        let tree = ConfigTree::new()
            .with("nationality", "German")
            .with("employed", false)
            .with("age", 19);
        let map = resolve_exact(&tree, &CONTROLS, true, UnmatchedPolicy::FailFast).unwrap();
        let keys: Vec<&str> = map.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["nationality", "employed", "age"]);
        assert_eq!(
            serde_json::to_string(&map).unwrap(),
            r#"{"nationality":"nationality","employed":"employed","age":"age"}"#
        );

        let reordered: ResolutionMap = [
            ("age", "age"),
            ("employed", "employed"),
            ("nationality", "nationality"),
        ]
        .into_iter()
        .collect();
        assert_eq!(map, reordered);
    }

    #[test]
    fn unmatched_policy_parses_snake_case() {
        let policy: UnmatchedPolicy = serde_yaml::from_str("stop_remaining").unwrap();
        assert_eq!(policy, UnmatchedPolicy::StopRemaining);
        assert_eq!(UnmatchedPolicy::default(), UnmatchedPolicy::FailFast);
    }
}
