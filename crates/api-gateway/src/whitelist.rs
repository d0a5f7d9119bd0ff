//! Public path matching per service prefix.
//!
//! Entries are literal paths, globs (`*` matches any run of characters) or
//! raw anchored regexes starting with `^`. Everything is compiled once when
//! added. Readers load an immutable snapshot without locking; writers build
//! a new snapshot and swap it in.

use crate::domain::config::WhitelistConfig;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Public auth routes of the identity service
pub const DEFAULT_PUBLIC_PATHS: [&str; 5] = [
    "/health",
    "/api/auth/*",
    "/api/auth/refresh-token",
    "/api/setup-codes/validate*",
    "/api/organizations/public*",
];

/// One compiled whitelist entry
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Literal(String),
    Pattern { source: String, regex: Regex },
}

impl PathMatcher {
    pub fn compile(raw: &str) -> Result<Self, WhitelistError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(WhitelistError::Empty);
        }

        let expr = if raw.starts_with('^') {
            raw.to_string()
        } else if raw.contains('*') {
            glob_to_regex(raw)
        } else {
            return Ok(Self::Literal(raw.to_string()));
        };

        let regex = Regex::new(&expr).map_err(|e| WhitelistError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::Pattern {
            source: raw.to_string(),
            regex,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == path,
            Self::Pattern { regex, .. } => regex.is_match(path),
        }
    }

    /// The entry as it was configured
    pub fn source(&self) -> &str {
        match self {
            Self::Literal(literal) => literal,
            Self::Pattern { source, .. } => source,
        }
    }
}

/// `^...$` with every `*` turned into `.*` and everything else literal.
pub fn glob_to_regex(glob: &str) -> String {
    let mut expr = String::with_capacity(glob.len() + 8);
    expr.push('^');
    for (i, part) in glob.split('*').enumerate() {
        if i > 0 {
            expr.push_str(".*");
        }
        expr.push_str(&regex::escape(part));
    }
    expr.push('$');
    expr
}

type Snapshot = HashMap<String, Arc<[PathMatcher]>>;

/// Prefix → public path matchers
pub struct WhitelistMatcher {
    snapshot: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl WhitelistMatcher {
    pub fn empty() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::new()),
            writer: Mutex::new(()),
        }
    }

    /// Built-in identity defaults (when enabled) plus configured extras
    pub fn from_config(
        config: &WhitelistConfig,
        identity_prefix: &str,
    ) -> Result<Self, WhitelistError> {
        let mut entries: HashMap<String, Vec<PathMatcher>> = HashMap::new();

        if config.include_defaults {
            let defaults = DEFAULT_PUBLIC_PATHS
                .iter()
                .map(|p| PathMatcher::compile(p))
                .collect::<Result<Vec<_>, _>>()?;
            entries.insert(identity_prefix.to_string(), defaults);
        }

        for (prefix, patterns) in &config.extra {
            let list = entries.entry(prefix.clone()).or_default();
            for pattern in patterns {
                let matcher = PathMatcher::compile(pattern)?;
                if !list.iter().any(|m| m.source() == matcher.source()) {
                    list.push(matcher);
                }
            }
        }

        let snapshot: Snapshot = entries
            .into_iter()
            .map(|(prefix, list)| (prefix, Arc::from(list)))
            .collect();

        info!(
            prefixes = snapshot.len(),
            entries = snapshot.values().map(|l| l.len()).sum::<usize>(),
            "Public path whitelist loaded"
        );

        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(()),
        })
    }

    /// Is `path` public for the service at `prefix`? Unknown prefix: no.
    pub fn is_public(&self, prefix: &str, path: &str) -> bool {
        self.snapshot
            .load()
            .get(prefix)
            .is_some_and(|list| list.iter().any(|m| m.matches(path)))
    }

    /// Add an entry. Returns `false` if it was already present.
    pub fn add(&self, prefix: &str, pattern: &str) -> Result<bool, WhitelistError> {
        let matcher = PathMatcher::compile(pattern)?;

        let _guard = self.writer.lock();
        let current = self.snapshot.load_full();
        let existing = current.get(prefix).map(|l| &l[..]).unwrap_or(&[]);
        if existing.iter().any(|m| m.source() == matcher.source()) {
            return Ok(false);
        }

        let mut list = existing.to_vec();
        list.push(matcher);
        let mut next = Snapshot::clone(&current);
        next.insert(prefix.to_string(), Arc::from(list));
        self.snapshot.store(Arc::new(next));

        debug!(prefix = prefix, pattern = pattern.trim(), "Added public path");
        Ok(true)
    }

    /// Remove an entry by its configured form. Returns `false` if absent.
    pub fn remove(&self, prefix: &str, pattern: &str) -> bool {
        let pattern = pattern.trim();

        let _guard = self.writer.lock();
        let current = self.snapshot.load_full();
        let Some(existing) = current.get(prefix) else {
            return false;
        };
        if !existing.iter().any(|m| m.source() == pattern) {
            return false;
        }

        let list: Vec<PathMatcher> = existing
            .iter()
            .filter(|m| m.source() != pattern)
            .cloned()
            .collect();
        let mut next = Snapshot::clone(&current);
        if list.is_empty() {
            next.remove(prefix);
        } else {
            next.insert(prefix.to_string(), Arc::from(list));
        }
        self.snapshot.store(Arc::new(next));

        debug!(prefix = prefix, pattern = pattern, "Removed public path");
        true
    }

    /// Configured entries for `prefix`, in match order
    pub fn entries(&self, prefix: &str) -> Vec<String> {
        self.snapshot
            .load()
            .get(prefix)
            .map(|list| list.iter().map(|m| m.source().to_string()).collect())
            .unwrap_or_default()
    }
}

impl Default for WhitelistMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for WhitelistMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("WhitelistMatcher")
            .field("prefixes", &snapshot.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Whitelist errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WhitelistError {
    #[error("empty public path pattern")]
    Empty,
    #[error("invalid public path pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
