//! Pattern matcher (spec.md §4.2 "Pattern matching", component C3).
//!
//! Compiles and evaluates glob/regex patterns against resource types, with a
//! process-wide compilation cache so repeated router construction (or
//! repeated `SelectPlugins` calls against the same config) never recompiles
//! the same pattern twice.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{FinFocusError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Glob,
    Regex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub pattern: String,
}

/// A compiled matcher, cheap to clone (backed by an `Arc`'d `Regex`).
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    Glob(Arc<GlobPattern>),
    Regex(Arc<Regex>),
}

impl CompiledPattern {
    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            CompiledPattern::Glob(g) => g.is_match(haystack),
            CompiledPattern::Regex(r) => r.is_match(haystack),
        }
    }
}

/// Single-level wildcard glob: `*` matches any run of characters, `?`
/// matches exactly one, and `[...]` character classes are supported. There
/// is no path-separator-aware "single level" restriction the way shell
/// globs treat `/` — resource type tokens are not paths.
#[derive(Debug)]
pub struct GlobPattern {
    compiled: Regex,
}

impl GlobPattern {
    fn compile(pattern: &str) -> Result<Self> {
        let mut regex_src = String::from("^");
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => regex_src.push_str(".*"),
                '?' => regex_src.push('.'),
                '[' => {
                    regex_src.push('[');
                    for nc in chars.by_ref() {
                        regex_src.push(nc);
                        if nc == ']' {
                            break;
                        }
                    }
                }
                _ => regex_src.push_str(&regex::escape(&c.to_string())),
            }
        }
        regex_src.push('$');
        let compiled = Regex::new(&regex_src)
            .map_err(|e| FinFocusError::RouterValidation(format!("invalid glob pattern '{pattern}': {e}")))?;
        Ok(GlobPattern { compiled })
    }

    fn is_match(&self, haystack: &str) -> bool {
        self.compiled.is_match(haystack)
    }
}

/// Process-wide cache of compiled patterns, guarded by an RW mutex (spec.md
/// §5 "Shared resources"). Keyed on `(kind, pattern string)` so identical
/// patterns declared by different plugin entries share one compilation.
static PATTERN_CACHE: Lazy<RwLock<HashMap<(PatternKind, String), CompiledPattern>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Compile (or fetch from cache) the given pattern. Returns an error when
/// the pattern is empty or fails to compile (spec.md §4.2 "Empty pattern is
/// invalid at validation time").
pub fn compile(pattern: &ResourcePattern) -> Result<CompiledPattern> {
    if pattern.pattern.is_empty() {
        return Err(FinFocusError::RouterValidation(
            "pattern must not be empty".to_string(),
        ));
    }

    let key = (pattern.kind, pattern.pattern.clone());
    if let Some(hit) = PATTERN_CACHE.read().unwrap().get(&key) {
        return Ok(hit.clone());
    }

    let compiled = match pattern.kind {
        PatternKind::Glob => CompiledPattern::Glob(Arc::new(GlobPattern::compile(&pattern.pattern)?)),
        PatternKind::Regex => {
            let re = Regex::new(&pattern.pattern).map_err(|e| {
                FinFocusError::RouterValidation(format!(
                    "invalid regex pattern '{}': {e}",
                    pattern.pattern
                ))
            })?;
            CompiledPattern::Regex(Arc::new(re))
        }
    };

    PATTERN_CACHE
        .write()
        .unwrap()
        .insert(key, compiled.clone());
    Ok(compiled)
}

/// Check whether a pattern compiles without caring about the result, used by
/// `Router::validate`.
pub fn validate(pattern: &ResourcePattern) -> Result<()> {
    compile(pattern).map(|_| ())
}

/// Test-only helper to reset the process-wide cache between cache-stability
/// assertions; never called from production code paths.
#[cfg(test)]
pub(crate) fn reset_cache_for_test() {
    PATTERN_CACHE.write().unwrap().clear();
}
