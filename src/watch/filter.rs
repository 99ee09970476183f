// src/watch/filter.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled include/exclude glob patterns for the watched tree.
///
/// The patterns are evaluated against paths relative to the watch root
/// (forward slashes, e.g. `"routes/users.ts"`). An empty include list means
/// "everything under the root is interesting".
#[derive(Clone)]
pub struct WatchFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("has_include", &self.include.is_some())
            .field("has_exclude", &self.exclude.is_some())
            .finish()
    }
}

impl WatchFilter {
    /// A filter that considers every path relevant.
    pub fn match_all() -> Self {
        Self {
            include: None,
            exclude: None,
        }
    }

    /// Compile include/exclude pattern lists. Empty lists impose no
    /// constraint in that direction.
    pub fn from_patterns(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_globset(include).context("building include globset")?)
        };
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self { include, exclude })
    }

    /// Returns true if a change to the given path (relative to the watch
    /// root) should count towards a restart.
    pub fn is_relevant(&self, rel_path: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(rel_path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
