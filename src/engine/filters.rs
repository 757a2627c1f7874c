//! Walker and collector filters.
//!
//! A [`FilterChain`] is an ordered list of predicates over `(path, rule)`. Registration appends
//! under a lock; a run takes a [`FilterSet`] snapshot and evaluates it lock-free.

use std::fs::Metadata;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::Rule;
use crate::engine::tools::{is_hidden, mtime_secs, now_secs};

pub type FilterFn = Arc<dyn Fn(&Path, &Rule) -> bool + Send + Sync>;

#[derive(Default)]
pub struct FilterChain {
    filters: Mutex<Vec<FilterFn>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate. Evaluated after all previously registered ones.
    pub fn on_filter<F>(&self, f: F)
    where
        F: Fn(&Path, &Rule) -> bool + Send + Sync + 'static,
    {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(f));
    }

    pub fn len(&self) -> usize {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the chain as it stands, for one run.
    pub fn fixed(&self) -> FilterSet {
        let filters = self.filters.lock().unwrap_or_else(PoisonError::into_inner);
        FilterSet {
            filters: filters.iter().cloned().collect(),
        }
    }

    pub fn matches(&self, path: &Path, rule: &Rule) -> bool {
        self.fixed().matches(path, rule)
    }
}

/// Immutable filter list. Cheap to clone into worker threads.
#[derive(Clone, Default)]
pub struct FilterSet {
    filters: Arc<[FilterFn]>,
}

impl FilterSet {
    /// False on the first rejecting predicate; true if all pass or the set is empty.
    pub fn matches(&self, path: &Path, rule: &Rule) -> bool {
        self.filters.iter().all(|f| f(path, rule))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

pub fn exceeds_size_limit(meta: &Metadata, rule: &Rule) -> bool {
    meta.len() > rule.max_file_size
}

/// Modified less than `collect_wait_secs` ago (may still be written).
pub fn is_settling(meta: &Metadata, rule: &Rule, now: i64) -> bool {
    mtime_secs(meta).saturating_add(rule.collect_wait_secs) > now
}

/// Standard walker filter: basic conditions for a file to be collected.
///
/// Order matters: unreadable or non-regular files are rejected first, then an allowed empty file
/// is accepted outright, then size, hidden name and settle time are checked.
pub fn generic_file_filter(path: &Path, rule: &Rule) -> bool {
    // not exists or permission not allow
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    if rule.allow_empty_files && meta.len() == 0 {
        return true;
    }
    if exceeds_size_limit(&meta, rule) {
        return false;
    }
    if is_hidden(path) {
        return false;
    }
    if is_settling(&meta, rule, now_secs()) {
        return false;
    }
    true
}

/// Standard collector filter: accepts everything the walker let through.
pub fn allow_all(_path: &Path, _rule: &Rule) -> bool {
    true
}
