//! Dense integer indices for stage string ids.
//!
//! Stages are addressed by `"{site}_{stage}"` strings at the boundary and by
//! dense `u32` indices everywhere inside the engine.

use rustc_hash::FxHashMap;

/// Dense stage index (position in the catalog's stage arena).
pub type StageIdx = u32;

/// Maps stage id strings to dense indices and back.
#[derive(Debug, Clone)]
pub struct StageIdInterner {
    to_idx: FxHashMap<String, StageIdx>,
    from_idx: Vec<String>,
}

impl StageIdInterner {
    /// Create a new interner with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_idx: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_idx: Vec::with_capacity(capacity),
        }
    }

    /// Assign the next dense index to `id`.
    ///
    /// Returns `None` if the id was already interned; catalogs must not
    /// contain duplicate stage ids.
    pub fn insert(&mut self, id: &str) -> Option<StageIdx> {
        if self.to_idx.contains_key(id) {
            return None;
        }
        let idx = self.from_idx.len() as StageIdx;
        self.from_idx.push(id.to_string());
        self.to_idx.insert(id.to_string(), idx);
        Some(idx)
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<StageIdx> {
        self.to_idx.get(id).copied()
    }

    #[inline]
    pub fn resolve(&self, idx: StageIdx) -> Option<&str> {
        self.from_idx.get(idx as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.from_idx.len()
    }
}

impl Default for StageIdInterner {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
