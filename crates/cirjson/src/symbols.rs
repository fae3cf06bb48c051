//! Property-name canonicalization. A factory owns one master table; each
//! reader takes an immutable snapshot plus a private growth map, and
//! merges its additions back when it finishes. Growth in one reader can
//! never corrupt another reader of the same factory.

use fxhash::FxHashMap;
use std::sync::{Arc, Mutex};

/// Names are bucketed by a folded 16-bit hash; an over-long chain within
/// one bucket indicates adversarial collision crafting.
const MAX_COLLISION_CHAIN: usize = 32;

/// Master tables are bounded unless interning is enabled, so a factory
/// processing many documents with unique names does not grow without limit.
const MAX_MASTER_NAMES: usize = 10_000;

type Table = FxHashMap<u16, Vec<Arc<str>>>;

fn bucket_of(name: &str) -> u16 {
    let h = fxhash::hash64(name.as_bytes());
    (h ^ (h >> 16) ^ (h >> 32) ^ (h >> 48)) as u16
}

/// Signals that a bucket's collision chain exceeded the allowed length.
#[derive(Debug, PartialEq, Eq)]
pub struct SymbolOverflow {
    pub name: String,
    pub chain_length: usize,
}

/// Factory-wide name table. Cheap to share; readers never lock it except
/// momentarily at scope start and finish.
#[derive(Debug)]
pub struct SymbolPool {
    master: Mutex<Arc<Table>>,
    master_names: Mutex<usize>,
    canonicalize: bool,
    intern: bool,
    fail_on_overflow: bool,
}

impl SymbolPool {
    pub fn new(canonicalize: bool, intern: bool, fail_on_overflow: bool) -> Arc<Self> {
        Arc::new(Self {
            master: Mutex::new(Arc::new(Table::default())),
            master_names: Mutex::new(0),
            canonicalize,
            intern,
            fail_on_overflow,
        })
    }

    /// Opens a per-reader scope over the current snapshot.
    pub fn scope(self: &Arc<Self>) -> SymbolScope {
        let snapshot = self.master.lock().expect("symbol pool poisoned").clone();
        SymbolScope {
            pool: self.clone(),
            snapshot,
            local: Table::default(),
            local_names: 0,
            disabled: !self.canonicalize,
            warned: false,
        }
    }

    /// Merges a finished scope's additions, replacing the shared snapshot
    /// wholesale so concurrent scopes are unaffected.
    fn merge(&self, additions: Table, added: usize) {
        if additions.is_empty() {
            return;
        }
        let mut names = self.master_names.lock().expect("symbol pool poisoned");
        if !self.intern && *names + added > MAX_MASTER_NAMES {
            tracing::debug!(
                names = *names,
                added,
                "symbol table at capacity; discarding document additions"
            );
            return;
        }
        let mut master = self.master.lock().expect("symbol pool poisoned");
        let mut next = (**master).clone();
        for (bucket, chain) in additions {
            let entry = next.entry(bucket).or_default();
            for name in chain {
                if !entry.iter().any(|n| **n == *name) {
                    entry.push(name);
                }
            }
        }
        *names += added;
        *master = Arc::new(next);
    }
}

/// Per-reader canonicalization scope.
pub struct SymbolScope {
    pool: Arc<SymbolPool>,
    snapshot: Arc<Table>,
    local: Table,
    local_names: usize,
    disabled: bool,
    warned: bool,
}

impl SymbolScope {
    /// Resolves a property name to its canonical shared allocation. When
    /// canonicalization is off or has degraded, every call allocates.
    ///
    /// Returns `Err` only when the collision chain overflows and the pool
    /// is configured to fail; otherwise overflow degrades this scope to
    /// per-name allocation for the remainder of the document.
    pub fn resolve(&mut self, name: &str) -> Result<Arc<str>, SymbolOverflow> {
        if self.disabled {
            return Ok(Arc::from(name));
        }
        let bucket = bucket_of(name);

        let snapshot_chain = self.snapshot.get(&bucket);
        if let Some(found) = snapshot_chain.and_then(|c| c.iter().find(|n| ***n == *name)) {
            return Ok(found.clone());
        }
        let local_chain = self.local.get(&bucket);
        if let Some(found) = local_chain.and_then(|c| c.iter().find(|n| ***n == *name)) {
            return Ok(found.clone());
        }

        let chain_length = snapshot_chain.map_or(0, Vec::len) + local_chain.map_or(0, Vec::len);
        if chain_length >= MAX_COLLISION_CHAIN {
            if self.pool.fail_on_overflow {
                return Err(SymbolOverflow {
                    name: name.to_string(),
                    chain_length,
                });
            }
            self.disabled = true;
            if !self.warned {
                self.warned = true;
                tracing::warn!(
                    chain_length,
                    "symbol hash collision overflow; canonicalization disabled for this document"
                );
            }
            return Ok(Arc::from(name));
        }

        let canonical: Arc<str> = Arc::from(name);
        self.local
            .entry(bucket)
            .or_default()
            .push(canonical.clone());
        self.local_names += 1;
        Ok(canonical)
    }

    /// Returns this scope's additions to the factory. Called on reader
    /// close; a degraded scope discards its additions. Afterwards the
    /// scope allocates per name.
    pub fn finish(&mut self) {
        if self.disabled {
            self.local.clear();
            return;
        }
        let additions = std::mem::take(&mut self.local);
        let added = std::mem::replace(&mut self.local_names, 0);
        self.pool.merge(additions, added);
        self.disabled = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_resolve_shares_allocation() {
        let pool = SymbolPool::new(true, false, true);
        let mut scope = pool.scope();
        let a = scope.resolve("name").unwrap();
        let b = scope.resolve("name").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(&*a, "name");
    }

    #[test]
    fn test_disabled_allocates_per_name() {
        let pool = SymbolPool::new(false, false, true);
        let mut scope = pool.scope();
        let a = scope.resolve("name").unwrap();
        let b = scope.resolve("name").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_merge_back_visible_to_next_scope() {
        let pool = SymbolPool::new(true, false, true);
        let mut scope = pool.scope();
        let first = scope.resolve("shared").unwrap();
        scope.finish();

        let mut scope = pool.scope();
        let second = scope.resolve("shared").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_scopes_are_isolated() {
        let pool = SymbolPool::new(true, false, true);
        let mut a = pool.scope();
        let mut b = pool.scope();
        // Growth in one scope is invisible to the other until merge.
        let from_a = a.resolve("grown").unwrap();
        let from_b = b.resolve("grown").unwrap();
        assert!(!Arc::ptr_eq(&from_a, &from_b));
    }

    /// Brute-forces names sharing one hash bucket to overflow a chain.
    fn colliding_names(count: usize) -> Vec<String> {
        let target = bucket_of("p0");
        let mut found = vec!["p0".to_string()];
        let mut i = 1u64;
        while found.len() < count {
            let candidate = format!("p{i}");
            if bucket_of(&candidate) == target {
                found.push(candidate);
            }
            i += 1;
        }
        found
    }

    #[test]
    fn test_overflow_fails_when_configured() {
        let pool = SymbolPool::new(true, false, true);
        let mut scope = pool.scope();
        let names = colliding_names(MAX_COLLISION_CHAIN + 1);
        let mut overflowed = None;
        for name in &names {
            if let Err(err) = scope.resolve(name) {
                overflowed = Some(err);
                break;
            }
        }
        let err = overflowed.expect("chain should overflow");
        assert_eq!(err.chain_length, MAX_COLLISION_CHAIN);
    }

    #[test]
    fn test_overflow_degrades_when_not_failing() {
        let pool = SymbolPool::new(true, false, false);
        let mut scope = pool.scope();
        let names = colliding_names(MAX_COLLISION_CHAIN + 2);
        for name in &names {
            scope.resolve(name).unwrap();
        }
        // Degraded: equal names now allocate separately.
        let last = &names[names.len() - 1];
        let a = scope.resolve(last).unwrap();
        let b = scope.resolve(last).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
