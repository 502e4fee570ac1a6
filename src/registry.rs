//! Process-wide generator of unique attribute names, and the observer protocol used to
//! propagate merges to every formula and port that references a merged literal.
//!
//! The original registry memoizes ordinals per `(context, registering-object-identity)`
//! so that re-querying the same Python object returns the same name. In this crate every
//! [`Attribute`] is allocated exactly once and owns its ordinal for its whole lifetime, so
//! that memoization has no remaining behavioural purpose; [`AttributeRegistry::allocate`]
//! simply hands out the next ordinal for a `base` and records nothing further.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::{LazyLock, Mutex};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{ContractError, ContractResult};

/// Scopes literal unique-naming to a single parse/contract session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// Process-global counters, one per `base_name`, plus the allocator for fresh
/// [`ContextId`]s. Thread-safe so it can live behind a `static` even though the rest of
/// the crate assumes the single-threaded cooperative model of the specification.
pub struct AttributeRegistry {
    counters: Mutex<FxHashMap<String, u64>>,
    next_context: Mutex<u64>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        AttributeRegistry {
            counters: Mutex::new(FxHashMap::default()),
            next_context: Mutex::new(0),
        }
    }

    pub fn new_context(&self) -> ContextId {
        let mut next = self.next_context.lock().expect("registry mutex poisoned");
        let id = *next;
        *next += 1;
        ContextId(id)
    }

    /// Allocates a fresh [`Attribute`] with the next ordinal for `base`.
    pub fn allocate(&self, context: ContextId, base: &str) -> Attribute {
        let mut counters = self.counters.lock().expect("registry mutex poisoned");
        let ordinal = counters.entry(base.to_string()).or_insert(0);
        let assigned = *ordinal;
        *ordinal += 1;
        debug!(base, context = context.0, ordinal = assigned, "allocated attribute");
        Attribute::new(base.to_string(), context, assigned)
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide default registry, lazily constructed on first use.
pub static DEFAULT_REGISTRY: LazyLock<AttributeRegistry> = LazyLock::new(AttributeRegistry::new);

/// Receives notification that a [`Attribute`] it referenced has been merged into another.
pub trait Observer {
    fn update(&self, subject: &Attribute);
}

struct AttributeInner {
    base: String,
    context: ContextId,
    ordinal: u64,
    merged_into: Option<Attribute>,
    observers: Vec<Rc<dyn Observer>>,
}

/// A `(base, context, ordinal)` unique name, and the subject half of the observer
/// protocol: merging one attribute into another notifies every attached observer.
#[derive(Clone)]
pub struct Attribute(Rc<RefCell<AttributeInner>>);

impl Attribute {
    pub fn new(base: String, context: ContextId, ordinal: u64) -> Self {
        Attribute(Rc::new(RefCell::new(AttributeInner {
            base,
            context,
            ordinal,
            merged_into: None,
            observers: Vec::new(),
        })))
    }

    /// Attaches a new observer; attaching the same observer twice is a no-op.
    pub fn attach(&self, observer: Rc<dyn Observer>) {
        let mut inner = self.0.borrow_mut();
        if !inner
            .observers
            .iter()
            .any(|existing| Rc::ptr_eq(existing, &observer))
        {
            inner.observers.push(observer);
        }
    }

    /// Detaches a previously attached observer. Detaching an absent observer indicates a
    /// caller bug and panics, matching the original's unguarded `set.remove`.
    pub fn detach(&self, observer: &Rc<dyn Observer>) {
        let mut inner = self.0.borrow_mut();
        let position = inner
            .observers
            .iter()
            .position(|existing| Rc::ptr_eq(existing, observer))
            .expect("detach called with an observer that was never attached");
        inner.observers.remove(position);
    }

    /// Notifies every currently attached observer, over a snapshot taken before the first
    /// call so that observers may detach (or attach) during their own `update`.
    fn notify(&self) {
        let snapshot: Vec<Rc<dyn Observer>> = self.0.borrow().observers.clone();
        for observer in snapshot {
            observer.update(self);
        }
    }

    /// Merges `self` into `target`: `self` is never used for further naming again, and
    /// every observer of `self` is notified. Idempotent if `self` is already merged into
    /// `target`.
    pub fn merge(&self, target: &Attribute) {
        {
            let mut inner = self.0.borrow_mut();
            if let Some(existing) = &inner.merged_into {
                if existing == target {
                    return;
                }
            }
            inner.merged_into = Some(target.clone());
        }
        self.notify();
    }

    /// Returns the attribute `self` was merged into, or an error if it has not merged.
    pub fn get_state(&self) -> ContractResult<Attribute> {
        self.0
            .borrow()
            .merged_into
            .clone()
            .ok_or_else(|| ContractError::attribute_state("attribute read before merge"))
    }

    /// Follows the merge chain to the live, never-merged attribute `self` ultimately
    /// denotes. Returns `self` if it has never been merged.
    pub fn resolve(&self) -> Attribute {
        let mut current = self.clone();
        loop {
            let next = current.0.borrow().merged_into.clone();
            match next {
                Some(target) => current = target,
                None => return current,
            }
        }
    }

    pub fn base_name(&self) -> String {
        self.resolve().0.borrow().base.clone()
    }

    pub fn context(&self) -> ContextId {
        self.resolve().0.borrow().context
    }

    pub fn unique_name(&self) -> String {
        let canonical = self.resolve();
        let inner = canonical.0.borrow();
        format!("{}_{}", inner.base, inner.ordinal)
    }

    pub fn is_merged(&self) -> bool {
        self.0.borrow().merged_into.is_some()
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.resolve().0, &other.resolve().0)
    }
}

impl Eq for Attribute {}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("unique_name", &self.unique_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Recorder {
        seen: RefCell<Vec<String>>,
    }

    impl Observer for Recorder {
        fn update(&self, subject: &Attribute) {
            self.seen
                .borrow_mut()
                .push(subject.get_state().unwrap().unique_name());
        }
    }

    #[test]
    fn unique_names_differ_for_same_base_and_context() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = registry.allocate(ctx, "x");
        let b = registry.allocate(ctx, "x");
        assert_ne!(a.unique_name(), b.unique_name());
    }

    #[test]
    fn merge_notifies_observers_with_new_state() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let old = registry.allocate(ctx, "a");
        let new = registry.allocate(ctx, "b");

        let recorder = Rc::new(Recorder {
            seen: RefCell::new(Vec::new()),
        });
        old.attach(recorder.clone());

        old.merge(&new);

        assert_eq!(recorder.seen.borrow()[0], new.unique_name());
        assert_eq!(old.unique_name(), new.unique_name());
        assert!(old.is_merged());
    }

    #[test]
    fn merge_is_idempotent_for_already_merged_pair() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let old = registry.allocate(ctx, "a");
        let new = registry.allocate(ctx, "b");

        let calls = Rc::new(Cell::new(0));
        struct Counter(Rc<Cell<u32>>);
        impl Observer for Counter {
            fn update(&self, _subject: &Attribute) {
                self.0.set(self.0.get() + 1);
            }
        }
        let observer = Rc::new(Counter(calls.clone()));
        old.attach(observer);

        old.merge(&new);
        old.merge(&new);

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn get_state_fails_before_merge() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = registry.allocate(ctx, "a");
        assert!(a.get_state().is_err());
    }
}
