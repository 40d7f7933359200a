//! Compiled-class cache with a single compilation in flight per name.
//!
//! Each entry moves through `absent -> compiling -> ready`. The thread that finds an entry
//! absent claims it and compiles outside the lock. Other threads asking for the same name block
//! on a condition variable until the entry is ready, then share the result. The compiling
//! thread itself, should it ask again for the name it is compiling (a cyclic reference),
//! receives the placeholder registered when it claimed the entry instead of deadlocking or
//! recursing.

use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex},
    thread::{self, ThreadId},
};

use log::debug;

use crate::{
    schema::{ClassDef, QualifiedName},
    Result,
};

enum Slot {
    Compiling {
        owner: ThreadId,
        placeholder: Arc<ClassDef>,
    },
    Ready(Arc<ClassDef>),
}

/// Thread-safe map from qualified name to compiled class.
#[derive(Default)]
pub(crate) struct ClassCache {
    slots: Mutex<HashMap<QualifiedName, Slot>>,
    changed: Condvar,
}

/// Releases a claimed slot if compilation unwinds before completing.
struct Claim<'a> {
    cache: &'a ClassCache,
    name: &'a QualifiedName,
    armed: bool,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut slots) = self.cache.slots.lock() {
            if matches!(slots.get(self.name), Some(Slot::Compiling { .. })) {
                slots.remove(self.name);
            }
        }
        self.cache.changed.notify_all();
    }
}

impl ClassCache {
    /// Return the cached class, or run `compile` exactly once for this name.
    ///
    /// A failed compilation leaves the entry absent so a later request can retry.
    ///
    /// # Errors
    /// Returns the error produced by `compile`, or [`crate::Error::LockError`] when the cache
    /// lock is poisoned.
    pub(crate) fn get_or_insert_with<F>(&self, name: &QualifiedName, compile: F) -> Result<Arc<ClassDef>>
    where
        F: FnOnce() -> Result<ClassDef>,
    {
        let current = thread::current().id();
        {
            let mut slots = lock!(self.slots);
            loop {
                let in_flight = match slots.get(name) {
                    Some(Slot::Ready(class)) => return Ok(class.clone()),
                    Some(Slot::Compiling { owner, placeholder }) if *owner == current => {
                        debug!("{name}: cyclic request while compiling, returning placeholder");
                        return Ok(placeholder.clone());
                    }
                    Some(Slot::Compiling { .. }) => true,
                    None => false,
                };
                if !in_flight {
                    break;
                }
                slots = wait!(self.changed, slots);
            }
            slots.insert(
                name.clone(),
                Slot::Compiling {
                    owner: current,
                    placeholder: Arc::new(ClassDef::empty(name.clone())),
                },
            );
        }

        let mut claim = Claim {
            cache: self,
            name,
            armed: true,
        };
        let result = compile();

        let mut slots = lock!(self.slots);
        claim.armed = false;
        let outcome = match result {
            Ok(class) => {
                let class = Arc::new(class);
                slots.insert(name.clone(), Slot::Ready(class.clone()));
                debug!("{name}: cached");
                Ok(class)
            }
            Err(error) => {
                slots.remove(name);
                Err(error)
            }
        };
        drop(slots);
        self.changed.notify_all();
        outcome
    }

    /// Store an already compiled class, replacing any ready entry of the same name.
    pub(crate) fn insert(&self, class: ClassDef) -> Result<Arc<ClassDef>> {
        let class = Arc::new(class);
        let mut slots = lock!(self.slots);
        slots.insert(class.name.clone(), Slot::Ready(class.clone()));
        drop(slots);
        self.changed.notify_all();
        Ok(class)
    }

    /// The ready entry for `name`, without compiling.
    pub(crate) fn get(&self, name: &QualifiedName) -> Result<Option<Arc<ClassDef>>> {
        let slots = lock!(self.slots);
        Ok(match slots.get(name) {
            Some(Slot::Ready(class)) => Some(class.clone()),
            _ => None,
        })
    }

    /// Number of ready entries.
    pub(crate) fn len(&self) -> Result<usize> {
        let slots = lock!(self.slots);
        Ok(slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count())
    }
}
