//! Generational slot storage for tree entities.
//!
//! A key is an index plus the generation of the slot when it was issued.
//! Removing an entry bumps the slot's generation, so keys to removed
//! entities never resolve again even after the slot is reused.

use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RawKey {
    index: u32,
    generation: u32,
}

pub(crate) trait ArenaKey: Copy {
    fn from_raw(raw: RawKey) -> Self;
    fn raw(self) -> RawKey;
}

macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(RawKey);

        impl ArenaKey for $name {
            fn from_raw(raw: RawKey) -> Self {
                Self(raw)
            }

            fn raw(self) -> RawKey {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}.{}", $prefix, self.0.index, self.0.generation)
            }
        }
    };
}

define_key!(
    /// Handle to a node in a [`Network`](super::Network).
    NodeKey,
    "node#"
);
define_key!(
    /// Handle to a mib in a [`Network`](super::Network).
    MibKey,
    "mib#"
);
define_key!(
    /// Handle to a variable in a [`Network`](super::Network).
    VarKey,
    "var#"
);

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub(crate) struct Arena<K, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _key: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, T> Arena<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _key: PhantomData,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> K {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return K::from_raw(RawKey {
                index,
                generation: slot.generation,
            });
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        K::from_raw(RawKey {
            index,
            generation: 0,
        })
    }

    pub(crate) fn get(&self, key: K) -> Option<&T> {
        let raw = key.raw();
        self.slots
            .get(raw.index as usize)
            .filter(|slot| slot.generation == raw.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, key: K) -> Option<&mut T> {
        let raw = key.raw();
        self.slots
            .get_mut(raw.index as usize)
            .filter(|slot| slot.generation == raw.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub(crate) fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn remove(&mut self, key: K) -> Option<T> {
        let raw = key.raw();
        let slot = self.slots.get_mut(raw.index as usize)?;
        if slot.generation != raw.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(raw.index);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena: Arena<NodeKey, &str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_stale_key_after_reuse() {
        let mut arena: Arena<VarKey, u32> = Arena::new();
        let old = arena.insert(1);
        assert_eq!(arena.remove(old), Some(1));
        assert_eq!(arena.remove(old), None);

        let new = arena.insert(2);
        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
        assert!(!arena.contains(old));
    }

    #[test]
    fn test_clear_invalidates_keys() {
        let mut arena: Arena<MibKey, u32> = Arena::new();
        let k = arena.insert(7);
        arena.clear();
        assert_eq!(arena.len(), 0);
        assert_eq!(arena.get(k), None);
        let k2 = arena.insert(8);
        assert_eq!(arena.get(k2), Some(&8));
    }

    #[test]
    fn test_key_display() {
        let mut arena: Arena<NodeKey, ()> = Arena::new();
        let k = arena.insert(());
        assert_eq!(k.to_string(), "node#0.0");
    }
}
