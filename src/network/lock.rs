//! Binary lock token guarding a node against removal.

use parking_lot::{Condvar, Mutex};

/// Non-reentrant lock with explicit acquire/release.
///
/// Unlike a mutex guard, the holder is not tied to a scope: traversal code
/// acquires it when it yields a node and releases it when it advances, and
/// the engine acquires it before removing the node.
#[derive(Debug, Default)]
pub struct LockToken {
    held: Mutex<bool>,
    released: Condvar,
}

impl LockToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the token is free, then take it.
    pub fn acquire(&self) {
        let mut held = self.held.lock();
        while *held {
            self.released.wait(&mut held);
        }
        *held = true;
    }

    /// Take the token if it is free.
    pub fn try_acquire(&self) -> bool {
        let mut held = self.held.lock();
        if *held {
            return false;
        }
        *held = true;
        true
    }

    /// Release the token. Returns `false` if it was not held.
    pub fn release(&self) -> bool {
        let mut held = self.held.lock();
        if !*held {
            return false;
        }
        *held = false;
        drop(held);
        self.released.notify_one();
        true
    }

    pub fn is_held(&self) -> bool {
        *self.held.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_acquire_release() {
        let token = LockToken::new();
        assert!(!token.is_held());
        token.acquire();
        assert!(token.is_held());
        assert!(!token.try_acquire());
        assert!(token.release());
        assert!(!token.release());
        assert!(token.try_acquire());
    }

    #[test]
    fn test_acquire_waits_for_release() {
        let token = Arc::new(LockToken::new());
        let acquired = Arc::new(AtomicBool::new(false));
        token.acquire();

        let waiter = {
            let token = token.clone();
            let acquired = acquired.clone();
            std::thread::spawn(move || {
                token.acquire();
                acquired.store(true, Ordering::SeqCst);
                token.release();
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        token.release();
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
