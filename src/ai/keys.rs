//! Round-robin pool of upstream API keys.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ApiKeyPool {
    keys: Arc<Vec<String>>,
    cursor: Arc<AtomicUsize>,
}

impl ApiKeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: Arc::new(keys),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Next key in rotation, or None if the pool is unconfigured.
    pub fn next(&self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        self.keys.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_yields_nothing() {
        let pool = ApiKeyPool::new(Vec::new());
        assert!(pool.is_empty());
        assert_eq!(pool.next(), None);
    }

    #[test]
    fn keys_rotate_round_robin() {
        let pool = ApiKeyPool::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.next().as_deref(), Some("a"));
        assert_eq!(pool.next().as_deref(), Some("b"));
        assert_eq!(pool.next().as_deref(), Some("c"));
        assert_eq!(pool.next().as_deref(), Some("a"));
    }

    #[test]
    fn clones_share_the_cursor() {
        let pool = ApiKeyPool::new(vec!["a".into(), "b".into()]);
        let clone = pool.clone();
        assert_eq!(pool.next().as_deref(), Some("a"));
        assert_eq!(clone.next().as_deref(), Some("b"));
    }
}
