use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;

/// A provider credential. Never printed in full; `Debug` redacts.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Round-robin dispenser of provider credentials.
///
/// The candidate list is filtered of blanks and shuffled once at
/// construction, then cycled forever. There is no health tracking or
/// back-off: a key that just failed is eligible again on the very next
/// call. That is a known limitation of the rotation scheme, kept as-is.
pub struct KeyRotator {
    keys: Vec<ApiKey>,
    cursor: AtomicUsize,
}

impl KeyRotator {
    pub fn new(candidates: Vec<String>) -> Self {
        let mut keys: Vec<ApiKey> = candidates
            .into_iter()
            .filter(|k| !k.trim().is_empty())
            .map(ApiKey)
            .collect();
        keys.shuffle(&mut rand::rng());
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// The next credential in rotation, or `None` when none are
    /// configured. Callers treat `None` as "provider unavailable" and
    /// degrade; it is not an error.
    ///
    /// The cursor is a single atomic, so concurrent turns never observe
    /// the same key through a lost update. Strict fairness under
    /// contention is not guaranteed and not required.
    pub fn next_key(&self) -> Option<ApiKey> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(self.keys[index].clone())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
