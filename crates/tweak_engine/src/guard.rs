//! Per-tweak in-flight guard and last-error map.
//!
//! At most one operation may be in flight per tweak id. A claim is an RAII
//! token: dropping it releases the ids, whichever way the operation ends.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tweak_common::TweakId;

#[derive(Debug, Clone, Default)]
pub struct LoadingGuard {
    in_flight: Arc<Mutex<HashSet<TweakId>>>,
}

impl LoadingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every id at once, or none.
    ///
    /// On conflict returns the ids that are already in flight.
    pub fn try_claim<I, S>(&self, ids: I) -> Result<InFlightClaim, Vec<TweakId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut wanted: Vec<TweakId> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        wanted.sort();
        wanted.dedup();

        let mut set = self.lock();
        let busy: Vec<TweakId> = wanted
            .iter()
            .filter(|id| set.contains(id.as_str()))
            .cloned()
            .collect();
        if !busy.is_empty() {
            return Err(busy);
        }
        set.extend(wanted.iter().cloned());
        drop(set);

        Ok(InFlightClaim {
            ids: wanted,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_loading(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<TweakId>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the duration of one operation
#[derive(Debug)]
pub struct InFlightClaim {
    ids: Vec<TweakId>,
    in_flight: Arc<Mutex<HashSet<TweakId>>>,
}

impl InFlightClaim {
    pub fn ids(&self) -> &[TweakId] {
        &self.ids
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            set.remove(id);
        }
    }
}

/// Last failure message per tweak
#[derive(Debug, Clone, Default)]
pub struct ErrorMap {
    errors: BTreeMap<TweakId, String>,
}

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: &str, message: impl Into<String>) {
        self.errors.insert(id.to_string(), message.into());
    }

    pub fn clear(&mut self, id: &str) -> Option<String> {
        self.errors.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.errors.get(id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_rejected_until_release() {
        let guard = LoadingGuard::new();
        let claim = guard.try_claim(["a"]).unwrap();
        assert!(guard.is_loading("a"));

        let busy = guard.try_claim(["a"]).unwrap_err();
        assert_eq!(busy, vec!["a".to_string()]);

        drop(claim);
        assert!(!guard.is_loading("a"));
        assert!(guard.try_claim(["a"]).is_ok());
    }

    #[test]
    fn test_multi_claim_is_all_or_nothing() {
        let guard = LoadingGuard::new();
        let _b = guard.try_claim(["b"]).unwrap();

        let busy = guard.try_claim(["a", "b", "c"]).unwrap_err();
        assert_eq!(busy, vec!["b".to_string()]);
        assert!(!guard.is_loading("a"));
        assert!(!guard.is_loading("c"));
        assert_eq!(guard.in_flight_count(), 1);
    }

    #[test]
    fn test_duplicate_ids_in_one_claim() {
        let guard = LoadingGuard::new();
        let claim = guard.try_claim(["a", "a"]).unwrap();
        assert_eq!(claim.ids(), ["a".to_string()]);
    }

    #[test]
    fn test_claim_released_on_panic() {
        let guard = LoadingGuard::new();
        let cloned = guard.clone();
        let result = std::panic::catch_unwind(move || {
            let _claim = cloned.try_claim(["a"]).unwrap();
            panic!("operation blew up");
        });
        assert!(result.is_err());
        assert!(!guard.is_loading("a"));
    }

    #[test]
    fn test_error_map() {
        let mut errors = ErrorMap::new();
        errors.set("a", "access denied");
        assert_eq!(errors.get("a"), Some("access denied"));
        assert_eq!(errors.clear("a").as_deref(), Some("access denied"));
        assert!(errors.is_empty());
    }
}
