//! Registries mapping source identifiers to independent tracker states.
//!
//! [`TrackerRegistry`] is the single-owner form: `&mut self` already
//! guarantees one `assign` per source at a time. [`SharedTrackerRegistry`]
//! can be cloned across threads and guards each source with its own lock so
//! that calls for different sources never contend.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use log::debug;

use crate::bbox::validate_boxes;
use crate::track::TrackId;
use crate::tracker::{TrackerConfig, TrackerState};
use crate::{BoundingBox, Result};

/// Owns one [`TrackerState`] per source.
#[derive(Debug, Clone)]
pub struct TrackerRegistry<K = String> {
    config: TrackerConfig,
    states: HashMap<K, TrackerState>,
}

impl<K> TrackerRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create an empty registry. Every source state uses `config`.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            states: HashMap::new(),
        })
    }

    /// Create a fresh state for `source`.
    ///
    /// Returns `false` (and keeps the existing state) if the source is
    /// already registered.
    pub fn register(&mut self, source: K) -> bool {
        if self.states.contains_key(&source) {
            return false;
        }
        debug!("registering tracker state for source {:?}", source);
        let state = TrackerState::with_validated_config(self.config.clone());
        self.states.insert(source, state);
        true
    }

    /// Drop the state of `source`, returning it if present.
    pub fn remove<Q>(&mut self, source: &Q) -> Option<TrackerState>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let removed = self.states.remove(source);
        if removed.is_some() {
            debug!("removed tracker state for source {:?}", source);
        }
        removed
    }

    /// Assign identities to the boxes of the current frame of `source`.
    ///
    /// A source seen for the first time is registered before assignment.
    pub fn assign<Q>(&mut self, source: &Q, boxes: &[BoundingBox]) -> Vec<TrackId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        if !self.states.contains_key(source) {
            self.register(source.to_owned());
        }
        self.states
            .get_mut(source)
            .map(|state| state.assign(boxes))
            .unwrap_or_default()
    }

    /// Like [`assign`](Self::assign), but rejects non-finite coordinates
    /// before touching any state.
    pub fn try_assign<Q>(&mut self, source: &Q, boxes: &[BoundingBox]) -> Result<Vec<TrackId>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        validate_boxes(boxes)?;
        Ok(self.assign(source, boxes))
    }

    /// Inspect the state of `source`.
    pub fn state<Q>(&self, source: &Q) -> Option<&TrackerState>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.states.get(source)
    }

    pub fn contains<Q>(&self, source: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.states.contains_key(source)
    }

    /// Registered source identifiers, in no particular order.
    pub fn sources(&self) -> impl Iterator<Item = &K> {
        self.states.keys()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

type SharedState = Arc<Mutex<TrackerState>>;

/// Thread-safe registry with one lock per source.
///
/// Clones share the same underlying states.
#[derive(Debug, Clone)]
pub struct SharedTrackerRegistry<K = String> {
    config: TrackerConfig,
    states: Arc<Mutex<HashMap<K, SharedState>>>,
}

impl<K> SharedTrackerRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            states: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    // The map lock is held only while looking up or inserting the entry.
    fn source_state<Q>(&self, source: &Q) -> SharedState
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get(source) {
            return Arc::clone(state);
        }
        debug!("registering shared tracker state for source {:?}", source);
        let state = Arc::new(Mutex::new(TrackerState::with_validated_config(
            self.config.clone(),
        )));
        states.insert(source.to_owned(), Arc::clone(&state));
        state
    }

    /// Assign identities, waiting for any in-flight call on the same source.
    pub fn assign<Q>(&self, source: &Q, boxes: &[BoundingBox]) -> Vec<TrackId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        let state = self.source_state(source);
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.assign(boxes)
    }

    /// Assign identities only if no other call on the same source is in flight.
    ///
    /// Returns `None` (dropping this frame) when the source is busy.
    pub fn try_assign_now<Q>(&self, source: &Q, boxes: &[BoundingBox]) -> Option<Vec<TrackId>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ToOwned<Owned = K> + ?Sized,
    {
        let state = self.source_state(source);
        let mut guard = match state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("source {:?} busy, dropping frame", source);
                return None;
            }
        };
        Some(guard.assign(boxes))
    }

    /// Run `f` against the state of `source`, holding that source's lock.
    pub fn with_state<Q, R>(&self, source: &Q, f: impl FnOnce(&TrackerState) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = {
            let states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
            states.get(source).map(Arc::clone)?
        };
        let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&guard))
    }

    /// Forget `source`. In-flight calls on it finish against the detached state.
    pub fn remove<Q>(&self, source: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = states.remove(source).is_some();
        if removed {
            debug!("removed shared tracker state for source {:?}", source);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
