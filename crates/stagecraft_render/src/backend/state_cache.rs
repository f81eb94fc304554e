//! Capability state cache.

use super::{Capability, GraphicsBackend};
use crate::error::BackendResult;

/// Remembers the last capability state sent to the backend and drops
/// redundant calls.
#[derive(Clone, Debug, Default)]
pub struct StateCache {
    states: [Option<bool>; Capability::ALL.len()],
    calls_issued: u64,
    calls_elided: u64,
}

impl StateCache {
    /// Creates a cache that knows nothing about the device state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `capability` on `backend` unless it is already in that state.
    ///
    /// Returns `true` if the backend was called. A failed call leaves the
    /// cached state unknown.
    ///
    /// # Errors
    ///
    /// Propagates the backend failure.
    pub fn set(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        capability: Capability,
        enabled: bool,
    ) -> BackendResult<bool> {
        let slot = &mut self.states[capability.index()];
        if *slot == Some(enabled) {
            self.calls_elided += 1;
            return Ok(false);
        }
        *slot = None;
        backend.set_capability(capability, enabled)?;
        self.states[capability.index()] = Some(enabled);
        self.calls_issued += 1;
        Ok(true)
    }

    /// Cached state, `None` if unknown.
    #[must_use]
    pub fn get(&self, capability: Capability) -> Option<bool> {
        self.states[capability.index()]
    }

    /// Forgets every cached state, e.g. after a device reset.
    pub fn invalidate(&mut self) {
        self.states = [None; Capability::ALL.len()];
    }

    /// Backend calls made.
    #[must_use]
    pub const fn calls_issued(&self) -> u64 {
        self.calls_issued
    }

    /// Calls skipped because the state already matched.
    #[must_use]
    pub const fn calls_elided(&self) -> u64 {
        self.calls_elided
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, RecordingBackend};

    #[test]
    fn test_repeated_state_is_elided() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();

        assert!(cache.set(&mut backend, Capability::Blend, true).expect("set"));
        assert!(!cache.set(&mut backend, Capability::Blend, true).expect("set"));
        assert!(cache.set(&mut backend, Capability::Blend, false).expect("set"));

        let calls = backend.calls();
        assert_eq!(
            calls,
            vec![
                BackendCall::SetCapability(Capability::Blend, true),
                BackendCall::SetCapability(Capability::Blend, false),
            ]
        );
        assert_eq!(cache.calls_elided(), 1);
    }

    #[test]
    fn test_invalidate_forces_reissue() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        cache.set(&mut backend, Capability::DepthTest, true).expect("set");
        cache.invalidate();
        assert_eq!(cache.get(Capability::DepthTest), None);
        assert!(cache.set(&mut backend, Capability::DepthTest, true).expect("set"));
        assert_eq!(backend.calls().len(), 2);
    }
}
