//! Interface selection port.
//!
//! When a router has more than one free port and the caller did not name
//! one, the registry asks an [`InterfaceSelector`]. The lab UI plugs a
//! dialog in here; tests and the CLI use the selectors below.

use crate::device::{Device, InterfaceName};

/// Picks a router port out of the currently free candidates.
///
/// The registry only asks when at least two ports are free, so `candidates`
/// is never empty there. Returning a name outside `candidates` makes the
/// registry fall back to the first candidate. Implementations called
/// directly with an empty slice answer [`InterfaceName::Lan`].
pub trait InterfaceSelector {
    fn choose_interface(&mut self, router: &Device, candidates: &[InterfaceName]) -> InterfaceName;
}

impl<F> InterfaceSelector for F
where
    F: FnMut(&Device, &[InterfaceName]) -> InterfaceName,
{
    fn choose_interface(&mut self, router: &Device, candidates: &[InterfaceName]) -> InterfaceName {
        self(router, candidates)
    }
}

/// Answer for an empty candidate list
fn first_or_lan(candidates: &[InterfaceName]) -> InterfaceName {
    candidates.first().copied().unwrap_or(InterfaceName::Lan)
}

/// Always takes the first offered port
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl InterfaceSelector for FirstAvailable {
    fn choose_interface(&mut self, _router: &Device, candidates: &[InterfaceName]) -> InterfaceName {
        first_or_lan(candidates)
    }
}

/// Takes the first candidate that appears in a preference list, otherwise
/// the first candidate
#[derive(Debug, Clone)]
pub struct PreferenceSelector {
    preferences: Vec<InterfaceName>,
}

impl PreferenceSelector {
    pub fn new(preferences: Vec<InterfaceName>) -> Self {
        Self { preferences }
    }
}

impl Default for PreferenceSelector {
    /// LAN ports before the uplink
    fn default() -> Self {
        Self::new(vec![InterfaceName::Lan, InterfaceName::Lan2, InterfaceName::Wan])
    }
}

impl InterfaceSelector for PreferenceSelector {
    fn choose_interface(&mut self, router: &Device, candidates: &[InterfaceName]) -> InterfaceName {
        let chosen = self
            .preferences
            .iter()
            .find(|preferred| candidates.contains(preferred))
            .copied()
            .unwrap_or_else(|| first_or_lan(candidates));
        log::debug!("Selected {} on {} from {:?}", chosen, router.name, candidates);
        chosen
    }
}
