use strum::Display;

/// runtime states a unit reports through the registry
///
/// The engine only ever classifies these (up-ish vs. down-ish); the actual
/// state machine lives with the unit implementations.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Display)]
pub enum UnitActiveState {
    ///
    UnitActive,
    ///
    UnitReloading,
    ///
    UnitInActive,
    ///
    UnitFailed,
    ///
    UnitActivating,
    ///
    UnitDeActivating,
    ///
    UnitMaintenance,
}

impl UnitActiveState {
    /// the unit is up, coming up, or refreshing itself
    pub fn is_active_or_activating(&self) -> bool {
        matches!(
            self,
            UnitActiveState::UnitActive
                | UnitActiveState::UnitActivating
                | UnitActiveState::UnitReloading
        )
    }

    /// the unit is down, one way or the other
    pub fn is_inactive_or_failed(&self) -> bool {
        matches!(
            self,
            UnitActiveState::UnitInActive | UnitActiveState::UnitFailed
        )
    }
}
