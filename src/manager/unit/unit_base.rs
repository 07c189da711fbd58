use strum::{Display, EnumIter};

/// kinds of units the manager knows about
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Display, EnumIter)]
pub enum UnitType {
    ///
    UnitService,
    ///
    UnitSocket,
    ///
    UnitTarget,
    ///
    UnitMount,
    ///
    UnitDevice,
}

impl UnitType {
    /// whether units of this kind can be started explicitly
    pub fn can_start(&self) -> bool {
        !matches!(self, UnitType::UnitDevice)
    }

    /// whether units of this kind support reloading
    pub fn can_reload(&self) -> bool {
        matches!(self, UnitType::UnitService | UnitType::UnitMount)
    }
}

/// load states a unit reports through the registry
#[derive(PartialEq, Eq, Clone, Copy, Debug, Display)]
pub enum UnitLoadState {
    ///
    UnitStub,
    ///
    UnitLoaded,
    ///
    UnitNotFound,
    ///
    UnitError,
    ///
    UnitMasked,
}

/// typed dependency edges between units
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Display, EnumIter)]
#[allow(missing_docs)]
pub enum UnitRelations {
    UnitRequires,
    UnitRequiresOverridable,
    UnitRequisite,
    UnitRequisiteOverridable,
    UnitWants,
    UnitBindsTo,
    UnitConflicts,
    UnitBefore,
    UnitAfter,
    UnitPropagatesReloadTo,

    UnitRequiredBy,
    UnitRequiredByOverridable,
    UnitWantedBy,
    UnitBoundBy,
    UnitConflictedBy,
    UnitReloadPropagatedFrom,
}

impl UnitRelations {
    /// the edge recorded on the other endpoint when this one is declared
    pub fn inverse(&self) -> UnitRelations {
        match self {
            UnitRelations::UnitRequires => UnitRelations::UnitRequiredBy,
            UnitRelations::UnitRequiresOverridable => UnitRelations::UnitRequiredByOverridable,
            UnitRelations::UnitRequisite => UnitRelations::UnitRequiredBy,
            UnitRelations::UnitRequisiteOverridable => UnitRelations::UnitRequiredByOverridable,
            UnitRelations::UnitWants => UnitRelations::UnitWantedBy,
            UnitRelations::UnitBindsTo => UnitRelations::UnitBoundBy,
            UnitRelations::UnitConflicts => UnitRelations::UnitConflictedBy,
            UnitRelations::UnitBefore => UnitRelations::UnitAfter,
            UnitRelations::UnitAfter => UnitRelations::UnitBefore,
            UnitRelations::UnitPropagatesReloadTo => UnitRelations::UnitReloadPropagatedFrom,
            UnitRelations::UnitRequiredBy => UnitRelations::UnitRequires,
            UnitRelations::UnitRequiredByOverridable => UnitRelations::UnitRequiresOverridable,
            UnitRelations::UnitWantedBy => UnitRelations::UnitWants,
            UnitRelations::UnitBoundBy => UnitRelations::UnitBindsTo,
            UnitRelations::UnitConflictedBy => UnitRelations::UnitConflicts,
            UnitRelations::UnitReloadPropagatedFrom => UnitRelations::UnitPropagatesReloadTo,
        }
    }
}

/// how a request deals with the jobs already queued or running
#[derive(PartialEq, Eq, Clone, Copy, Debug, Display)]
pub enum JobMode {
    /// fail if the request collides with pending jobs
    JobFail,
    /// replace colliding pending jobs
    JobReplace,
    /// replace, and stop every unit not pulled into the request
    JobIsolate,
    /// act on the named unit only, without requirement expansion
    JobIgnoreRequirements,
    /// like JobIgnoreRequirements, and ignore ordering too
    JobIgnoreDependencies,
}
