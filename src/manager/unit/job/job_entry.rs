use super::job_dependency::JobDependency;
use crate::manager::unit::data::UnitActiveState;
use crate::manager::unit::unit_entry::UnitX;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use strum::{Display, EnumIter};

pub(crate) type JobId = u32;

/// operations a job can carry out on a unit
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Display, EnumIter)]
pub enum JobKind {
    ///
    JobStart,
    /// assert that the unit is already up
    JobVerify,
    ///
    JobStop,
    ///
    JobReload,
    ///
    JobRestart,
    /// restart only if the unit is up
    JobTryRestart,
    /// reload if up, start otherwise
    JobReloadOrStart,
}

/// terminal results handed to the notify seam when a live job goes away
#[derive(PartialEq, Eq, Clone, Copy, Debug, Display)]
pub enum JobResult {
    ///
    JobDone,
    ///
    JobCanceled,
    /// replaced by a newly installed job on the same unit
    JobSuperseded,
    ///
    JobFailed,
    /// went away because a job it depended on went away
    JobDependency,
}

/// the request pair a client hands to the manager
#[derive(Clone)]
pub struct JobConf {
    unit: Rc<UnitX>,
    kind: JobKind,
}

impl JobConf {
    ///
    pub fn new(unit: &Rc<UnitX>, kind: JobKind) -> JobConf {
        JobConf {
            unit: Rc::clone(unit),
            kind,
        }
    }

    ///
    pub fn get_unit(&self) -> &Rc<UnitX> {
        &self.unit
    }

    ///
    pub fn get_kind(&self) -> JobKind {
        self.kind
    }
}

/// one pending or installed operation on one unit
///
/// While uninstalled the job is owned by its transaction; the scratch
/// fields (`generation`, `marker`) belong to whichever traversal is
/// currently running and carry no meaning across passes.
pub struct Job {
    // immutable
    id: JobId,
    unit: Rc<UnitX>,

    // rewritten by merging and installation
    kind: Cell<JobKind>,
    installed: Cell<bool>,
    force: Cell<bool>,
    ignore_order: Cell<bool>,

    // reconciliation scratch
    matters_to_anchor: Cell<bool>,
    generation: Cell<u32>,
    marker: RefCell<Option<Rc<Job>>>,

    // link graph: links where this job pulls others, links where it is pulled
    subject_list: RefCell<Vec<Rc<JobDependency>>>,
    object_list: RefCell<Vec<Rc<JobDependency>>>,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.unit.id(), self.kind.get())
    }
}

impl Job {
    pub(super) fn new(id: JobId, unit: &Rc<UnitX>, kind: JobKind) -> Job {
        Job {
            id,
            unit: Rc::clone(unit),
            kind: Cell::new(kind),
            installed: Cell::new(false),
            force: Cell::new(false),
            ignore_order: Cell::new(false),
            matters_to_anchor: Cell::new(false),
            generation: Cell::new(0),
            marker: RefCell::new(None),
            subject_list: RefCell::new(Vec::new()),
            object_list: RefCell::new(Vec::new()),
        }
    }

    ///
    pub fn id(&self) -> JobId {
        self.id
    }

    ///
    pub fn unit(&self) -> &Rc<UnitX> {
        &self.unit
    }

    ///
    pub fn kind(&self) -> JobKind {
        self.kind.get()
    }

    pub(super) fn set_kind(&self, kind: JobKind) {
        self.kind.set(kind);
    }

    ///
    pub fn installed(&self) -> bool {
        self.installed.get()
    }

    pub(super) fn set_installed(&self) {
        self.installed.set(true);
    }

    ///
    pub fn force(&self) -> bool {
        self.force.get()
    }

    pub(super) fn set_force(&self, force: bool) {
        self.force.set(force);
    }

    ///
    pub fn ignore_order(&self) -> bool {
        self.ignore_order.get()
    }

    pub(super) fn set_ignore_order(&self, ignore_order: bool) {
        self.ignore_order.set(ignore_order);
    }

    pub(super) fn matters_to_anchor(&self) -> bool {
        self.matters_to_anchor.get()
    }

    pub(super) fn set_matters_to_anchor(&self, matters: bool) {
        self.matters_to_anchor.set(matters);
    }

    pub(super) fn generation(&self) -> u32 {
        self.generation.get()
    }

    pub(super) fn set_generation(&self, generation: u32) {
        self.generation.set(generation);
    }

    pub(super) fn marker(&self) -> Option<Rc<Job>> {
        self.marker.borrow().clone()
    }

    pub(super) fn set_marker(&self, marker: Option<Rc<Job>>) {
        *self.marker.borrow_mut() = marker;
    }

    pub(super) fn attach_subject(&self, link: &Rc<JobDependency>) {
        self.subject_list.borrow_mut().push(Rc::clone(link));
    }

    pub(super) fn attach_object(&self, link: &Rc<JobDependency>) {
        self.object_list.borrow_mut().push(Rc::clone(link));
    }

    pub(super) fn detach_subject(&self, link: &Rc<JobDependency>) {
        self.subject_list.borrow_mut().retain(|l| !Rc::ptr_eq(l, link));
    }

    pub(super) fn detach_object(&self, link: &Rc<JobDependency>) {
        self.object_list.borrow_mut().retain(|l| !Rc::ptr_eq(l, link));
    }

    /// snapshot of the links this job holds on others
    pub(super) fn subject_links(&self) -> Vec<Rc<JobDependency>> {
        self.subject_list.borrow().clone()
    }

    /// snapshot of the links others hold on this job
    pub(super) fn object_links(&self) -> Vec<Rc<JobDependency>> {
        self.object_list.borrow().clone()
    }

    pub(super) fn object_list_empty(&self) -> bool {
        self.object_list.borrow().is_empty()
    }

    /// whether some link pulled this job in as a conflict stop
    pub(super) fn object_conflicted(&self) -> bool {
        self.object_list.borrow().iter().any(|l| l.conflicts())
    }
}

/// least upper bound of two job kinds, None if they cannot coexist
pub(super) fn job_kind_merge(a: JobKind, b: JobKind) -> Option<JobKind> {
    if a == b {
        return Some(a);
    }

    match (a, b) {
        (JobKind::JobStart, JobKind::JobVerify) | (JobKind::JobVerify, JobKind::JobStart) => {
            Some(JobKind::JobStart)
        }
        (JobKind::JobStart, JobKind::JobReload) | (JobKind::JobReload, JobKind::JobStart) => {
            Some(JobKind::JobReloadOrStart)
        }
        (JobKind::JobStart, JobKind::JobReloadOrStart)
        | (JobKind::JobReloadOrStart, JobKind::JobStart) => Some(JobKind::JobReloadOrStart),
        (JobKind::JobStart, JobKind::JobRestart) | (JobKind::JobRestart, JobKind::JobStart) => {
            Some(JobKind::JobRestart)
        }
        (JobKind::JobStart, JobKind::JobTryRestart)
        | (JobKind::JobTryRestart, JobKind::JobStart) => Some(JobKind::JobRestart),
        (JobKind::JobVerify, JobKind::JobReload) | (JobKind::JobReload, JobKind::JobVerify) => {
            Some(JobKind::JobReload)
        }
        (JobKind::JobVerify, JobKind::JobReloadOrStart)
        | (JobKind::JobReloadOrStart, JobKind::JobVerify) => Some(JobKind::JobReloadOrStart),
        (JobKind::JobVerify, JobKind::JobRestart) | (JobKind::JobRestart, JobKind::JobVerify) => {
            Some(JobKind::JobRestart)
        }
        (JobKind::JobVerify, JobKind::JobTryRestart)
        | (JobKind::JobTryRestart, JobKind::JobVerify) => Some(JobKind::JobTryRestart),
        (JobKind::JobStop, JobKind::JobTryRestart) | (JobKind::JobTryRestart, JobKind::JobStop) => {
            Some(JobKind::JobStop)
        }
        (JobKind::JobReload, JobKind::JobReloadOrStart)
        | (JobKind::JobReloadOrStart, JobKind::JobReload) => Some(JobKind::JobReloadOrStart),
        (JobKind::JobReload, JobKind::JobRestart) | (JobKind::JobRestart, JobKind::JobReload) => {
            Some(JobKind::JobRestart)
        }
        (JobKind::JobReload, JobKind::JobTryRestart)
        | (JobKind::JobTryRestart, JobKind::JobReload) => Some(JobKind::JobTryRestart),
        (JobKind::JobReloadOrStart, JobKind::JobRestart)
        | (JobKind::JobRestart, JobKind::JobReloadOrStart) => Some(JobKind::JobRestart),
        (JobKind::JobReloadOrStart, JobKind::JobTryRestart)
        | (JobKind::JobTryRestart, JobKind::JobReloadOrStart) => Some(JobKind::JobRestart),
        (JobKind::JobRestart, JobKind::JobTryRestart)
        | (JobKind::JobTryRestart, JobKind::JobRestart) => Some(JobKind::JobRestart),
        _ => None,
    }
}

pub(super) fn job_kind_is_mergeable(a: JobKind, b: JobKind) -> bool {
    job_kind_merge(a, b).is_some()
}

pub(super) fn job_kind_is_conflicting(a: JobKind, b: JobKind) -> bool {
    !job_kind_is_mergeable(a, b)
}

/// whether applying `kind` to a unit in `state` would change nothing
pub(super) fn job_kind_is_redundant(kind: JobKind, state: UnitActiveState) -> bool {
    match kind {
        JobKind::JobStart | JobKind::JobVerify => matches!(
            state,
            UnitActiveState::UnitActive | UnitActiveState::UnitReloading
        ),
        JobKind::JobStop | JobKind::JobTryRestart => state.is_inactive_or_failed(),
        JobKind::JobReload | JobKind::JobReloadOrStart => {
            state == UnitActiveState::UnitReloading
        }
        JobKind::JobRestart => false,
    }
}

/// whether executing `a` subsumes everything `b` would have done
pub(super) fn job_kind_is_superset(a: JobKind, b: JobKind) -> bool {
    if a == b {
        return true;
    }

    match a {
        JobKind::JobStart => b == JobKind::JobVerify,
        JobKind::JobReload => b == JobKind::JobVerify,
        JobKind::JobReloadOrStart => matches!(
            b,
            JobKind::JobStart | JobKind::JobVerify | JobKind::JobReload
        ),
        JobKind::JobRestart => matches!(
            b,
            JobKind::JobStart
                | JobKind::JobVerify
                | JobKind::JobReload
                | JobKind::JobReloadOrStart
                | JobKind::JobTryRestart
        ),
        JobKind::JobTryRestart => matches!(b, JobKind::JobVerify | JobKind::JobReload),
        _ => false,
    }
}

/// unit-class gate: some unit kinds cannot carry some operations
pub(super) fn job_is_unit_applicable(kind: JobKind, unit: &UnitX) -> bool {
    match kind {
        JobKind::JobStop | JobKind::JobVerify => true,
        JobKind::JobStart | JobKind::JobRestart | JobKind::JobTryRestart => unit.can_start(),
        JobKind::JobReload => unit.can_reload(),
        JobKind::JobReloadOrStart => unit.can_start() || unit.can_reload(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::unit::unit_base::UnitType;
    use strum::IntoEnumIterator;

    #[test]
    fn merge_is_commutative_and_idempotent() {
        for a in JobKind::iter() {
            assert_eq!(job_kind_merge(a, a), Some(a));
            for b in JobKind::iter() {
                assert_eq!(job_kind_merge(a, b), job_kind_merge(b, a));
            }
        }
    }

    #[test]
    fn merge_stop_is_absorbed_only_by_stop() {
        for other in JobKind::iter() {
            let merged = job_kind_merge(JobKind::JobStop, other);
            match other {
                JobKind::JobStop | JobKind::JobTryRestart => {
                    assert_eq!(merged, Some(JobKind::JobStop))
                }
                _ => assert_eq!(merged, None),
            }
        }
    }

    #[test]
    fn merge_lattice_spot_checks() {
        assert_eq!(
            job_kind_merge(JobKind::JobStart, JobKind::JobVerify),
            Some(JobKind::JobStart)
        );
        assert_eq!(
            job_kind_merge(JobKind::JobStart, JobKind::JobReload),
            Some(JobKind::JobReloadOrStart)
        );
        assert_eq!(
            job_kind_merge(JobKind::JobStart, JobKind::JobRestart),
            Some(JobKind::JobRestart)
        );
        assert_eq!(
            job_kind_merge(JobKind::JobReload, JobKind::JobRestart),
            Some(JobKind::JobRestart)
        );
        assert_eq!(
            job_kind_merge(JobKind::JobTryRestart, JobKind::JobRestart),
            Some(JobKind::JobRestart)
        );
    }

    #[test]
    fn merged_kind_subsumes_mergeable_inputs() {
        // whatever two start-side kinds collapse into must still cover both
        for a in JobKind::iter() {
            for b in JobKind::iter() {
                if let Some(m) = job_kind_merge(a, b) {
                    if m != JobKind::JobStop && m != JobKind::JobTryRestart {
                        assert!(
                            job_kind_is_superset(m, a) || job_kind_is_mergeable(m, a),
                            "{} does not cover {}",
                            m,
                            a
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn redundancy_against_states() {
        assert!(job_kind_is_redundant(
            JobKind::JobStart,
            UnitActiveState::UnitActive
        ));
        assert!(job_kind_is_redundant(
            JobKind::JobVerify,
            UnitActiveState::UnitReloading
        ));
        assert!(job_kind_is_redundant(
            JobKind::JobStop,
            UnitActiveState::UnitInActive
        ));
        assert!(job_kind_is_redundant(
            JobKind::JobStop,
            UnitActiveState::UnitFailed
        ));
        assert!(job_kind_is_redundant(
            JobKind::JobTryRestart,
            UnitActiveState::UnitInActive
        ));
        assert!(!job_kind_is_redundant(
            JobKind::JobStart,
            UnitActiveState::UnitInActive
        ));
        assert!(!job_kind_is_redundant(
            JobKind::JobRestart,
            UnitActiveState::UnitActive
        ));
        assert!(!job_kind_is_redundant(
            JobKind::JobReload,
            UnitActiveState::UnitActive
        ));
    }

    #[test]
    fn superset_covers_the_lattice_top() {
        assert!(job_kind_is_superset(JobKind::JobStart, JobKind::JobVerify));
        assert!(job_kind_is_superset(
            JobKind::JobReloadOrStart,
            JobKind::JobReload
        ));
        assert!(job_kind_is_superset(JobKind::JobRestart, JobKind::JobStart));
        assert!(!job_kind_is_superset(JobKind::JobStart, JobKind::JobStop));
        assert!(!job_kind_is_superset(JobKind::JobVerify, JobKind::JobStart));
        assert!(!job_kind_is_superset(JobKind::JobRestart, JobKind::JobStop));
    }

    #[test]
    fn applicability_follows_the_unit_kind() {
        let service = UnitX::new("a.service", UnitType::UnitService);
        let socket = UnitX::new("a.socket", UnitType::UnitSocket);
        let device = UnitX::new("dev-sda.device", UnitType::UnitDevice);

        assert!(job_is_unit_applicable(JobKind::JobReload, &service));
        assert!(!job_is_unit_applicable(JobKind::JobReload, &socket));
        assert!(job_is_unit_applicable(JobKind::JobStop, &socket));
        assert!(!job_is_unit_applicable(JobKind::JobStart, &device));
        assert!(job_is_unit_applicable(JobKind::JobVerify, &device));
    }

    #[test]
    fn job_display_names_unit_and_kind() {
        let u = UnitX::new("a.service", UnitType::UnitService);
        let j = Job::new(1, &u, JobKind::JobStart);
        assert_eq!(format!("{}", j), "a.service/JobStart");
    }
}
