#![warn(unused_imports)]
use super::job_alloc::JobAlloc;
use super::job_dependency::JobDependency;
use super::job_entry::{job_is_unit_applicable, Job, JobKind};
use super::JobErrno;
use crate::manager::unit::unit_base::{UnitLoadState, UnitRelations};
use crate::manager::unit::unit_datastore::{UnitDep, UnitSets};
use crate::manager::unit::unit_entry::UnitX;
use bitflags::bitflags;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

bitflags! {
    /// request flags threaded through the builder recursion
    pub struct JobFlags: u8 {
        /// the inbound link marks the pulled job as essential
        const JOB_MATTERS = 1 << 0;
        /// "force through" flavor of the request
        const JOB_FORCE = 1 << 1;
        /// the inbound link is a conflict pull
        const JOB_CONFLICTS = 1 << 2;
        /// do not expand requirements of this request
        const JOB_IGNORE_REQUIREMENTS = 1 << 3;
        /// ordering through the created job is ignored
        const JOB_IGNORE_ORDER = 1 << 4;
    }
}

// how one dependency kind of the requested unit turns into a pulled job
struct ExpandRule {
    relation: UnitRelations,
    kind: ExpandKind,
    matters: ExpandMatters,
    conflicts: bool,
    // a failing pull of this kind fails the whole request
    fatal: bool,
    // wants-pulls shed the force flavor
    inherit_force: bool,
}

#[derive(Clone, Copy)]
enum ExpandKind {
    Fixed(JobKind),
    SameAsRequest,
}

#[derive(Clone, Copy)]
enum ExpandMatters {
    Always,
    Never,
    UnlessForced,
}

const EXPAND_START_RULES: &[ExpandRule] = &[
    ExpandRule {
        relation: UnitRelations::UnitRequires,
        kind: ExpandKind::Fixed(JobKind::JobStart),
        matters: ExpandMatters::Always,
        conflicts: false,
        fatal: true,
        inherit_force: true,
    },
    ExpandRule {
        relation: UnitRelations::UnitBindsTo,
        kind: ExpandKind::Fixed(JobKind::JobStart),
        matters: ExpandMatters::Always,
        conflicts: false,
        fatal: true,
        inherit_force: true,
    },
    ExpandRule {
        relation: UnitRelations::UnitRequiresOverridable,
        kind: ExpandKind::Fixed(JobKind::JobStart),
        matters: ExpandMatters::UnlessForced,
        conflicts: false,
        fatal: false,
        inherit_force: true,
    },
    ExpandRule {
        relation: UnitRelations::UnitWants,
        kind: ExpandKind::Fixed(JobKind::JobStart),
        matters: ExpandMatters::Never,
        conflicts: false,
        fatal: false,
        inherit_force: false,
    },
    ExpandRule {
        relation: UnitRelations::UnitRequisite,
        kind: ExpandKind::Fixed(JobKind::JobVerify),
        matters: ExpandMatters::Always,
        conflicts: false,
        fatal: true,
        inherit_force: true,
    },
    ExpandRule {
        relation: UnitRelations::UnitRequisiteOverridable,
        kind: ExpandKind::Fixed(JobKind::JobVerify),
        matters: ExpandMatters::UnlessForced,
        conflicts: false,
        fatal: false,
        inherit_force: true,
    },
    ExpandRule {
        relation: UnitRelations::UnitConflicts,
        kind: ExpandKind::Fixed(JobKind::JobStop),
        matters: ExpandMatters::Always,
        conflicts: true,
        fatal: true,
        inherit_force: true,
    },
    ExpandRule {
        relation: UnitRelations::UnitConflictedBy,
        kind: ExpandKind::Fixed(JobKind::JobStop),
        matters: ExpandMatters::Never,
        conflicts: false,
        fatal: false,
        inherit_force: true,
    },
];

const EXPAND_STOP_RULES: &[ExpandRule] = &[
    ExpandRule {
        relation: UnitRelations::UnitRequiredBy,
        kind: ExpandKind::SameAsRequest,
        matters: ExpandMatters::Always,
        conflicts: false,
        fatal: true,
        inherit_force: true,
    },
    ExpandRule {
        relation: UnitRelations::UnitBoundBy,
        kind: ExpandKind::SameAsRequest,
        matters: ExpandMatters::Always,
        conflicts: false,
        fatal: true,
        inherit_force: true,
    },
];

const EXPAND_RELOAD_RULES: &[ExpandRule] = &[ExpandRule {
    relation: UnitRelations::UnitPropagatesReloadTo,
    kind: ExpandKind::Fixed(JobKind::JobReload),
    matters: ExpandMatters::Never,
    conflicts: false,
    fatal: false,
    inherit_force: true,
}];

fn expand_tables(kind: JobKind) -> Vec<&'static [ExpandRule]> {
    match kind {
        JobKind::JobStart => vec![EXPAND_START_RULES],
        JobKind::JobReloadOrStart => vec![EXPAND_START_RULES, EXPAND_RELOAD_RULES],
        JobKind::JobStop | JobKind::JobRestart | JobKind::JobTryRestart => {
            vec![EXPAND_STOP_RULES]
        }
        JobKind::JobReload => vec![EXPAND_RELOAD_RULES],
        JobKind::JobVerify => Vec::new(),
    }
}

/// a pending set of jobs plus the links that pulled them in
///
/// The transaction owns every uninstalled job until the applier takes them
/// over or `abort` drops them. Before reconciliation a unit may carry
/// several jobs at once; afterwards exactly one.
pub struct JobTransaction {
    // associated objects
    ja: Rc<JobAlloc>,

    // owned objects
    jobs: RefCell<HashMap<String, Vec<Rc<Job>>>>,
    anchor: RefCell<Option<Rc<Job>>>,
}

impl Drop for JobTransaction {
    fn drop(&mut self) {
        // jobs and links reference each other, break that up
        self.abort();
    }
}

impl JobTransaction {
    ///
    pub fn new(ja: &Rc<JobAlloc>) -> JobTransaction {
        JobTransaction {
            ja: Rc::clone(ja),
            jobs: RefCell::new(HashMap::new()),
            anchor: RefCell::new(None),
        }
    }

    /// the root job of the request, until the applier hands it off
    pub fn anchor(&self) -> Option<Rc<Job>> {
        self.anchor.borrow().clone()
    }

    ///
    pub fn n_jobs(&self) -> usize {
        self.jobs.borrow().values().map(|l| l.len()).sum()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    ///
    pub fn contains_unit(&self, unit_id: &str) -> bool {
        self.jobs.borrow().contains_key(unit_id)
    }

    /// expand one request into jobs and links, recursively
    ///
    /// `by` is the pulling job for recursive calls, None marks the anchor.
    /// Errors unwind nothing by themselves; the caller aborts the whole
    /// transaction uniformly.
    pub fn add_job_and_dependencies(
        &self,
        dep: &UnitDep,
        kind: JobKind,
        unit: &Rc<UnitX>,
        by: Option<&Rc<Job>>,
        flags: JobFlags,
    ) -> Result<(), JobErrno> {
        // load-state gate: only stops pass units that cannot be used
        if kind != JobKind::JobStop {
            match unit.load_state() {
                UnitLoadState::UnitError => return Err(JobErrno::JobErrLoadFailed),
                UnitLoadState::UnitMasked => return Err(JobErrno::JobErrMasked),
                _ => {}
            }
        }

        if !job_is_unit_applicable(kind, unit) {
            return Err(JobErrno::JobErrNotApplicable);
        }

        let (job, is_new) = self.record(unit, kind, flags);

        if by.is_none() {
            // exactly one root request per transaction
            let mut anchor = self.anchor.borrow_mut();
            assert!(
                anchor.is_none() || anchor.as_ref().map(|a| Rc::ptr_eq(a, &job)).unwrap_or(false),
                "transaction already has an anchor"
            );
            *anchor = Some(Rc::clone(&job));
        } else if let Some(by) = by {
            JobDependency::new(
                by,
                &job,
                flags.contains(JobFlags::JOB_MATTERS),
                flags.contains(JobFlags::JOB_CONFLICTS),
            );
        }

        if !is_new || flags.contains(JobFlags::JOB_IGNORE_REQUIREMENTS) {
            return Ok(());
        }

        // replicate the request onto followers first, non-essentially
        for other in unit.followers().iter() {
            let fl = flags & (JobFlags::JOB_FORCE | JobFlags::JOB_IGNORE_ORDER);
            if let Err(err) = self.add_job_and_dependencies(dep, kind, other, Some(&job), fl) {
                log::warn!(
                    "cannot replicate {} onto follower {}, ignoring: {}",
                    job,
                    other.id(),
                    err
                );
            }
        }

        // fan out over the dependency kinds this request cares about
        for rules in expand_tables(kind) {
            for rule in rules {
                let child_kind = match rule.kind {
                    ExpandKind::Fixed(k) => k,
                    ExpandKind::SameAsRequest => kind,
                };
                let matters = match rule.matters {
                    ExpandMatters::Always => true,
                    ExpandMatters::Never => false,
                    ExpandMatters::UnlessForced => !flags.contains(JobFlags::JOB_FORCE),
                };

                for other in dep.gets(unit, rule.relation).iter() {
                    let mut fl = JobFlags::empty();
                    if matters {
                        fl |= JobFlags::JOB_MATTERS;
                    }
                    if rule.conflicts {
                        fl |= JobFlags::JOB_CONFLICTS;
                    }
                    if rule.inherit_force && flags.contains(JobFlags::JOB_FORCE) {
                        fl |= JobFlags::JOB_FORCE;
                    }
                    if flags.contains(JobFlags::JOB_IGNORE_ORDER) {
                        fl |= JobFlags::JOB_IGNORE_ORDER;
                    }

                    if let Err(err) =
                        self.add_job_and_dependencies(dep, child_kind, other, Some(&job), fl)
                    {
                        if err == JobErrno::JobErrNotApplicable {
                            log::debug!(
                                "{} not applicable to unit {}, ignoring",
                                child_kind,
                                other.id()
                            );
                        } else if rule.fatal {
                            return Err(err);
                        } else {
                            log::warn!(
                                "cannot add {} job for unit {}, ignoring: {}",
                                child_kind,
                                other.id(),
                                err
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// prepare a stop for every loaded unit the request does not cover
    pub fn add_isolate_jobs(&self, units: &UnitSets, dep: &UnitDep) -> Result<(), JobErrno> {
        let anchor = self.anchor().ok_or(JobErrno::JobErrInternal)?;

        for other in units.get_all().iter() {
            if other.load_state() != UnitLoadState::UnitLoaded {
                continue;
            }

            // it is allowed not to be affected by isolation
            if other.ignore_on_isolate() {
                continue;
            }

            // there is something assigned, not affected
            if self.contains_unit(other.id()) {
                continue;
            }

            // nothing running, nothing queued, nothing to stop
            if other.active_state().is_inactive_or_failed() && other.job().is_none() {
                continue;
            }

            if let Err(err) = self.add_job_and_dependencies(
                dep,
                JobKind::JobStop,
                other,
                Some(&anchor),
                JobFlags::JOB_MATTERS,
            ) {
                log::warn!(
                    "cannot add isolate stop for unit {}, ignoring: {}",
                    other.id(),
                    err
                );
            }
        }

        Ok(())
    }

    /// drop every job in the transaction; never cascades into the live set
    pub fn abort(&self) {
        loop {
            let job = self
                .jobs
                .borrow()
                .values()
                .next()
                .and_then(|l| l.first().cloned());
            match job {
                Some(j) => self.unlink_job(&j, false),
                None => break,
            }
        }
        *self.anchor.borrow_mut() = None;
    }

    pub(super) fn is_anchor(&self, job: &Rc<Job>) -> bool {
        self.anchor
            .borrow()
            .as_ref()
            .map(|a| Rc::ptr_eq(a, job))
            .unwrap_or(false)
    }

    /// every job, across all per-unit lists
    pub(super) fn all_jobs(&self) -> Vec<Rc<Job>> {
        self.jobs
            .borrow()
            .values()
            .flat_map(|l| l.iter().cloned())
            .collect()
    }

    /// first job of each unit's list; the representative during ordering
    pub(super) fn head_jobs(&self) -> Vec<Rc<Job>> {
        self.jobs
            .borrow()
            .values()
            .filter_map(|l| l.first().cloned())
            .collect()
    }

    pub(super) fn unit_head(&self, unit_id: &str) -> Option<Rc<Job>> {
        self.jobs
            .borrow()
            .get(unit_id)
            .and_then(|l| l.first().cloned())
    }

    pub(super) fn unit_jobs(&self, unit_id: &str) -> Vec<Rc<Job>> {
        self.jobs.borrow().get(unit_id).cloned().unwrap_or_default()
    }

    pub(super) fn units_snapshot(&self) -> Vec<String> {
        self.jobs.borrow().keys().cloned().collect()
    }

    pub(super) fn find(&self, unit_id: &str, kind: JobKind) -> Option<Rc<Job>> {
        self.jobs
            .borrow()
            .get(unit_id)
            .and_then(|l| l.iter().find(|j| j.kind() == kind).cloned())
    }

    /// delete a job from the transaction
    ///
    /// With `delete_dependencies` the deletion cascades: every job that
    /// pulled this one over a mattering link goes away too, since it cannot
    /// do its work anymore.
    pub(super) fn delete_job(&self, job: &Rc<Job>, delete_dependencies: bool) {
        self.unlink_job(job, delete_dependencies);
    }

    /// take a job out of the transaction bookkeeping, keeping the job alive
    ///
    /// Used by the applier at commit time: links are gone, the job itself
    /// transfers to the live set.
    pub(super) fn release_job(&self, job: &Rc<Job>) {
        self.unlink_job(job, false);
    }

    fn unlink_job(&self, job: &Rc<Job>, delete_dependencies: bool) {
        // out of the per-unit list
        {
            let mut jobs = self.jobs.borrow_mut();
            if let Some(list) = jobs.get_mut(job.unit().id()) {
                list.retain(|j| !Rc::ptr_eq(j, job));
                if list.is_empty() {
                    jobs.remove(job.unit().id());
                }
            }
        }
        {
            let mut anchor = self.anchor.borrow_mut();
            let is_anchor = anchor.as_ref().map(|a| Rc::ptr_eq(a, job)).unwrap_or(false);
            if is_anchor {
                *anchor = None;
            }
        }

        // links where this job is the puller just go away
        for link in job.subject_links().iter() {
            JobDependency::free(link);
        }

        // jobs that only existed to serve this one go away with it
        for link in job.object_links().iter() {
            let other = Rc::clone(link.subject());
            JobDependency::free(link);
            if delete_dependencies && link.matters() && !other.installed() {
                log::debug!("deleting job {} as dependency of job {}", other, job);
                self.unlink_job(&other, delete_dependencies);
            }
        }
    }

    fn record(&self, unit: &Rc<UnitX>, kind: JobKind, flags: JobFlags) -> (Rc<Job>, bool) {
        let mut jobs = self.jobs.borrow_mut();
        let list = jobs
            .entry(String::from(unit.id()))
            .or_insert_with(Vec::new);

        if let Some(j) = list.iter().find(|j| j.kind() == kind) {
            if flags.contains(JobFlags::JOB_FORCE) {
                j.set_force(true);
            }
            if flags.contains(JobFlags::JOB_IGNORE_ORDER) {
                j.set_ignore_order(true);
            }
            return (Rc::clone(j), false);
        }

        let job = self.ja.alloc(unit, kind);
        job.set_force(flags.contains(JobFlags::JOB_FORCE));
        job.set_ignore_order(flags.contains(JobFlags::JOB_IGNORE_ORDER));
        log::debug!("added job {} to transaction", job);
        list.push(Rc::clone(&job));
        (job, true)
    }
}
