use super::job_alloc::JobAlloc;
use super::job_apply::trans_apply;
use super::job_entry::{Job, JobConf, JobResult};
use super::job_notify::JobNotify;
use super::job_table::JobTable;
use super::job_transaction::{JobFlags, JobTransaction};
use super::JobErrno;
use crate::manager::unit::unit_base::JobMode;
use crate::manager::unit::unit_datastore::{UnitDep, UnitSets};
use crate::manager::unit::unit_entry::UnitX;
use std::rc::Rc;

/// owner of the live job set and entry point for client requests
///
/// Everything runs to completion on the caller's thread; the surrounding
/// manager serializes requests.
pub struct JobManager {
    // associated objects
    units: Rc<UnitSets>,
    dep: Rc<UnitDep>,
    notify: Rc<dyn JobNotify>,

    // owned objects
    ja: Rc<JobAlloc>,
    jobs: JobTable,
}

impl JobManager {
    ///
    pub fn new(units: &Rc<UnitSets>, dep: &Rc<UnitDep>, notify: Rc<dyn JobNotify>) -> JobManager {
        JobManager {
            units: Rc::clone(units),
            dep: Rc::clone(dep),
            notify,
            ja: Rc::new(JobAlloc::new()),
            jobs: JobTable::new(),
        }
    }

    /// expand one client request, reconcile it and install it atomically
    ///
    /// On error the live set is exactly what it was before the call.
    pub fn exec(&self, config: &JobConf, mode: JobMode, force: bool) -> Result<(), JobErrno> {
        let tr = JobTransaction::new(&self.ja);

        let mut flags = JobFlags::JOB_MATTERS;
        if force {
            flags |= JobFlags::JOB_FORCE;
        }
        match mode {
            JobMode::JobIgnoreDependencies => {
                flags |= JobFlags::JOB_IGNORE_REQUIREMENTS | JobFlags::JOB_IGNORE_ORDER
            }
            JobMode::JobIgnoreRequirements => flags |= JobFlags::JOB_IGNORE_REQUIREMENTS,
            _ => {}
        }

        let ret = self.build_and_activate(&tr, config, mode, flags);
        if let Err(err) = ret {
            log::info!(
                "request {}/{} failed: {}",
                config.get_unit().id(),
                config.get_kind(),
                err
            );
            tr.abort();
            return Err(err);
        }

        Ok(())
    }

    /// number of live jobs
    pub fn n_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// the live job attached to a unit, if any
    pub fn job_of(&self, unit: &UnitX) -> Option<Rc<Job>> {
        self.jobs.get_by_unit(unit.id())
    }

    /// finish one live job, cascading as needed
    ///
    /// Returns whether other live jobs were touched along the way.
    pub fn finish_job(&self, job: &Rc<Job>, result: JobResult) -> bool {
        self.jobs
            .finish_and_invalidate(&self.dep, job, result, self.notify.as_ref())
    }

    fn build_and_activate(
        &self,
        tr: &JobTransaction,
        config: &JobConf,
        mode: JobMode,
        flags: JobFlags,
    ) -> Result<(), JobErrno> {
        tr.add_job_and_dependencies(&self.dep, config.get_kind(), config.get_unit(), None, flags)?;

        if mode == JobMode::JobIsolate {
            tr.add_isolate_jobs(&self.units, &self.dep)?;
        }

        self.activate(tr, mode)
    }

    // the reconciliation pipeline: essential marking, impact minimization,
    // redundancy drops, then the two repair loops, then a last redundancy
    // sweep and the destructiveness gate
    fn activate(&self, tr: &JobTransaction, mode: JobMode) -> Result<(), JobErrno> {
        // the ordering sweep walks through installed jobs too; stale
        // traversal scratch from an earlier activation must not survive
        for job in self.jobs.jobs().iter() {
            job.set_generation(0);
            job.set_marker(None);
        }

        let mut generation: u32 = 1;
        tr.find_jobs_that_matter(generation);

        if mode == JobMode::JobFail {
            tr.minimize_impact();
        }
        tr.drop_redundant();

        loop {
            if mode != JobMode::JobIsolate {
                tr.collect_garbage();
            }
            if tr.verify_order(&self.dep, &mut generation)? {
                break;
            }
            // a cycle was broken, sweep the leftovers and look again
        }

        loop {
            if tr.merge_jobs()? {
                break;
            }
            // an unmergeable job was dropped, its dependencies may now be
            // orphans
            if mode != JobMode::JobIsolate {
                tr.collect_garbage();
            }
        }

        // merging can render jobs redundant
        tr.drop_redundant();

        if mode == JobMode::JobFail {
            tr.check_destructive()?;
        }

        trans_apply(tr, &self.jobs, &self.dep, self.notify.as_ref(), mode)
    }
}
