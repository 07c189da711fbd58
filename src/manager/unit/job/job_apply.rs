//! Moves a reconciled transaction into the live job set, all or nothing.

use super::job_entry::{Job, JobResult};
use super::job_notify::JobNotify;
use super::job_table::JobTable;
use super::job_transaction::JobTransaction;
use super::JobErrno;
use crate::manager::unit::unit_base::JobMode;
use crate::manager::unit::unit_datastore::UnitDep;
use std::rc::Rc;

pub(super) fn trans_apply(
    tr: &JobTransaction,
    table: &JobTable,
    dep: &UnitDep,
    notify: &dyn JobNotify,
    mode: JobMode,
) -> Result<(), JobErrno> {
    if mode == JobMode::JobIsolate {
        isolate_cancel_sweep(tr, table, dep, notify);
    }

    // install phase, reversible
    let jobs = tr.all_jobs();
    let mut inserted: Vec<Rc<Job>> = Vec::new();
    for job in jobs.iter() {
        if job.installed() {
            continue;
        }
        if let Err(err) = table.record(job) {
            // undo exactly what this call added
            log::error!("cannot install job {}, rolling back: {}", job, err);
            for j in inserted.iter() {
                table.withdraw(j);
            }
            return Err(err);
        }
        inserted.push(Rc::clone(job));
    }

    // commit phase, cannot fail anymore
    for job in inserted.iter() {
        // transaction bookkeeping goes away, the job itself lives on
        tr.release_job(job);

        if let Some(old) = job.unit().job() {
            if !Rc::ptr_eq(&old, job) {
                let result = match mode {
                    JobMode::JobIsolate => JobResult::JobCanceled,
                    _ => JobResult::JobSuperseded,
                };
                table.finish_job(&old, result, notify);
            }
        }

        table.publish(job);
        log::debug!("installed new job {}", job);

        notify.enqueue_run(job);
        notify.start_timer(job);
        notify.post_bus(job);
    }

    Ok(())
}

// every live job whose unit the transaction does not cover is canceled
// before anything new is installed; cancellation may cascade, in which
// case the sweep starts over
fn isolate_cancel_sweep(
    tr: &JobTransaction,
    table: &JobTable,
    dep: &UnitDep,
    notify: &dyn JobNotify,
) {
    'rescan: loop {
        for job in table.jobs().iter() {
            if tr.contains_unit(job.unit().id()) {
                continue;
            }
            if table.get(job.id()).is_none() {
                // gone through an earlier cascade in this sweep
                continue;
            }

            log::info!("canceling job {} for isolation", job);
            if table.finish_and_invalidate(dep, job, JobResult::JobCanceled, notify) {
                continue 'rescan;
            }
        }
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::unit::job::job_alloc::JobAlloc;
    use crate::manager::unit::job::job_entry::JobKind;
    use crate::manager::unit::job::job_notify::NullNotify;
    use crate::manager::unit::job::job_transaction::JobFlags;
    use crate::manager::unit::unit_base::UnitType;
    use crate::manager::unit::unit_entry::UnitX;

    fn create_unit(name: &str) -> Rc<UnitX> {
        UnitX::new(name, UnitType::UnitService)
    }

    #[test]
    fn apply_installs_and_empties_the_transaction() {
        let ja = Rc::new(JobAlloc::new());
        let tr = JobTransaction::new(&ja);
        let dep = UnitDep::new();
        let table = JobTable::new();
        let a = create_unit("a.service");

        tr.add_job_and_dependencies(&dep, JobKind::JobStart, &a, None, JobFlags::JOB_MATTERS)
            .unwrap();

        trans_apply(&tr, &table, &dep, &NullNotify, JobMode::JobReplace).unwrap();

        assert!(tr.is_empty());
        assert_eq!(table.len(), 1);
        let live = table.get_by_unit("a.service").unwrap();
        assert!(live.installed());
        assert!(a.job().is_some());
    }

    #[test]
    fn apply_supersedes_the_previous_job() {
        let ja = Rc::new(JobAlloc::new());
        let dep = UnitDep::new();
        let table = JobTable::new();
        let a = create_unit("a.service");

        let tr = JobTransaction::new(&ja);
        tr.add_job_and_dependencies(&dep, JobKind::JobStart, &a, None, JobFlags::JOB_MATTERS)
            .unwrap();
        trans_apply(&tr, &table, &dep, &NullNotify, JobMode::JobReplace).unwrap();
        let first = table.get_by_unit("a.service").unwrap();

        let tr = JobTransaction::new(&ja);
        tr.add_job_and_dependencies(&dep, JobKind::JobRestart, &a, None, JobFlags::JOB_MATTERS)
            .unwrap();
        trans_apply(&tr, &table, &dep, &NullNotify, JobMode::JobReplace).unwrap();

        assert_eq!(table.len(), 1);
        let second = table.get_by_unit("a.service").unwrap();
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(second.kind(), JobKind::JobRestart);
    }

    #[test]
    fn isolate_sweep_cancels_uncovered_jobs() {
        let ja = Rc::new(JobAlloc::new());
        let dep = UnitDep::new();
        let table = JobTable::new();
        let a = create_unit("a.service");
        let t = create_unit("t.service");

        // a has a live job, the isolating transaction does not cover it
        let tr = JobTransaction::new(&ja);
        tr.add_job_and_dependencies(&dep, JobKind::JobStart, &a, None, JobFlags::JOB_MATTERS)
            .unwrap();
        trans_apply(&tr, &table, &dep, &NullNotify, JobMode::JobReplace).unwrap();
        assert_eq!(table.len(), 1);

        let tr = JobTransaction::new(&ja);
        tr.add_job_and_dependencies(&dep, JobKind::JobStart, &t, None, JobFlags::JOB_MATTERS)
            .unwrap();
        trans_apply(&tr, &table, &dep, &NullNotify, JobMode::JobIsolate).unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.get_by_unit("a.service").is_none());
        assert!(a.job().is_none());
        assert!(table.get_by_unit("t.service").is_some());
    }
}
