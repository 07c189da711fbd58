use super::job_entry::{Job, JobId, JobKind, JobResult};
use super::job_notify::JobNotify;
use super::JobErrno;
use crate::manager::unit::unit_base::UnitRelations;
use crate::manager::unit::unit_datastore::UnitDep;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// the manager's live job set
///
/// Keyed twice: by job id for iteration and rollback, by unit for the
/// at-most-one-job-per-unit rule. A job only shows up in the unit map once
/// its install committed.
#[derive(Default)]
pub struct JobTable {
    t_id: RefCell<HashMap<JobId, Rc<Job>>>,
    t_unit: RefCell<HashMap<String, Rc<Job>>>,
}

impl JobTable {
    ///
    pub fn new() -> JobTable {
        JobTable {
            t_id: RefCell::new(HashMap::new()),
            t_unit: RefCell::new(HashMap::new()),
        }
    }

    ///
    pub fn len(&self) -> usize {
        self.t_id.borrow().len()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.t_id.borrow().is_empty()
    }

    ///
    pub fn get(&self, id: JobId) -> Option<Rc<Job>> {
        self.t_id.borrow().get(&id).cloned()
    }

    ///
    pub fn get_by_unit(&self, unit_id: &str) -> Option<Rc<Job>> {
        self.t_unit.borrow().get(unit_id).cloned()
    }

    /// snapshot of every live job
    pub fn jobs(&self) -> Vec<Rc<Job>> {
        self.t_id.borrow().values().cloned().collect()
    }

    /// reserve a slot for a job about to be installed
    pub(super) fn record(&self, job: &Rc<Job>) -> Result<(), JobErrno> {
        let mut t_id = self.t_id.borrow_mut();
        if t_id.contains_key(&job.id()) {
            return Err(JobErrno::JobErrInternal);
        }
        t_id.insert(job.id(), Rc::clone(job));
        Ok(())
    }

    /// undo a `record` that has not been committed
    pub(super) fn withdraw(&self, job: &Rc<Job>) {
        self.t_id.borrow_mut().remove(&job.id());
    }

    /// commit a recorded job: unit map, unit pointer, installed flag
    pub(super) fn publish(&self, job: &Rc<Job>) {
        self.t_unit
            .borrow_mut()
            .insert(String::from(job.unit().id()), Rc::clone(job));
        job.unit().set_job(Some(Rc::clone(job)));
        job.set_installed();
    }

    /// finish one live job; no cascade
    pub(super) fn finish_job(&self, job: &Rc<Job>, result: JobResult, notify: &dyn JobNotify) {
        self.remove(job);
        log::debug!("finished job {} with result {}", job, result);
        notify.job_finished(job, result);
    }

    /// finish one live job and everything that cannot survive without it
    ///
    /// Returns whether jobs other than the given one were touched, so
    /// sweeping callers know to restart their iteration.
    pub fn finish_and_invalidate(
        &self,
        dep: &UnitDep,
        job: &Rc<Job>,
        result: JobResult,
        notify: &dyn JobNotify,
    ) -> bool {
        self.finish_job(job, result, notify);

        if result == JobResult::JobDone {
            return false;
        }

        // a start that went away takes the starts depending on it along
        let mut touched = false;
        if job_starts_something(job.kind()) {
            for relation in [UnitRelations::UnitRequiredBy, UnitRelations::UnitBoundBy] {
                for other in dep.gets(job.unit(), relation).iter() {
                    let oj = match self.get_by_unit(other.id()) {
                        Some(oj) => oj,
                        None => continue,
                    };
                    if !job_starts_something(oj.kind()) {
                        continue;
                    }
                    touched = true;
                    self.finish_and_invalidate(dep, &oj, JobResult::JobDependency, notify);
                }
            }
        }

        touched
    }

    fn remove(&self, job: &Rc<Job>) {
        self.t_id.borrow_mut().remove(&job.id());

        let mut t_unit = self.t_unit.borrow_mut();
        let same = t_unit
            .get(job.unit().id())
            .map(|j| Rc::ptr_eq(j, job))
            .unwrap_or(false);
        if same {
            t_unit.remove(job.unit().id());
        }
        drop(t_unit);

        let published = job
            .unit()
            .job()
            .map(|j| Rc::ptr_eq(&j, job))
            .unwrap_or(false);
        if published {
            job.unit().set_job(None);
        }
    }
}

fn job_starts_something(kind: JobKind) -> bool {
    matches!(
        kind,
        JobKind::JobStart | JobKind::JobVerify | JobKind::JobReloadOrStart | JobKind::JobRestart
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::unit::job::job_alloc::JobAlloc;
    use crate::manager::unit::job::job_notify::NullNotify;
    use crate::manager::unit::unit_base::UnitType;
    use crate::manager::unit::unit_entry::UnitX;

    fn install(table: &JobTable, job: &Rc<Job>) {
        table.record(job).unwrap();
        table.publish(job);
    }

    #[test]
    fn record_publish_withdraw() {
        let table = JobTable::new();
        let ja = JobAlloc::new();
        let u = UnitX::new("a.service", UnitType::UnitService);
        let j = ja.alloc(&u, JobKind::JobStart);

        table.record(&j).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get_by_unit("a.service").is_none());
        assert!(table.record(&j).is_err());

        table.withdraw(&j);
        assert!(table.is_empty());

        install(&table, &j);
        assert!(j.installed());
        assert!(table.get_by_unit("a.service").is_some());
        assert!(u.job().is_some());
    }

    #[test]
    fn finish_clears_unit_pointer() {
        let table = JobTable::new();
        let ja = JobAlloc::new();
        let dep = UnitDep::new();
        let u = UnitX::new("a.service", UnitType::UnitService);
        let j = ja.alloc(&u, JobKind::JobStart);
        install(&table, &j);

        let touched = table.finish_and_invalidate(&dep, &j, JobResult::JobDone, &NullNotify);
        assert!(!touched);
        assert!(table.is_empty());
        assert!(u.job().is_none());
    }

    #[test]
    fn canceled_start_cascades_to_dependents() {
        let table = JobTable::new();
        let ja = JobAlloc::new();
        let dep = UnitDep::new();
        let a = UnitX::new("a.service", UnitType::UnitService);
        let b = UnitX::new("b.service", UnitType::UnitService);
        dep.insert(&a, UnitRelations::UnitRequires, &b);

        let jb = ja.alloc(&b, JobKind::JobStart);
        let jaj = ja.alloc(&a, JobKind::JobStart);
        install(&table, &jb);
        install(&table, &jaj);

        // canceling b's start takes a's start along
        let touched = table.finish_and_invalidate(&dep, &jb, JobResult::JobCanceled, &NullNotify);
        assert!(touched);
        assert!(table.is_empty());
        assert!(a.job().is_none());
    }

    #[test]
    fn canceled_stop_does_not_cascade() {
        let table = JobTable::new();
        let ja = JobAlloc::new();
        let dep = UnitDep::new();
        let a = UnitX::new("a.service", UnitType::UnitService);
        let b = UnitX::new("b.service", UnitType::UnitService);
        dep.insert(&a, UnitRelations::UnitRequires, &b);

        let jb = ja.alloc(&b, JobKind::JobStop);
        let jaj = ja.alloc(&a, JobKind::JobStart);
        install(&table, &jb);
        install(&table, &jaj);

        let touched = table.finish_and_invalidate(&dep, &jb, JobResult::JobCanceled, &NullNotify);
        assert!(!touched);
        assert_eq!(table.len(), 1);
    }
}
