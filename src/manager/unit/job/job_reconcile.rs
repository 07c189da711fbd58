//! Reconciliation passes that rewrite a transaction in place until it is
//! consistent with itself and with the live job set, or until it has to be
//! given up. The pass order and the restart points live with the caller in
//! `job_manager`.

use super::job_dependency::JobDependency;
use super::job_entry::{
    job_kind_is_conflicting, job_kind_is_mergeable, job_kind_is_redundant, job_kind_is_superset,
    job_kind_merge, Job, JobKind,
};
use super::job_transaction::JobTransaction;
use super::JobErrno;
use crate::manager::unit::unit_base::UnitRelations;
use crate::manager::unit::unit_datastore::UnitDep;
use std::rc::Rc;

impl JobTransaction {
    /// mark every job reachable from the anchor over mattering links
    ///
    /// The marked set is exactly the set of jobs whose removal would change
    /// the requested outcome behind the client's back.
    pub(super) fn find_jobs_that_matter(&self, generation: u32) {
        let anchor = match self.anchor() {
            Some(a) => a,
            None => return,
        };

        anchor.set_matters_to_anchor(true);
        anchor.set_generation(generation);
        self.mark_matter_from(&anchor, generation);
    }

    fn mark_matter_from(&self, job: &Rc<Job>, generation: u32) {
        for link in job.subject_links().iter() {
            if !link.matters() {
                continue;
            }
            let object = link.object();
            if object.generation() == generation {
                continue;
            }
            object.set_matters_to_anchor(true);
            object.set_generation(generation);
            self.mark_matter_from(object, generation);
        }
    }

    /// drop dispensable jobs that would stop running services or upset
    /// live jobs
    pub(super) fn minimize_impact(&self) {
        loop {
            let mut deleted = false;

            for job in self.all_jobs() {
                if job.matters_to_anchor() {
                    continue;
                }

                let stops_running = job.kind() == JobKind::JobStop
                    && job.unit().active_state().is_active_or_activating();
                let upsets_live = job
                    .unit()
                    .job()
                    .map(|lj| job_kind_is_conflicting(job.kind(), lj.kind()))
                    .unwrap_or(false);
                if !stops_running && !upsets_live {
                    continue;
                }

                log::debug!("deleting job {} to minimize impact", job);
                self.delete_job(&job, true);
                deleted = true;
                break;
            }

            if !deleted {
                break;
            }
        }
    }

    /// drop jobs that would change nothing given the unit's current state
    pub(super) fn drop_redundant(&self) {
        loop {
            let mut deleted = false;

            for job in self.all_jobs() {
                // the anchor is not exempt: a request satisfied by the
                // current state simply dissolves
                let noop =
                    job.installed() || job_kind_is_redundant(job.kind(), job.unit().active_state());
                if !noop {
                    continue;
                }
                if let Some(lj) = job.unit().job() {
                    if job_kind_is_conflicting(job.kind(), lj.kind()) {
                        continue;
                    }
                }

                log::debug!("deleting redundant job {}", job);
                self.delete_job(&job, false);
                deleted = true;
                break;
            }

            if !deleted {
                break;
            }
        }
    }

    /// drop jobs nothing pulls in anymore
    pub(super) fn collect_garbage(&self) {
        loop {
            let mut deleted = false;

            for job in self.all_jobs() {
                if self.is_anchor(&job) {
                    continue;
                }
                if !job.object_list_empty() {
                    continue;
                }

                log::debug!("garbage collecting job {}", job);
                self.delete_job(&job, true);
                deleted = true;
                break;
            }

            if !deleted {
                break;
            }
        }
    }

    /// check the ordering graph for cycles, breaking them where allowed
    ///
    /// Ok(true): acyclic. Ok(false): one job was deleted to break a cycle,
    /// re-run garbage collection and come back.
    pub(super) fn verify_order(
        &self,
        dep: &UnitDep,
        generation: &mut u32,
    ) -> Result<bool, JobErrno> {
        *generation += 1;
        let g = *generation;

        for job in self.head_jobs() {
            if job.generation() == g {
                // swept clean from another root already
                continue;
            }
            if !self.verify_order_one(dep, &job, None, g)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn verify_order_one(
        &self,
        dep: &UnitDep,
        job: &Rc<Job>,
        from: Option<&Rc<Job>>,
        g: u32,
    ) -> Result<bool, JobErrno> {
        if job.generation() == g {
            if job.marker().is_none() {
                // already verified loop-free from here
                return Ok(true);
            }
            return self.break_order_cycle(job, from, g);
        }

        // remember the way back; the path start points at itself
        job.set_marker(Some(from.cloned().unwrap_or_else(|| Rc::clone(job))));
        job.set_generation(g);

        if !job.ignore_order() {
            for other in dep.gets(job.unit(), UnitRelations::UnitBefore).iter() {
                // prefer the pending job, fall back to the installed one
                let o = match self.unit_head(other.id()) {
                    Some(o) => o,
                    None => match other.job() {
                        Some(o) => o,
                        None => continue,
                    },
                };
                if !self.verify_order_one(dep, &o, Some(job), g)? {
                    return Ok(false);
                }
            }
        }

        // off the path again
        job.set_marker(None);
        Ok(true)
    }

    fn break_order_cycle(
        &self,
        job: &Rc<Job>,
        from: Option<&Rc<Job>>,
        g: u32,
    ) -> Result<bool, JobErrno> {
        log::warn!("found ordering cycle on {}", job);

        let mut victim: Option<Rc<Job>> = None;
        let mut k = from.cloned();
        while let Some(cur) = k {
            log::warn!("walked back ordering cycle through {}", cur);

            if victim.is_none()
                && !cur.installed()
                && !self.unit_matters_to_anchor(cur.unit().id())
            {
                victim = Some(Rc::clone(&cur));
            }

            let next = if cur.generation() == g {
                cur.marker().filter(|m| !Rc::ptr_eq(m, &cur))
            } else {
                None
            };
            if Rc::ptr_eq(&cur, job) {
                break;
            }
            k = next;
        }

        match victim {
            Some(v) => {
                log::warn!("breaking ordering cycle by deleting job {}", v);
                self.delete_job(&v, true);
                Ok(false)
            }
            None => {
                log::error!("unable to break ordering cycle starting at {}", job);
                Err(JobErrno::JobErrOrderCyclic)
            }
        }
    }

    fn unit_matters_to_anchor(&self, unit_id: &str) -> bool {
        self.unit_jobs(unit_id)
            .iter()
            .any(|j| j.matters_to_anchor())
    }

    /// collapse every unit's job list onto a single job
    ///
    /// Ok(true): converged, each unit carries one job. Ok(false): an
    /// unmergeable job was dropped, re-run garbage collection and come
    /// back.
    pub(super) fn merge_jobs(&self) -> Result<bool, JobErrno> {
        // first, see whether any unit's jobs refuse to merge
        for unit_id in self.units_snapshot() {
            let list = self.unit_jobs(&unit_id);
            let mut t = list[0].kind();
            let mut conflict = false;
            for k in list[1..].iter() {
                match job_kind_merge(t, k.kind()) {
                    Some(m) => t = m,
                    None => {
                        conflict = true;
                        break;
                    }
                }
            }
            if !conflict {
                continue;
            }

            self.delete_one_unmergeable(&list)?;
            return Ok(false);
        }

        // then fold each list onto its survivor
        for unit_id in self.units_snapshot() {
            let list = self.unit_jobs(&unit_id);
            let mut t = list[0].kind();
            for k in list[1..].iter() {
                t = match job_kind_merge(t, k.kind()) {
                    Some(m) => m,
                    None => unreachable!("unmergeable jobs survived conflict resolution"),
                };
            }

            // fold in what is already running, when that works out
            if let Some(lj) = list[0].unit().job() {
                if let Some(m) = job_kind_merge(t, lj.kind()) {
                    t = m;
                }
            }

            // the anchor survives its peers
            let survivor = list
                .iter()
                .find(|j| self.is_anchor(j))
                .cloned()
                .unwrap_or_else(|| Rc::clone(&list[0]));
            survivor.set_kind(t);
            for peer in list.iter().filter(|j| !Rc::ptr_eq(j, &survivor)) {
                self.merge_job_into(&survivor, peer);
            }
        }

        Ok(true)
    }

    fn merge_job_into(&self, survivor: &Rc<Job>, peer: &Rc<Job>) {
        log::debug!("merging job {} into job {}", peer, survivor);

        survivor.set_force(survivor.force() || peer.force());
        survivor.set_ignore_order(survivor.ignore_order() || peer.ignore_order());
        survivor.set_matters_to_anchor(survivor.matters_to_anchor() || peer.matters_to_anchor());

        // move the peer's links over, dropping the ones that would now be
        // self-referential
        for link in peer.subject_links().iter() {
            let object = Rc::clone(link.object());
            let (matters, conflicts) = (link.matters(), link.conflicts());
            JobDependency::free(link);
            if !Rc::ptr_eq(&object, survivor) {
                JobDependency::new(survivor, &object, matters, conflicts);
            }
        }
        for link in peer.object_links().iter() {
            let subject = Rc::clone(link.subject());
            let (matters, conflicts) = (link.matters(), link.conflicts());
            JobDependency::free(link);
            if !Rc::ptr_eq(&subject, survivor) {
                JobDependency::new(&subject, survivor, matters, conflicts);
            }
        }

        self.delete_job(peer, false);
    }

    fn delete_one_unmergeable(&self, list: &[Rc<Job>]) -> Result<(), JobErrno> {
        for (i, j) in list.iter().enumerate() {
            for k in list[i + 1..].iter() {
                if job_kind_is_mergeable(j.kind(), k.kind()) {
                    continue;
                }

                let j_free = !j.matters_to_anchor() && !j.installed();
                let k_free = !k.matters_to_anchor() && !k.installed();

                let victim = if j_free && k_free {
                    // rather drop stops than starts, unless the stop
                    // answers a conflict declaration
                    if j.kind() == JobKind::JobStop {
                        if j.object_conflicted() {
                            k
                        } else {
                            j
                        }
                    } else if k.kind() == JobKind::JobStop {
                        if k.object_conflicted() {
                            j
                        } else {
                            k
                        }
                    } else {
                        j
                    }
                } else if j_free {
                    j
                } else if k_free {
                    k
                } else {
                    log::info!("cannot fix conflicting jobs {} and {}", j, k);
                    return Err(JobErrno::JobErrJobsConflicting);
                };

                log::debug!(
                    "fixing conflicting jobs {} and {} by deleting job {}",
                    j,
                    k,
                    victim
                );
                self.delete_job(victim, true);
                return Ok(());
            }
        }

        Err(JobErrno::JobErrInternal)
    }

    /// refuse to replace live jobs the surviving transaction does not
    /// subsume
    pub(super) fn check_destructive(&self) -> Result<(), JobErrno> {
        for job in self.all_jobs() {
            if let Some(lj) = job.unit().job() {
                if !Rc::ptr_eq(&lj, &job) && !job_kind_is_superset(job.kind(), lj.kind()) {
                    log::info!(
                        "transaction job {} would destroy live job {}",
                        job,
                        lj
                    );
                    return Err(JobErrno::JobErrDestructive);
                }
            }
        }

        Ok(())
    }
}
