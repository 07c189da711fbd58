pub use job_alloc::JobAlloc;
pub use job_entry::{Job, JobConf, JobKind, JobResult};
pub use job_manager::JobManager;
pub use job_notify::{JobNotify, NullNotify};
pub use job_table::JobTable;
pub use job_transaction::{JobFlags, JobTransaction};

// base
mod job_alloc;
mod job_dependency;
mod job_entry;

// table
mod job_table;

// transaction
mod job_apply;
mod job_reconcile;
mod job_transaction;

// frame
mod job_manager;
mod job_notify;

use nix::errno::Errno;
use strum::Display;

/// errors the engine reports back to its callers
#[derive(PartialEq, Eq, Clone, Copy, Debug, Display)]
pub enum JobErrno {
    /// the unit failed to load and the request is not a stop
    JobErrLoadFailed,
    /// the unit is masked and the request is not a stop
    JobErrMasked,
    /// the unit kind does not support the requested operation
    JobErrNotApplicable,
    /// two jobs on one unit cannot merge and neither may be dropped
    JobErrJobsConflicting,
    /// the ordering graph is cyclic and cannot be repaired
    JobErrOrderCyclic,
    /// applying would replace live jobs the request does not subsume
    JobErrDestructive,
    /// allocation failure, fatal for the caller
    JobErrNoMem,
    /// bookkeeping inconsistency that must never happen
    JobErrInternal,
}

impl From<JobErrno> for Errno {
    fn from(err: JobErrno) -> Errno {
        match err {
            JobErrno::JobErrLoadFailed => Errno::EIO,
            JobErrno::JobErrMasked => Errno::ESHUTDOWN,
            JobErrno::JobErrNotApplicable => Errno::EBADR,
            JobErrno::JobErrJobsConflicting => Errno::ENOEXEC,
            JobErrno::JobErrOrderCyclic => Errno::EDEADLK,
            JobErrno::JobErrDestructive => Errno::EEXIST,
            JobErrno::JobErrNoMem => Errno::ENOMEM,
            JobErrno::JobErrInternal => Errno::EINVAL,
        }
    }
}
