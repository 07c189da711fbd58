//! Transaction engine of a unit manager.
//!
//! A client request on one unit ("start", "stop", "isolate", ...) is
//! expanded into pending jobs on every transitively affected unit,
//! reconciled against the jobs currently running, and either installed
//! into the live job set in one piece or rejected with a structured errno.

pub mod manager;

pub use manager::unit::data::UnitActiveState;
pub use manager::unit::job::{
    Job, JobConf, JobErrno, JobKind, JobManager, JobNotify, JobResult, NullNotify,
};
pub use manager::unit::{JobMode, UnitDep, UnitLoadState, UnitRelations, UnitSets, UnitType, UnitX};
