use super::job_entry::{Job, JobResult};
use std::rc::Rc;

/// outward seams the engine fires into at commit and completion time
///
/// All calls are fire-and-forget; the run queue, timer and bus queue live
/// with the surrounding manager.
pub trait JobNotify {
    /// the job became runnable
    fn enqueue_run(&self, job: &Rc<Job>);

    /// arm the per-job timeout
    fn start_timer(&self, job: &Rc<Job>);

    /// publish the installed job on the bus queue
    fn post_bus(&self, job: &Rc<Job>);

    /// a live job reached a terminal result
    fn job_finished(&self, job: &Rc<Job>, result: JobResult);
}

/// for embedders that wire no queues at all
pub struct NullNotify;

impl JobNotify for NullNotify {
    fn enqueue_run(&self, _job: &Rc<Job>) {}

    fn start_timer(&self, _job: &Rc<Job>) {}

    fn post_bus(&self, _job: &Rc<Job>) {}

    fn job_finished(&self, _job: &Rc<Job>, _result: JobResult) {}
}
