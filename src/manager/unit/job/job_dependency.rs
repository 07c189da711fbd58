use super::job_entry::Job;
use std::rc::Rc;

/// directed link between two jobs: the subject pulled the object into the
/// transaction
///
/// Links thread themselves into both endpoints' lists on creation and out
/// again on free; there is no other mutation.
pub(super) struct JobDependency {
    subject: Rc<Job>,
    object: Rc<Job>,
    matters: bool,
    conflicts: bool,
}

impl JobDependency {
    pub(super) fn new(
        subject: &Rc<Job>,
        object: &Rc<Job>,
        matters: bool,
        conflicts: bool,
    ) -> Rc<JobDependency> {
        let link = Rc::new(JobDependency {
            subject: Rc::clone(subject),
            object: Rc::clone(object),
            matters,
            conflicts,
        });
        subject.attach_subject(&link);
        object.attach_object(&link);
        link
    }

    pub(super) fn free(link: &Rc<JobDependency>) {
        link.subject.detach_subject(link);
        link.object.detach_object(link);
    }

    pub(super) fn subject(&self) -> &Rc<Job> {
        &self.subject
    }

    pub(super) fn object(&self) -> &Rc<Job> {
        &self.object
    }

    pub(super) fn matters(&self) -> bool {
        self.matters
    }

    pub(super) fn conflicts(&self) -> bool {
        self.conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::unit::job::job_alloc::JobAlloc;
    use crate::manager::unit::job::job_entry::JobKind;
    use crate::manager::unit::unit_base::UnitType;
    use crate::manager::unit::unit_entry::UnitX;

    #[test]
    fn link_threads_into_both_endpoints() {
        let ja = JobAlloc::new();
        let a = ja.alloc(
            &UnitX::new("a.service", UnitType::UnitService),
            JobKind::JobStart,
        );
        let b = ja.alloc(
            &UnitX::new("b.service", UnitType::UnitService),
            JobKind::JobStart,
        );

        let link = JobDependency::new(&a, &b, true, false);
        assert_eq!(a.subject_links().len(), 1);
        assert_eq!(b.object_links().len(), 1);
        assert!(a.object_links().is_empty());
        assert!(b.subject_links().is_empty());

        JobDependency::free(&link);
        assert!(a.subject_links().is_empty());
        assert!(b.object_links().is_empty());
    }

    #[test]
    fn conflict_pull_is_visible_on_the_object() {
        let ja = JobAlloc::new();
        let a = ja.alloc(
            &UnitX::new("a.service", UnitType::UnitService),
            JobKind::JobStart,
        );
        let b = ja.alloc(
            &UnitX::new("b.service", UnitType::UnitService),
            JobKind::JobStop,
        );

        let _link = JobDependency::new(&a, &b, true, true);
        assert!(b.object_conflicted());
        assert!(!a.object_conflicted());
    }
}
