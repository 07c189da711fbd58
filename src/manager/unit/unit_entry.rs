use super::data::UnitActiveState;
use super::job::Job;
use super::unit_base::{UnitLoadState, UnitType};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// a unit as the engine sees it
///
/// The registry owns the real unit objects; the engine only reads identity,
/// states and dependencies, and publishes the currently installed job back
/// onto the unit.
pub struct UnitX {
    // identity
    id: String,
    unit_type: UnitType,

    // runtime state
    load_state: Cell<UnitLoadState>,
    active_state: Cell<UnitActiveState>,
    ignore_on_isolate: Cell<bool>,

    // published by the engine at commit time
    job: RefCell<Option<Rc<Job>>>,

    // units tracking this one's state
    followers: RefCell<Vec<Rc<UnitX>>>,
}

impl PartialEq for UnitX {
    fn eq(&self, other: &Self) -> bool {
        self.unit_type == other.unit_type && self.id == other.id
    }
}

impl Eq for UnitX {}

impl PartialOrd for UnitX {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnitX {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for UnitX {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl UnitX {
    /// fresh unit: loaded, inactive, no job
    pub fn new(name: &str, unit_type: UnitType) -> Rc<UnitX> {
        Rc::new(UnitX {
            id: String::from(name),
            unit_type,
            load_state: Cell::new(UnitLoadState::UnitLoaded),
            active_state: Cell::new(UnitActiveState::UnitInActive),
            ignore_on_isolate: Cell::new(false),
            job: RefCell::new(None),
            followers: RefCell::new(Vec::new()),
        })
    }

    ///
    pub fn id(&self) -> &str {
        &self.id
    }

    ///
    pub fn unit_type(&self) -> UnitType {
        self.unit_type
    }

    ///
    pub fn load_state(&self) -> UnitLoadState {
        self.load_state.get()
    }

    ///
    pub fn set_load_state(&self, state: UnitLoadState) {
        self.load_state.set(state);
    }

    ///
    pub fn active_state(&self) -> UnitActiveState {
        self.active_state.get()
    }

    ///
    pub fn set_active_state(&self, state: UnitActiveState) {
        self.active_state.set(state);
    }

    ///
    pub fn ignore_on_isolate(&self) -> bool {
        self.ignore_on_isolate.get()
    }

    ///
    pub fn set_ignore_on_isolate(&self, ignore_on_isolate: bool) {
        self.ignore_on_isolate.set(ignore_on_isolate);
    }

    ///
    pub fn can_start(&self) -> bool {
        self.unit_type.can_start()
    }

    ///
    pub fn can_reload(&self) -> bool {
        self.unit_type.can_reload()
    }

    /// the installed job currently attached to this unit, if any
    pub fn job(&self) -> Option<Rc<Job>> {
        self.job.borrow().clone()
    }

    pub(in crate::manager) fn set_job(&self, job: Option<Rc<Job>>) {
        *self.job.borrow_mut() = job;
    }

    /// declare that `other` follows this unit's state
    pub fn add_follower(&self, other: &Rc<UnitX>) {
        let mut followers = self.followers.borrow_mut();
        if !followers.iter().any(|u| u.id() == other.id()) {
            followers.push(Rc::clone(other));
        }
    }

    /// units a request on this unit is replicated onto
    pub fn followers(&self) -> Vec<Rc<UnitX>> {
        self.followers.borrow().clone()
    }
}
