use crate::manager::unit::unit_entry::UnitX;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// the registry of loaded units, keyed by name
#[derive(Default)]
pub struct UnitSets {
    t: RefCell<HashMap<String, Rc<UnitX>>>,
}

impl UnitSets {
    ///
    pub fn new() -> UnitSets {
        UnitSets {
            t: RefCell::new(HashMap::new()),
        }
    }

    ///
    pub fn insert(&self, name: String, unit: Rc<UnitX>) -> Option<Rc<UnitX>> {
        self.t.borrow_mut().insert(name, unit)
    }

    ///
    pub fn get(&self, name: &str) -> Option<Rc<UnitX>> {
        self.t.borrow().get(name).cloned()
    }

    ///
    pub fn get_all(&self) -> Vec<Rc<UnitX>> {
        self.t.borrow().values().cloned().collect()
    }

    ///
    pub fn len(&self) -> usize {
        self.t.borrow().len()
    }

    ///
    pub fn is_empty(&self) -> bool {
        self.t.borrow().is_empty()
    }
}
