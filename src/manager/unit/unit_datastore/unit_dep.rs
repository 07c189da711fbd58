use crate::manager::unit::unit_base::UnitRelations;
use crate::manager::unit::unit_entry::UnitX;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// typed dependency multimap between units
///
/// Declaring an edge records its inverse on the other endpoint, so every
/// lookup works from either side.
#[derive(Default)]
pub struct UnitDep {
    t: RefCell<HashMap<String, HashMap<UnitRelations, Vec<Rc<UnitX>>>>>,
}

impl UnitDep {
    ///
    pub fn new() -> UnitDep {
        UnitDep {
            t: RefCell::new(HashMap::new()),
        }
    }

    /// record `source --relation--> dest` and the inverse edge
    pub fn insert(&self, source: &Rc<UnitX>, relation: UnitRelations, dest: &Rc<UnitX>) {
        log::debug!(
            "insert relation {} from unit {} to unit {}",
            relation,
            source.id(),
            dest.id()
        );
        self.insert_one(source, relation, dest);
        self.insert_one(dest, relation.inverse(), source);
    }

    /// units reachable from `source` over `relation`
    pub fn gets(&self, source: &UnitX, relation: UnitRelations) -> Vec<Rc<UnitX>> {
        self.t
            .borrow()
            .get(source.id())
            .and_then(|m| m.get(&relation))
            .cloned()
            .unwrap_or_default()
    }

    fn insert_one(&self, source: &Rc<UnitX>, relation: UnitRelations, dest: &Rc<UnitX>) {
        let mut t = self.t.borrow_mut();
        let list = t
            .entry(String::from(source.id()))
            .or_insert_with(HashMap::new)
            .entry(relation)
            .or_insert_with(Vec::new);
        if !list.iter().any(|u| u.id() == dest.id()) {
            list.push(Rc::clone(dest));
        }
    }
}
