pub use unit_base::{JobMode, UnitLoadState, UnitRelations, UnitType};
pub use unit_datastore::{UnitDep, UnitSets};
pub use unit_entry::UnitX;

// state data
pub mod data;

// engine
pub mod job;

// base
mod unit_base;

// entry
mod unit_entry;

// datastore
mod unit_datastore;
