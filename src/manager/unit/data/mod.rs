pub use unit_state::UnitActiveState;

mod unit_state;
