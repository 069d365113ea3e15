//! Domain models for the benefit case engine.

pub mod basis;
pub mod calculation;
pub mod case;
pub mod criterion;
pub mod decision;
pub mod period;
pub mod rate_table;
pub mod recovery;
