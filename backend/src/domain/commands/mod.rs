//! Command and result structs for the domain services.

pub mod case;
pub mod recovery;
