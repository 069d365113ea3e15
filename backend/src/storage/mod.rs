//! Storage layer: abstraction traits plus the in-memory implementation.

pub mod memory;
pub mod traits;

pub use memory::MemoryConnection;
pub use traits::{
    CaseStorage, Connection, DecisionStorage, RecoveryCaseStorage, StorageError,
};
