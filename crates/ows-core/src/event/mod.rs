//! Log append-only de transiciones de jobs y trait `JobEventStore`.

mod store;
mod types;

pub use store::{InMemoryJobEventStore, JobEventStore};
pub use types::{JobEvent, JobEventKind};
