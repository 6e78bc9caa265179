//! Stream Utilities
//!
//! Small combinators the services are assembled from.

mod debounce;
mod diff;
mod persistent;
mod repeat;
mod state;

pub use debounce::debounce;
pub use diff::{changes, diff};
pub use persistent::{DEFAULT_SAMPLE_INTERVAL, PersistError, PersistedChanges, PersistentDiff};
pub use repeat::repeatable;
pub use state::state_in;
