//! App layer - central state management and command processing
//!
//! The App actor receives front-end events and network responses,
//! updates state, and emits network commands and snapshots.

pub mod actor;
pub mod commands;
pub mod debounce;
pub mod state;

pub use actor::AppActor;
pub use debounce::Debouncer;
pub use state::AppState;
