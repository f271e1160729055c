//! Single-writer session task, its handle and event stream.

/// Event stream types emitted by the session.
pub mod events;
/// Handle and command loop implementation.
pub mod handle;
