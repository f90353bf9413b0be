//! Command-driven chat assistant over an in-process key-value + pub/sub store.
//!
//! See `README.md` for usage. Each module focuses on a concrete
//! responsibility:
//!
//! - [`cli`] parses the command-line interface.
//! - [`store`] is the key-value + pub/sub backend adapter: profiles, weather,
//!   facts, per-channel message history, and broadcast-based subscriptions.
//! - [`session`] holds the per-run identity and the live channel listeners.
//! - [`command`] turns an input line into a structured command.
//! - [`dispatch`] validates arguments and routes commands to their handlers.
//! - [`listener`] runs one cancellable receive task per joined channel.
//! - [`repl`] is the interactive loop tying the above together.
//! - [`seed`] loads the static weather and fact reference data.
//!
//! Integration and end-to-end tests use this crate directly to script whole
//! conversations against in-memory pipes or the spawned binary.

pub mod cli;
pub mod command;
pub mod dispatch;
pub mod listener;
pub mod repl;
pub mod seed;
pub mod session;
pub mod store;
