//! Script execution engine for guided lab activities.
//!
//! A script is a tree of pedagogical components (texts, questions,
//! experiments, graphs, pages of those). The engine tracks each component's
//! completion state, derives the pages the learner may see (the active
//! chain) and persists progress so a run survives interruption. The crate
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (component states, active chain,
//!   persistence codec). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, script sources, run
//!   directories, state files, exports).
//!
//! [`script`] holds the aggregate root and [`session`] coordinates it with the
//! filesystem for the CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod script;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
