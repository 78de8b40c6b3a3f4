//! Pipeline integration suite
//!
//! End-to-end behaviour of snapshot and restore across stores:
//!
//! - `round_trip`: snapshot then restore reproduces keys and values
//! - `idempotence`: repeated restores change nothing
//! - `ordering`: referenced types are restored before referencing ones
//! - `scenarios`: the departments/employees walkthroughs, including abort
//! - `retention`: pruning a directory of real snapshot files
//!
//! ```bash
//! cargo test --test pipeline
//! cargo test --test pipeline retention::
//! ```

#[path = "../common/mod.rs"]
mod common;

mod idempotence;
mod ordering;
mod retention;
mod round_trip;
mod scenarios;
