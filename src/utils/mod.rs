//! Helpers shared by the command-line runners.
//!
//! - **`perf`**: reads the peak resident set size on Linux, reported next to the timing
//!   columns of the truncation sweep.

pub mod perf;
