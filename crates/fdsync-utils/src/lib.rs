//! Small helpers shared by the fdsync crates: XDG path resolution,
//! filesystem housekeeping, certificate fingerprints and time parsing.

pub mod error;
pub mod fs;
pub mod hash;
pub mod path;
pub mod time;
