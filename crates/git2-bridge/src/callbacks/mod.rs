//! Native objects whose operations call back into Rust.
//!
//! Tree walks, diffs, pack-builder and object-database iteration, submodule
//! iteration and bulk index updates take closures that live on the caller's
//! stack for one call. Remotes and rebases keep their callbacks attached for
//! as long as the native object exists.

pub mod diff;
pub mod index;
pub mod odb;
pub mod packbuilder;
pub mod rebase;
pub mod remote;
pub mod repository;
pub mod tree;
