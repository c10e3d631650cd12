//! Bookshelf application library
//!
//! Wires the book catalogue module into the kernel registry and exposes the
//! startup sequence shared by the binaries.

pub mod bootstrap;
pub mod modules;

pub use modules::*;
