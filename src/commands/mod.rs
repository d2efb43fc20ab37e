//! Typed argument structs for the macOS tools macdeploy invokes.

pub mod curl;
pub mod hdiutil;
pub mod installer;
