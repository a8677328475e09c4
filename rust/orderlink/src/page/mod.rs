//! Brightree page tools that run next to the order linker but share none of
//! its state: the popup interceptor and the page chrome patches.

pub mod chrome;
pub mod popup;

pub use chrome::*;
pub use popup::*;
