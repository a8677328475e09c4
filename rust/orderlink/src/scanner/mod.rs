pub mod patterns;
pub mod extract;
pub mod rewrite;
pub mod eligibility;
pub mod driver;
pub mod monitor;

#[cfg(test)]
mod tests;

pub use patterns::*;
pub use extract::*;
pub use rewrite::*;
pub use eligibility::*;
pub use driver::*;
pub use monitor::*;
