pub mod client;
#[cfg(test)]
pub mod mock;
pub mod prompts;

pub use client::*;
pub use prompts::*;
