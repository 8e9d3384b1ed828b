pub mod hyperlinks;
pub mod input;
pub mod output;
pub mod tabular;

pub use input::*;
pub use output::*;
pub use tabular::*;
