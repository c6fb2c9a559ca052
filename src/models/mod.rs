pub mod enums;
pub mod filters;
pub mod rule;
pub mod source;
pub mod stats;

pub use enums::*;
pub use filters::*;
pub use rule::*;
pub use source::*;
pub use stats::*;
