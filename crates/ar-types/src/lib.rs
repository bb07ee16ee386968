pub mod arrangement;
pub mod evaluation;
pub mod errors;

pub use arrangement::*;
pub use evaluation::*;
pub use errors::*;
