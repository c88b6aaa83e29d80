pub mod error;
pub mod library;
pub mod responder;

pub use error::*;
pub use library::*;
pub use responder::*;
