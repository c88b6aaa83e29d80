pub mod controller;
pub mod filter;
pub mod models;
pub mod registry;
pub mod selection;
pub mod traits;

pub use controller::*;
pub use filter::*;
pub use models::*;
pub use registry::*;
pub use selection::*;
pub use traits::*;
