pub mod log;
pub mod store;
mod tests;

pub use log::*;
pub use store::*;
