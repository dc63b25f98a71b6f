pub mod adapter;
pub mod constants;
pub mod types;

pub use adapter::GapAdapter;
pub use constants::*;
pub use types::*;