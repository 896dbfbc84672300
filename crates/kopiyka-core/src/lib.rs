pub mod clock;
pub mod constants;
pub mod error;
pub mod money;
pub mod types;

pub use clock::*;
pub use constants::*;
pub use error::KopiykaError;
pub use types::*;
