pub mod error;
pub mod facility;
pub mod lifecycle;
pub mod types;

pub use error::*;
pub use facility::*;
pub use lifecycle::*;
pub use types::*;
