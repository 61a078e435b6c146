// Utility functions
pub mod cache;
pub mod error;
pub mod pkce;
pub mod text;

pub use cache::*;
pub use error::*;
pub use text::*;
