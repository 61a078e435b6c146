pub mod profile;
pub mod query;
pub mod transaction;
pub mod user;

pub use profile::*;
pub use query::*;
pub use transaction::*;
pub use user::*;
