pub mod listing;
pub mod request;
pub mod role;
pub mod user;

pub use listing::*;
pub use request::*;
pub use role::*;
pub use user::*;
