pub mod manifest;
pub mod request;
pub mod response;

pub use manifest::*;
pub use request::*;
pub use response::*;
