pub mod kinds;
pub mod protocol;

pub use kinds::*;
pub use protocol::*;
