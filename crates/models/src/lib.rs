mod head;
mod transaction;
mod session;
mod bid;

pub use head::*;
pub use transaction::*;
pub use session::*;
pub use bid::*;
