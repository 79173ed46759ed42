mod rpc_dialer;
mod block_subscriber;
mod session_clock;
mod bidder;

pub use rpc_dialer::*;
pub use block_subscriber::*;
pub use session_clock::*;
pub use bidder::*;
