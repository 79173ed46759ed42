mod orchestrator;
mod bid_composer;
mod bid_dispatcher;
mod preconf_runner;

pub use orchestrator::*;
pub use bid_composer::*;
pub use bid_dispatcher::*;
pub use preconf_runner::*;
