mod network;
mod resolver;
mod snapshot;

pub use network::*;
pub use resolver::*;
pub use snapshot::*;
