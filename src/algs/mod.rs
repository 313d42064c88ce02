//! Message passing used by the decomposed save/load protocol.

pub mod broadcast;
pub mod communicator;
pub mod wire;

pub use broadcast::{broadcast_recv, broadcast_send};
pub use communicator::{CommTag, Communicator, LocalComm, NoComm, Wait};
