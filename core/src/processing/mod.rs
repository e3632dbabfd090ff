pub mod demux;
pub mod store;
pub mod window;

pub use demux::{Demultiplexer, DrainReport};
pub use store::{ChannelState, ChannelStore};
pub use window::RollingWindow;
