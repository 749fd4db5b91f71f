mod core;
mod streams;

pub use core::{cmd_connect, cmd_headsets, cmd_info};
pub use streams::{StreamArgs, cmd_stream};
