// Interface adapters: wire protocol, bus, listeners and network handling.

pub mod bus;
pub mod clients;
pub mod http;
pub mod listeners;
pub mod net;
pub mod protocol;
pub mod publisher;
pub mod state;
pub mod topics;
pub mod utils;
