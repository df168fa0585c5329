// Network adapters: the WebSocket bus bridge for remote clients.

pub mod bridge;

pub use bridge::ws_handler;
