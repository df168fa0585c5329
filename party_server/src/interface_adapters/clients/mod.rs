// Registry adapters: the lobby server over HTTP, or a local in-memory copy.

pub mod memory;
pub mod registry;

pub use memory::MemoryRegistry;
pub use registry::HttpRegistry;
