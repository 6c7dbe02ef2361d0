pub mod builder;
pub mod handler;
pub mod listener;
pub mod shutdown;

pub use builder::{BoundServer, ServerBuilder};
pub use handler::ConnectionHandler;
