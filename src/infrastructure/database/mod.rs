pub mod connection_pool;
pub mod timestamps;

pub use connection_pool::ConnectionPool;
