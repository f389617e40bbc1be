pub mod conn;
pub mod pool;
pub mod stream;

pub use conn::{Connection, ConnectionState};
pub use pool::{ConnectionPool, PooledConnection};
