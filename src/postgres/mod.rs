// ABOUTME: PostgreSQL backend - connection handling and value conversion
// ABOUTME: Converts tokio_postgres rows into Row and binds Value parameters

pub mod connection;
pub mod convert;

pub use connection::{connect, init_tls_policy};
pub use convert::pg_row_to_row;
