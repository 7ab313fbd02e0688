mod backend;
mod connection;
mod executor;
mod lifecycle;
mod postgres;
mod schema;

pub use backend::*;
pub use connection::*;
pub use executor::*;
pub use postgres::*;
pub use schema::*;
