pub mod bus;
pub mod connection;
