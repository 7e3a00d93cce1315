pub mod client;
pub mod directory;
pub mod requests;
pub mod session;
pub mod tests;
pub mod transport;
