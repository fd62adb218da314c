pub mod client;
pub mod gateway;
pub mod strkey;
pub mod xdr;

pub use client::{HorizonClient, HorizonError};
pub use gateway::HorizonGateway;
