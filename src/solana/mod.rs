pub mod chain;
pub mod health;
pub mod rpc;
pub mod transaction_builder;

pub use chain::{ChainClient, SimulationOutcome};
pub use rpc::{Endpoint, EndpointConfig, ResilientConnection};
pub use transaction_builder::TransactionBuilder;
