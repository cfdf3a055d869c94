//! CLI command implementations.

pub mod cart;
pub mod quote;
pub mod resolve;

pub use cart::CartCommand;
pub use quote::QuoteCommand;
pub use resolve::{Resolution, ResolveCommand};
