//! HTTP transport for the audit service: the [`RemoteClient`] implementing
//! the core transport contract, and the [`BearerTokenStore`] feeding it
//! credentials.

pub mod client;
pub mod token;

pub use client::RemoteClient;
pub use token::BearerTokenStore;
