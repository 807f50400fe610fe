//! Authentication strategies for SSH connections.
//!
//! - [`PasswordAuth`]: login password
//! - [`KeyAuth`]: private key file
//! - [`AgentAuth`]: identities from the running SSH agent
//!
//! [`AuthChain::from_credentials`] assembles them from the configured
//! [`Credentials`](crate::mcp::transport::Credentials).

mod agent;
mod chain;
mod key;
mod password;
mod traits;

pub use agent::AgentAuth;
pub use chain::AuthChain;
pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;
