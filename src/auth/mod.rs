/// Accounts and credentials
///
/// Password hashing, session tokens and the service that ties them to user
/// persistence.

pub mod password;
pub mod service;
pub mod token;
pub mod types;

pub use password::{PasswordError, PasswordParams};
pub use service::{AuthError, AuthService};
pub use token::{Claims, TokenError};
pub use types::User;
