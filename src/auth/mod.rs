// Authentication module
// Token issuing/verification and password hashing

mod jwt;
mod password;
mod types;

pub use jwt::TokenIssuer;
pub use password::Passwords;
pub use types::{AuthToken, Claims, LoginRequest};
