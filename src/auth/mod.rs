//! Session authentication, brute-force lockout and access rules.
//!
//! Every request is resolved to a [`SessionState`] from its bearer token before
//! the access guard and the response cache see it. Tokens are bound to the
//! address that requested them and expire `max_session` after issue.

mod authenticator;
mod client;
mod guard;
mod lockout;
mod password;
mod session;

pub use authenticator::{AuthenticationError, SessionAuthenticator, SessionState};
pub use client::observed_address;
pub use guard::{AccessDenied, AccessRule};
pub use lockout::{FailedLoginTracker, LockoutError, LockoutPolicy};
pub use password::{PasswordError, PasswordHasher};
pub use session::{SessionClaims, SessionError, SessionSigner};
