//! Auth session management
//!
//! [`AuthManager`] keeps the session (token, user, last email) in memory and
//! mirrors it to durable storage. The session is authenticated exactly when a
//! token is present; there is no separate flag to drift out of sync.
//!
//! States:
//!
//! ```text
//!   Uninitialized ──init()──► Authenticated   (token found in storage)
//!                       └───► Anonymous       (no token)
//!
//!   Anonymous ──login / register──► Authenticated
//!   Authenticated ──logout──► Anonymous             (auth:logout)
//!   Authenticated ──401 from get_profile──► Anonymous (auth:session-expired)
//! ```

mod error;
mod manager;

pub use error::AuthError;
pub use manager::{AuthEvent, AuthListener, AuthManager, AuthSession, AuthState, AuthTransition};
