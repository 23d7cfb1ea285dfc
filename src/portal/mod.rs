//! Portal client core: REST wrapper, session store and navigation guard.
//!
//! The session store is the only writer of session state. The REST client
//! reads the bearer token from it per request, and the router reads a
//! [`router::guard::SessionView`] of it per transition.

pub mod api;
pub mod errors;
pub mod router;
pub mod session;
pub mod types;

pub use api::{ApiClient, ClientConfig, TokenProvider};
pub use errors::ApiError;
pub use session::{Session, SessionStore};
