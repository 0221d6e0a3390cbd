//! Authentication: credential checks, token issuing and identity resolution.
//!
//! - **Token issuer** ([`AuthService`]): registration and login against the
//!   credential store, each returning a signed seven day token
//! - **Auth extractor** ([`AuthExtractor`]): resolves an inbound
//!   `Authorization: Bearer <token>` header to a [`UserContext`]
//!
//! ## Security Model
//!
//! - Tokens are stateless HS256 JWTs; rotating the secret invalidates all of them
//! - Every verification failure (malformed, expired, foreign signature) is
//!   reported to callers as the same unauthenticated error
//! - Login failures never reveal whether the email exists
//! - Passwords are stored as salted argon2id hashes only

mod context;
mod extractor;
pub mod password;
mod service;
pub mod token;
mod user_store;
pub mod validation;

pub use context::UserContext;
pub use extractor::{AuthError, AuthExtractor};
pub use service::AuthService;
pub use token::{Claims, DEFAULT_TOKEN_TTL_DAYS, TokenError, TokenIssuer};
pub use user_store::UserStore;
