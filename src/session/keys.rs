//! Typed session keys.
//!
//! Each value stored in a session is addressed by a marker type implementing [`SessionKey`],
//! which fixes both the stored name and the value type. Reading a key back can therefore only
//! fail if the stored JSON was written by something else.

use crate::models::UserId;
use serde::{de::DeserializeOwned, Serialize};

pub trait SessionKey {
    const NAME: &'static str;
    type Value: Serialize + DeserializeOwned;
}

/// Id of the logged-in user.
pub struct AuthenticatedUserId;

impl SessionKey for AuthenticatedUserId {
    const NAME: &'static str = "authenticatedUserID";
    type Value = UserId;
}

/// One-shot message shown on the next rendered page.
pub struct Flash;

impl SessionKey for Flash {
    const NAME: &'static str = "flash";
    type Value = String;
}

/// Per-session CSRF secret.
pub struct CsrfSecret;

impl SessionKey for CsrfSecret {
    const NAME: &'static str = "csrfToken";
    type Value = String;
}

/// Path (with query) an anonymous visitor asked for before being sent to log in.
pub struct RedirectPathAfterLogin;

impl SessionKey for RedirectPathAfterLogin {
    const NAME: &'static str = "redirectPathAfterLogin";
    type Value = String;
}
