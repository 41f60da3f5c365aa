//! Credentials and the OAuth2 grant that produces them

mod credentials;
mod listener;
mod oauth;

pub use credentials::{
    AppCredentials, CredentialFile, DEFAULT_REDIRECT_URI, UserCredentials, load, save,
};
pub use listener::{Redirect, RedirectListener};
pub use oauth::{Authenticator, DEFAULT_SCOPES, FailureReason, GrantState};
