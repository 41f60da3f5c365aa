//! # tootkit 🐘
//!
//! A typed async client for the Mastodon API, with the OAuth2 grant that
//! gets you a token.
//!
//! ## Overview
//!
//! tootkit decodes Mastodon payloads into typed entities, keeps application
//! and user credentials in small JSON files, and runs the authorization-code
//! grant against a local redirect listener. Every API call goes through one
//! request executor that handles authentication, a single rate-limit retry,
//! error mapping and `Link` pagination.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │   Mastodon (auth)    │──Deref─▶│    PublicClient      │
//! └──────────────────────┘        └──────────────────────┘
//!            │                               │
//!            └───────────────┬───────────────┘
//!                            ▼
//!              ┌──────────────────────────┐
//!              │        Executor          │
//!              │ • bearer auth            │
//!              │ • 429 retry once         │
//!              │ • status → Error         │
//!              │ • Link → Cursor          │
//!              └──────────────────────────┘
//!                            │
//!          ┌─────────────────┼─────────────────┐
//!          ▼                 ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │     Models      │ │      Auth       │ │     Config      │
//! │ • Status        │ │ • Credentials   │ │ • TOML file     │
//! │ • Account       │ │ • OAuth grant   │ │ • Paths         │
//! │ • Page/Cursor   │ │ • Redirect      │ │                 │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`] — Public and authenticated clients, request executor
//! - [`auth`] — Credential files and the OAuth2 grant
//! - [`config`] — Configuration management
//! - [`error`] — Error taxonomy
//! - [`models`] — Typed API entities
//! - [`paths`] — Default file locations
//!
//! ## Example
//!
//! ```no_run
//! use tootkit::{Mastodon, UserCredentials, auth::CredentialFile};
//!
//! # async fn run() -> tootkit::Result<()> {
//! let user = UserCredentials::load(std::path::Path::new("user.json"))?;
//! let client = Mastodon::new(&user)?;
//! let status = client.toot("Hello from Rust!").await?;
//! println!("posted {}", status.id);
//! client.close();
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/tootkit/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::single_match_else)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::use_self)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod paths;

// Re-export main types for convenience
pub use api::{ClientBuilder, Mastodon, MediaUpload, NewStatus, PublicClient};
pub use auth::{AppCredentials, Authenticator, GrantState, UserCredentials};
pub use config::Config;
pub use error::{Error, FieldError, Result};
pub use models::{Account, Cursor, MediaAttachment, Page, ScheduledStatus, Status, Visibility};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
