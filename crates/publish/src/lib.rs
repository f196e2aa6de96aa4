//! Scrivener publishing adapters.
//!
//! Implements the [`pipeline::Publisher`] port:
//!
//! | Type | Destination |
//! |---|---|
//! | [`DryRunPublisher`] | `<run_id>.md` and `<run_id>.json` in a local directory |
//! | [`WordPressPublisher`] | an unpublished draft via the WordPress REST API |
//!
//! [`publisher_for`] turns a [`PublishSettings`] value into the right
//! publisher, falling back to the dry run when CMS credentials are missing.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Rendering lives in `pipeline::export`; this crate only
//! moves the rendered output.

mod dry_run;
mod target;
mod wordpress;

pub use dry_run::DryRunPublisher;
pub use target::{publisher_for, PublishSettings, PublishTarget};
pub use wordpress::{WordPressCredentials, WordPressPublisher, WORDPRESS_POSTS_PATH};
