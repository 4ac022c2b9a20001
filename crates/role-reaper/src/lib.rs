//! # Reaper
//!
//! Reaper removes the "zombie" IAM roles a serverless deployment leaves
//! behind. Every role whose name starts with the deployment prefix has its
//! inline `{stage}-{service}-lambda` policy deleted, and is then deleted
//! itself.
//!
//! ## Usage
//!
//! Resolve a [`NamingContext`] from whatever the host provides plus any
//! command line overrides, pick a [`RoleProvider`] (usually
//! [`aws::iam::Iam`]) and hand both to a [`Reaper`]:
//!
//! ```no_run
//! # async fn doc() -> anyhow::Result<()> {
//! use reaper::{aws, config::Overrides, NamingContext, Reaper};
//!
//! let naming = NamingContext::resolve(
//!     None,
//!     &Overrides {
//!         service: Some("buyte".into()),
//!         stage: Some("dev".into()),
//!         ..Default::default()
//!     },
//! )?;
//! let sdk_cfg = aws::load_sdk_config(naming.region.as_deref()).await;
//! let report = Reaper::new(aws::iam::Iam::new(&sdk_cfg), naming)
//!     .with_apply(true)
//!     .run()
//!     .await?;
//! println!("{report}");
//! report.into_result()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Everything that can go wrong is a variant of [`Error`]. Enumeration
//! failures abort a run. Teardown failures are captured per role inside the
//! [`Report`], and only become an [`Error::PartialFailure`] when the caller
//! asks for the aggregate status with [`Report::into_result`].

pub mod aws;
pub mod config;
pub mod provider;
mod reap;
#[cfg(test)]
mod test;

pub use config::NamingContext;
pub use provider::{Role, RoleProvider};
pub use reap::{Reaper, Report, RoleOutcome, Status, DEFAULT_CONCURRENCY};

/// Marker trait for provider errors.
pub trait UserError: core::fmt::Display + core::fmt::Debug + Send + Sync + 'static {}
impl<T: core::fmt::Display + core::fmt::Debug + Send + Sync + 'static> UserError for T {}

/// Top-level error enum that encompasses all errors.
#[derive(snafu::Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Could not enumerate roles: {error}"))]
    Enumeration { error: Box<dyn UserError> },

    #[snafu(display("Could not delete inline policy '{policy}' from role '{role}': {error}"))]
    DetachPolicy {
        role: String,
        policy: String,
        error: Box<dyn UserError>,
    },

    #[snafu(display("Could not delete role '{role}': {error}"))]
    DeleteRole {
        role: String,
        error: Box<dyn UserError>,
    },

    #[snafu(display("{failed} of {attempted} roles could not be removed"))]
    PartialFailure { failed: usize, attempted: usize },

    #[snafu(display(
        "Missing '{field}', pass it on the command line or provide it in the host context"
    ))]
    MissingConfig { field: &'static str },

    #[snafu(display("Refusing to run with an empty role prefix, it would match every role"))]
    EmptyPrefix,

    #[snafu(display("Could not read host context '{path:?}': {source}"))]
    ReadHostContext {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not parse host context '{path:?}' as JSON: {source}"))]
    ParseHostJson {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Could not parse host context '{path:?}' as TOML: {source}"))]
    ParseHostToml {
        path: std::path::PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display(
        "Unknown host context format for '{path:?}', expected a .json or .toml file"
    ))]
    UnknownHostFormat { path: std::path::PathBuf },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
