//! Resolving which roles belong to a deployment.
//!
//! The naming context is built once per run from two sources: a host
//! context (the deployment framework's view of the service, loaded from a
//! file) and explicit overrides, usually from the command line. An override
//! always wins over the host context, and the host context wins over the
//! derived defaults.
use snafu::prelude::*;

use crate::{
    EmptyPrefixSnafu, MissingConfigSnafu, ParseHostJsonSnafu, ParseHostTomlSnafu,
    ReadHostContextSnafu, Result, UnknownHostFormatSnafu,
};

/// Provider section of a host context.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
pub struct HostProvider {
    pub stage: Option<String>,
    pub region: Option<String>,
}

/// Custom section of a host context.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCustom {
    pub api_gateway_name: Option<String>,
}

/// Host-injected deployment configuration.
///
/// Mirrors the shape of a printed serverless service config. Unknown keys
/// are ignored.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
pub struct HostContext {
    pub service: Option<String>,
    #[serde(default)]
    pub provider: HostProvider,
    #[serde(default)]
    pub custom: HostCustom,
}

impl HostContext {
    /// Reads a host context from a `.json` or `.toml` file.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str());
        ensure!(
            matches!(extension, Some("json") | Some("toml")),
            UnknownHostFormatSnafu { path }
        );
        log::debug!("reading host context from {path:?}");
        let contents = std::fs::read_to_string(path).context(ReadHostContextSnafu { path })?;
        if extension == Some("json") {
            Self::from_json(&contents).context(ParseHostJsonSnafu { path })
        } else {
            toml::from_str(&contents).context(ParseHostTomlSnafu { path })
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

/// Values given explicitly by the operator.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Overrides {
    pub service: Option<String>,
    pub stage: Option<String>,
    pub region: Option<String>,
    pub prefix: Option<String>,
}

/// The resolved naming of one deployment. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingContext {
    pub service: String,
    pub stage: String,
    pub region: Option<String>,
    /// Roles whose names start with this are reaped.
    pub prefix: String,
}

impl NamingContext {
    /// Builds a naming context without a host, deriving the prefix.
    pub fn new(service: impl Into<String>, stage: impl Into<String>) -> Self {
        let service = service.into();
        let stage = stage.into();
        NamingContext {
            prefix: format!("{service}-{stage}"),
            service,
            stage,
            region: None,
        }
    }

    /// Resolves the naming context from the host context and overrides.
    pub fn resolve(host: Option<&HostContext>, overrides: &Overrides) -> Result<Self> {
        let host = host.cloned().unwrap_or_default();
        let service = overrides
            .service
            .clone()
            .or(host.service)
            .context(MissingConfigSnafu { field: "service" })?;
        let stage = overrides
            .stage
            .clone()
            .or(host.provider.stage)
            .context(MissingConfigSnafu { field: "stage" })?;
        let region = overrides.region.clone().or(host.provider.region);
        let prefix = overrides
            .prefix
            .clone()
            .or(host.custom.api_gateway_name)
            .unwrap_or_else(|| format!("{service}-{stage}"));
        ensure!(!prefix.is_empty(), EmptyPrefixSnafu);

        Ok(NamingContext {
            service,
            stage,
            region,
            prefix,
        })
    }

    /// Name of the inline policy each reaped role carries.
    pub fn policy_name(&self) -> String {
        format!("{}-{}-lambda", self.stage, self.service)
    }

    pub fn matches(&self, role_name: &str) -> bool {
        role_name.starts_with(&self.prefix)
    }
}
