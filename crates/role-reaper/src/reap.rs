//! The reaper pipeline: enumerate, tear down in parallel, report.
use std::num::NonZeroUsize;

use futures::stream::{self, StreamExt};

use crate::{Error, NamingContext, Result, Role, RoleProvider};

/// Teardowns allowed in flight at once unless configured otherwise.
pub const DEFAULT_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(8) {
    Some(n) => n,
    None => unreachable!(),
};

/// What happened to a single role.
#[derive(Debug)]
pub enum Status {
    /// Selected, but the run was not applied.
    Planned,
    /// The inline policy and then the role were deleted.
    Removed,
    Failed(Error),
}

impl Status {
    pub fn is_failed(&self) -> bool {
        matches!(self, Status::Failed(_))
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Planned => f.write_str("remove"),
            Status::Removed => f.write_str("removed"),
            Status::Failed(e) => write!(f, "failed ({e})"),
        }
    }
}

#[derive(Debug)]
pub struct RoleOutcome {
    pub role: Role,
    pub status: Status,
}

/// Per-role outcomes of one run, in enumeration order.
#[derive(Debug)]
pub struct Report {
    /// The prefix roles were selected by.
    pub prefix: String,
    pub outcomes: Vec<RoleOutcome>,
}

impl Report {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn removed(&self) -> impl Iterator<Item = &Role> + '_ {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, Status::Removed))
            .map(|o| &o.role)
    }

    pub fn planned(&self) -> impl Iterator<Item = &Role> + '_ {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, Status::Planned))
            .map(|o| &o.role)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Role, &Error)> + '_ {
        self.outcomes.iter().filter_map(|o| match &o.status {
            Status::Failed(e) => Some((&o.role, e)),
            _ => None,
        })
    }

    /// `true` when no role failed. An empty report is a success.
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|o| o.status.is_failed())
    }

    /// Returns the report if every role succeeded, otherwise a
    /// [`Error::PartialFailure`].
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failures().count();
        snafu::ensure!(
            failed == 0,
            crate::PartialFailureSnafu {
                failed,
                attempted: self.attempted(),
            }
        );
        Ok(self)
    }
}

impl core::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.outcomes.is_empty() {
            return writeln!(f, "No roles match prefix '{}'.", self.prefix);
        }
        for outcome in &self.outcomes {
            writeln!(f, "  {} '{}'", outcome.status, outcome.role)?;
        }
        Ok(())
    }
}

/// Keeps the roles whose names match the naming context's prefix.
pub(crate) fn select_roles(roles: Vec<Role>, naming: &NamingContext) -> Vec<Role> {
    roles
        .into_iter()
        .filter(|role| {
            let keep = naming.matches(&role.name);
            if !keep {
                log::trace!("  skipping {role}");
            }
            keep
        })
        .collect()
}

/// Removes the stale roles of one deployment.
pub struct Reaper<P> {
    provider: P,
    naming: NamingContext,
    concurrency: NonZeroUsize,
    apply: bool,
}

impl<P: RoleProvider> Reaper<P> {
    /// Creates a reaper that only plans. See [`Reaper::with_apply`].
    pub fn new(provider: P, naming: NamingContext) -> Self {
        Reaper {
            provider,
            naming,
            concurrency: DEFAULT_CONCURRENCY,
            apply: false,
        }
    }

    /// Bounds how many roles are torn down at once.
    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Whether to actually delete anything. Required to change the account.
    pub fn with_apply(mut self, apply: bool) -> Self {
        self.apply = apply;
        self
    }

    /// Lists the roles selected by the prefix.
    pub async fn list(&self) -> Result<Vec<Role>> {
        let roles = self
            .provider
            .list_roles()
            .await
            .map_err(|error| Error::Enumeration {
                error: Box::new(error),
            })?;
        log::debug!("{} roles in account", roles.len());
        Ok(select_roles(roles, &self.naming))
    }

    /// Deletes the deployment's inline policy from `role`.
    pub async fn detach_policy(&self, role: &Role) -> Result<()> {
        let policy = self.naming.policy_name();
        log::debug!("deleting policy {policy} from {role}");
        self.provider
            .delete_role_policy(&role.name, &policy)
            .await
            .map_err(|error| Error::DetachPolicy {
                role: role.name.clone(),
                policy,
                error: Box::new(error),
            })
    }

    pub async fn delete(&self, role: &Role) -> Result<()> {
        log::debug!("deleting role {role}");
        self.provider
            .delete_role(&role.name)
            .await
            .map_err(|error| Error::DeleteRole {
                role: role.name.clone(),
                error: Box::new(error),
            })
    }

    async fn remove(&self, role: &Role) -> Result<()> {
        self.detach_policy(role).await?;
        self.delete(role).await
    }

    async fn teardown(&self, role: Role) -> RoleOutcome {
        let status = match self.remove(&role).await {
            Ok(()) => {
                log::info!("removed role {role}");
                Status::Removed
            }
            Err(e) => {
                log::warn!("{e}");
                Status::Failed(e)
            }
        };
        RoleOutcome { role, status }
    }

    /// Enumerates the matching roles and tears each one down.
    ///
    /// Fails only if enumeration fails. Teardown failures are recorded in
    /// the [`Report`].
    pub async fn run(&self) -> Result<Report> {
        log::info!("removing IAM roles with prefix: {}", self.naming.prefix);
        let roles = self.list().await?;
        log::info!("{} roles selected", roles.len());

        let outcomes = if self.apply {
            stream::iter(roles)
                .map(|role| self.teardown(role))
                .buffered(self.concurrency.get())
                .collect::<Vec<_>>()
                .await
        } else {
            roles
                .into_iter()
                .map(|role| {
                    log::info!("would remove role {role}");
                    RoleOutcome {
                        role,
                        status: Status::Planned,
                    }
                })
                .collect()
        };

        Ok(Report {
            prefix: self.naming.prefix.clone(),
            outcomes,
        })
    }
}
