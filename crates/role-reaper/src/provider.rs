//! The platform seam the reaper drives.
use std::future::Future;

use crate::UserError;

/// An IAM role as seen by the reaper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role {
    pub name: String,
    pub arn: Option<String>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Role {
            name: name.into(),
            arn: None,
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Access to the roles of one account.
///
/// The reaper is generic over this trait so that it can be run against
/// AWS (see [`crate::aws::iam::Iam`]) or against an in-memory account in
/// tests.
pub trait RoleProvider {
    /// Errors that may occur talking to the provider.
    type Error: UserError;

    /// Lists every role in the account, in the provider's order.
    ///
    /// Implementations must exhaust any pagination before returning.
    fn list_roles(&self) -> impl Future<Output = Result<Vec<Role>, Self::Error>>;

    /// Deletes the inline policy `policy_name` from the role `role_name`.
    fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Deletes the role `role_name`.
    fn delete_role(&self, role_name: &str) -> impl Future<Output = Result<(), Self::Error>>;
}

impl<T: RoleProvider> RoleProvider for &T {
    type Error = T::Error;

    fn list_roles(&self) -> impl Future<Output = Result<Vec<Role>, Self::Error>> {
        T::list_roles(self)
    }

    fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> {
        T::delete_role_policy(self, role_name, policy_name)
    }

    fn delete_role(&self, role_name: &str) -> impl Future<Output = Result<(), Self::Error>> {
        T::delete_role(self, role_name)
    }
}
