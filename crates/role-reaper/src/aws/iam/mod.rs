//! IAM roles.
use aws_config::SdkConfig;

use crate::{Role, RoleProvider};

/// [`RoleProvider`] backed by the AWS IAM API.
#[derive(Clone, Debug)]
pub struct Iam {
    client: aws_sdk_iam::Client,
}

impl Iam {
    pub fn new(cfg: &SdkConfig) -> Self {
        Self::from_client(aws_sdk_iam::Client::new(cfg))
    }

    pub fn from_client(client: aws_sdk_iam::Client) -> Self {
        Iam { client }
    }
}

impl RoleProvider for Iam {
    type Error = anyhow::Error;

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let mut roles = vec![];
        let mut pages = self.client.list_roles().into_paginator().items().send();
        while let Some(role) = pages.next().await {
            let role = role.map_err(aws_sdk_iam::Error::from)?;
            roles.push(Role::new(role.role_name()).with_arn(role.arn()));
        }
        log::debug!("...listed {} roles", roles.len());
        Ok(roles)
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> anyhow::Result<()> {
        let _ = self
            .client
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(aws_sdk_iam::Error::from)?;
        log::debug!("...deleted policy {policy_name} from role {role_name}");
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> anyhow::Result<()> {
        let _ = self
            .client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(aws_sdk_iam::Error::from)?;
        log::debug!("...deleted role {role_name}");
        Ok(())
    }
}
