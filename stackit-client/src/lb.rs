//! `LoadbalancerClient`: the typed adapter over the STACKIT load balancer
//! HTTP API (C3). Grounded on `iam-client`'s reqwest-wrapper-with-context
//! pattern: a thin trait so the reconciler can be tested against a fake,
//! and a single `Http` struct implementing it against the real API.

use async_trait::async_trait;
use reqwest::{Client, Method};
use stackit_common::Error;
use stackit_types::{LbStatus, LoadBalancer, LoadBalancerSpec, ObservabilityCredentials, TargetPool};

use crate::dto::{CredentialsDto, LoadBalancerDto, TargetPoolDto};
use crate::http::check_status;
use crate::metrics::{instrumented, op_name};

#[async_trait]
pub trait LoadbalancerClient: Send + Sync {
    /// `None` when no LB exists for this project+name yet.
    async fn get(&self, project_id: &str, name: &str) -> Result<Option<LoadBalancer>, Error>;

    async fn create(&self, project_id: &str, spec: &LoadBalancerSpec) -> Result<LoadBalancer, Error>;

    /// `expected_version` implements optimistic concurrency (§4.2/§4.3): the
    /// API rejects with `Conflict` if the stored version has moved on.
    async fn update(
        &self,
        project_id: &str,
        spec: &LoadBalancerSpec,
        expected_version: &str,
    ) -> Result<LoadBalancer, Error>;

    /// Idempotent: a `NotFound` from the API is swallowed and returned as
    /// `Ok(())`, per §4.3 `EnsureLoadBalancerDeleted`.
    async fn delete(&self, project_id: &str, name: &str) -> Result<(), Error>;

    async fn update_target_pool(
        &self,
        project_id: &str,
        lb_name: &str,
        pool: &TargetPool,
    ) -> Result<(), Error>;

    async fn create_credentials(
        &self,
        project_id: &str,
        display_name: &str,
        user: &str,
        password: &str,
    ) -> Result<ObservabilityCredentials, Error>;

    async fn update_credentials(
        &self,
        project_id: &str,
        credentials_ref: &str,
        user: &str,
        password: &str,
    ) -> Result<(), Error>;

    async fn list_credentials(&self, project_id: &str) -> Result<Vec<ObservabilityCredentials>, Error>;

    async fn delete_credentials(&self, project_id: &str, credentials_ref: &str) -> Result<(), Error>;
}

pub struct HttpLoadbalancerClient {
    client: Client,
    base_url: String,
}

impl HttpLoadbalancerClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl LoadbalancerClient for HttpLoadbalancerClient {
    async fn get(&self, project_id: &str, name: &str) -> Result<Option<LoadBalancer>, Error> {
        let path = format!("/v1/projects/{project_id}/load-balancers/{name}");
        let op = op_name("GET", &path);
        instrumented(&op, async {
            let resp = self.client.get(self.url(&path)).send().await?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let resp = check_status(resp).await?;
            let dto: LoadBalancerDto = resp.json().await?;
            let lb = dto
                .into_domain()
                .map_err(|e| Error::Internal(format!("malformed load balancer response: {e}")))?;
            Ok(Some(lb))
        })
        .await
    }

    async fn create(&self, project_id: &str, spec: &LoadBalancerSpec) -> Result<LoadBalancer, Error> {
        let path = format!("/v1/projects/{project_id}/load-balancers");
        let op = op_name("POST", &path);
        instrumented(&op, async {
            let body = LoadBalancerDto::from_spec(spec, None, None);
            let resp = self.client.post(self.url(&path)).json(&body).send().await?;
            let resp = check_status(resp).await?;
            let dto: LoadBalancerDto = resp.json().await?;
            dto.into_domain()
                .map_err(|e| Error::Internal(format!("malformed create response: {e}")))
        })
        .await
    }

    async fn update(
        &self,
        project_id: &str,
        spec: &LoadBalancerSpec,
        expected_version: &str,
    ) -> Result<LoadBalancer, Error> {
        let path = format!("/v1/projects/{project_id}/load-balancers/{}", spec.name);
        let op = op_name("PUT", &path);
        instrumented(&op, async {
            let body = LoadBalancerDto::from_spec(spec, Some(expected_version), Some(LbStatus::Pending));
            let resp = self
                .client
                .request(Method::PUT, self.url(&path))
                .json(&body)
                .send()
                .await?;
            let resp = check_status(resp).await?;
            let dto: LoadBalancerDto = resp.json().await?;
            dto.into_domain()
                .map_err(|e| Error::Internal(format!("malformed update response: {e}")))
        })
        .await
    }

    async fn delete(&self, project_id: &str, name: &str) -> Result<(), Error> {
        let path = format!("/v1/projects/{project_id}/load-balancers/{name}");
        let op = op_name("DELETE", &path);
        instrumented(&op, async {
            let resp = self.client.delete(self.url(&path)).send().await?;
            match check_status(resp).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn update_target_pool(
        &self,
        project_id: &str,
        lb_name: &str,
        pool: &TargetPool,
    ) -> Result<(), Error> {
        let path = format!(
            "/v1/projects/{project_id}/load-balancers/{lb_name}/target-pools/{}",
            pool.name
        );
        let op = op_name("PUT", &path);
        instrumented(&op, async {
            let body = TargetPoolDto::from(pool);
            let resp = self
                .client
                .request(Method::PUT, self.url(&path))
                .json(&body)
                .send()
                .await?;
            check_status(resp).await?;
            Ok(())
        })
        .await
    }

    async fn create_credentials(
        &self,
        project_id: &str,
        display_name: &str,
        user: &str,
        password: &str,
    ) -> Result<ObservabilityCredentials, Error> {
        let path = format!("/v1/projects/{project_id}/credentials");
        let op = op_name("POST", &path);
        instrumented(&op, async {
            #[derive(serde::Serialize)]
            struct Req<'a> {
                #[serde(rename = "displayName")]
                display_name: &'a str,
                user: &'a str,
                password: &'a str,
            }
            let resp = self
                .client
                .post(self.url(&path))
                .json(&Req {
                    display_name,
                    user,
                    password,
                })
                .send()
                .await?;
            let resp = check_status(resp).await?;
            let dto: CredentialsDto = resp.json().await?;
            Ok(ObservabilityCredentials::from(dto))
        })
        .await
    }

    async fn update_credentials(
        &self,
        project_id: &str,
        credentials_ref: &str,
        user: &str,
        password: &str,
    ) -> Result<(), Error> {
        let path = format!("/v1/projects/{project_id}/credentials/{credentials_ref}");
        let op = op_name("PUT", &path);
        instrumented(&op, async {
            #[derive(serde::Serialize)]
            struct Req<'a> {
                user: &'a str,
                password: &'a str,
            }
            let resp = self
                .client
                .request(Method::PUT, self.url(&path))
                .json(&Req { user, password })
                .send()
                .await?;
            check_status(resp).await?;
            Ok(())
        })
        .await
    }

    async fn list_credentials(&self, project_id: &str) -> Result<Vec<ObservabilityCredentials>, Error> {
        let path = format!("/v1/projects/{project_id}/credentials");
        let op = op_name("GET", &path);
        instrumented(&op, async {
            let resp = self.client.get(self.url(&path)).send().await?;
            let resp = check_status(resp).await?;
            let dtos: Vec<CredentialsDto> = resp.json().await?;
            Ok(dtos.into_iter().map(ObservabilityCredentials::from).collect())
        })
        .await
    }

    async fn delete_credentials(&self, project_id: &str, credentials_ref: &str) -> Result<(), Error> {
        let path = format!("/v1/projects/{project_id}/credentials/{credentials_ref}");
        let op = op_name("DELETE", &path);
        instrumented(&op, async {
            let resp = self.client.delete(self.url(&path)).send().await?;
            match check_status(resp).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            }
        })
        .await
    }
}
