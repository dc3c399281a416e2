//! Kubernetes REST client with timeout and error handling.
//!
//! # Responsibilities
//! - Locate the API server (configured URL or in-cluster environment)
//! - Authenticate with the service account token
//! - Patch, list and delete pods in one namespace

use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Certificate, Client, RequestBuilder, Response};
use url::Url;

use crate::config::KubernetesConfig;
use crate::kube::types::{KubeError, KubeResult, PatchOperation, Pod, PodList};

const JSON_PATCH: &str = "application/json-patch+json";

/// Namespaced pod API client.
#[derive(Clone)]
pub struct KubeClient {
    http: Client,
    base: Url,
    namespace: String,
    token: Option<String>,
}

impl KubeClient {
    /// Create a client against `base` (e.g. `https://10.0.0.1:443`).
    pub fn new(
        base: Url,
        namespace: impl Into<String>,
        token: Option<String>,
        ca_pem: Option<&[u8]>,
        timeout: Duration,
    ) -> KubeResult<Self> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(pem) = ca_pem {
            builder = builder.add_root_certificate(Certificate::from_pem(pem)?);
        }
        Ok(Self {
            http: builder.build()?,
            base,
            namespace: namespace.into(),
            token,
        })
    }

    /// Build from configuration.
    ///
    /// Returns `Ok(None)` when Kubernetes access is disabled or no API server
    /// can be located, i.e. the process is not running in a cluster.
    pub fn from_config(config: &KubernetesConfig) -> KubeResult<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let Some(base) = resolve_api_url(config, |key| std::env::var(key).ok())? else {
            return Ok(None);
        };

        let token = read_optional(&config.token_path)?
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string());
        let ca = read_optional(&config.ca_path)?;

        let client = Self::new(
            base,
            config.namespace.clone(),
            token,
            ca.as_deref(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        tracing::info!(api = %client.base, namespace = %client.namespace, "Kubernetes client initialized");
        Ok(Some(client))
    }

    /// Set one label on a pod.
    pub async fn patch_pod_label(&self, pod: &str, label: &str, value: &str) -> KubeResult<()> {
        let url = self.pod_url(Some(pod))?;
        let body = serde_json::to_vec(&[PatchOperation::set_label(label, value)])?;
        let response = self
            .authorized(self.http.patch(url))
            .header(CONTENT_TYPE, HeaderValue::from_static(JSON_PATCH))
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// List pods matching the selectors.
    pub async fn list_pods(
        &self,
        label_selector: &str,
        field_selector: Option<&str>,
    ) -> KubeResult<Vec<Pod>> {
        let mut url = self.pod_url(None)?;
        {
            let mut query = url.query_pairs_mut();
            if !label_selector.is_empty() {
                query.append_pair("labelSelector", label_selector);
            }
            if let Some(fields) = field_selector.filter(|f| !f.is_empty()) {
                query.append_pair("fieldSelector", fields);
            }
        }
        let response = self.authorized(self.http.get(url)).send().await?;
        let list: PodList = check_status(response).await?.json().await?;
        Ok(list.items)
    }

    pub async fn delete_pod(&self, pod: &str) -> KubeResult<()> {
        let url = self.pod_url(Some(pod))?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        check_status(response).await?;
        Ok(())
    }

    fn pod_url(&self, pod: Option<&str>) -> KubeResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments
                .pop_if_empty()
                .extend(["api", "v1", "namespaces", self.namespace.as_str(), "pods"]);
            if let Some(pod) = pod {
                segments.push(pod);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }
}

async fn check_status(response: Response) -> KubeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(KubeError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Configured URL, else `KUBERNETES_SERVICE_HOST`/`_PORT`, else none.
fn resolve_api_url<F>(config: &KubernetesConfig, env: F) -> KubeResult<Option<Url>>
where
    F: Fn(&str) -> Option<String>,
{
    if !config.api_url.is_empty() {
        return Ok(Some(Url::parse(&config.api_url)?));
    }
    let Some(host) = env("KUBERNETES_SERVICE_HOST").filter(|h| !h.is_empty()) else {
        return Ok(None);
    };
    let port = env("KUBERNETES_SERVICE_PORT").unwrap_or_else(|| "443".to_string());
    let host = if host.contains(':') {
        format!("[{}]", host)
    } else {
        host
    };
    Ok(Some(Url::parse(&format!("https://{}:{}", host, port))?))
}

fn read_optional(path: &str) -> KubeResult<Option<Vec<u8>>> {
    if path.is_empty() {
        return Ok(None);
    }
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(KubeError::Credentials {
            path: path.to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> KubeClient {
        KubeClient::new(
            Url::parse(base).unwrap(),
            "prod",
            None,
            None,
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn pod_urls_are_namespaced() {
        let c = client("https://10.0.0.1:443/");
        assert_eq!(
            c.pod_url(None).unwrap().as_str(),
            "https://10.0.0.1/api/v1/namespaces/prod/pods"
        );
        assert_eq!(
            c.pod_url(Some("app-0")).unwrap().as_str(),
            "https://10.0.0.1/api/v1/namespaces/prod/pods/app-0"
        );
    }

    #[test]
    fn api_url_from_service_environment() {
        let config = KubernetesConfig::default();
        let url = resolve_api_url(&config, |key| match key {
            "KUBERNETES_SERVICE_HOST" => Some("10.96.0.1".into()),
            "KUBERNETES_SERVICE_PORT" => Some("6443".into()),
            _ => None,
        })
        .unwrap()
        .unwrap();
        assert_eq!(url.as_str(), "https://10.96.0.1:6443/");
    }

    #[test]
    fn no_api_outside_cluster() {
        let config = KubernetesConfig::default();
        assert!(resolve_api_url(&config, |_| None).unwrap().is_none());
    }

    #[test]
    fn configured_url_wins() {
        let config = KubernetesConfig {
            api_url: "http://127.0.0.1:8001".into(),
            ..KubernetesConfig::default()
        };
        let url = resolve_api_url(&config, |_| Some("10.96.0.1".into()))
            .unwrap()
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8001/");
    }

    #[test]
    fn disabled_config_yields_no_client() {
        let config = KubernetesConfig {
            enabled: false,
            api_url: "http://127.0.0.1:8001".into(),
            ..KubernetesConfig::default()
        };
        assert!(KubeClient::from_config(&config).unwrap().is_none());
    }
}
