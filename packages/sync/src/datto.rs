//! Datto RMM REST client
//!
//! Authentication is an OAuth password grant against the public client;
//! list endpoints page through `pageDetails.nextPageUrl`.

use crate::error::SyncError;
use crate::http::ApiClient;
use crate::settings::SyncSettings;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

const SERVICE: &str = "datto";

/// `public-client:public`, the fixed OAuth client of the Datto RMM API
const PUBLIC_CLIENT_AUTH: &str = "Basic cHVibGljLWNsaWVudDpwdWJsaWM=";

/// Site variable carrying the company account number
pub const ACCOUNT_NUMBER_VARIABLE: &str = "AccountNumber";

#[derive(Debug, Clone, Deserialize)]
pub struct Site {
    pub uid: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceType {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub uid: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub device_type: Option<DeviceType>,
    #[serde(default)]
    pub int_ip_address: Option<String>,
    #[serde(default)]
    pub ext_ip_address: Option<String>,
    #[serde(default)]
    pub last_logged_in_user: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
    /// Epoch milliseconds
    #[serde(default)]
    pub last_seen: Option<Value>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageDetails {
    #[serde(default)]
    next_page_url: Option<String>,
}

/// Datto list responses name their item array after the resource
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    items: Option<Vec<T>>,
    sites: Option<Vec<T>>,
    devices: Option<Vec<T>>,
    #[serde(default)]
    page_details: Option<PageDetails>,
    #[serde(default)]
    next_page_url: Option<String>,
}

#[derive(Deserialize)]
struct SiteVariable {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Deserialize)]
struct SiteVariables {
    #[serde(default)]
    variables: Vec<SiteVariable>,
}

#[derive(Debug, Clone)]
pub struct DattoClient {
    api: ApiClient,
    endpoint: String,
    api_key: String,
    api_secret: String,
}

impl DattoClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        api_secret: &str,
        settings: &SyncSettings,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            api: ApiClient::new(SERVICE, settings.request_timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        })
    }

    pub fn from_settings(settings: &SyncSettings) -> Result<Self, SyncError> {
        match (
            &settings.datto_api_endpoint,
            &settings.datto_api_key,
            &settings.datto_api_secret,
        ) {
            (Some(endpoint), Some(key), Some(secret)) => Self::new(endpoint, key, secret, settings),
            _ => Err(SyncError::missing_config(
                "DATTO_API_ENDPOINT, DATTO_API_KEY and DATTO_API_SECRET",
            )),
        }
    }

    /// Exchange the API key and secret for a bearer token
    pub async fn access_token(&self) -> Result<String, SyncError> {
        let url = format!("{}/auth/oauth/token", self.endpoint);
        let form = [
            ("grant_type", "password"),
            ("username", self.api_key.as_str()),
            ("password", self.api_secret.as_str()),
        ];
        let token: TokenResponse = self
            .api
            .json(|client| {
                client
                    .post(&url)
                    .header(AUTHORIZATION, PUBLIC_CLIENT_AUTH)
                    .form(&form)
            })
            .await?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::decode(SERVICE, "token response without access_token"))
    }

    /// Follow `nextPageUrl` from `/api{path}` until it runs out
    async fn paginated<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
    ) -> Result<Vec<T>, SyncError> {
        let mut all = Vec::new();
        let mut next = Some(format!("{}/api{}", self.endpoint, path));

        while let Some(url) = next.take() {
            let page: Page<T> = self
                .api
                .json(|client| client.get(&url).bearer_auth(token))
                .await?;

            let Some(batch) = page.items.or(page.sites).or(page.devices) else {
                break;
            };
            all.extend(batch);
            next = page
                .page_details
                .and_then(|d| d.next_page_url)
                .or(page.next_page_url)
                .filter(|u| !u.is_empty());
        }

        Ok(all)
    }

    pub async fn list_sites(&self, token: &str) -> Result<Vec<Site>, SyncError> {
        let sites = self.paginated(token, "/v2/account/sites").await?;
        tracing::info!(count = sites.len(), "fetched Datto sites");
        Ok(sites)
    }

    pub async fn list_devices(
        &self,
        token: &str,
        site_uid: &str,
    ) -> Result<Vec<Device>, SyncError> {
        self.paginated(token, &format!("/v2/site/{}/devices", site_uid))
            .await
    }

    /// Value of a site variable; `None` if unset or the site has none
    pub async fn site_variable(
        &self,
        token: &str,
        site_uid: &str,
        name: &str,
    ) -> Result<Option<String>, SyncError> {
        let url = format!("{}/api/v2/site/{}/variables", self.endpoint, site_uid);
        let response = self
            .api
            .execute(|client| client.get(&url).bearer_auth(token))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let variables: SiteVariables = self.api.decode(response).await?;
        Ok(variables
            .variables
            .into_iter()
            .find(|v| v.name.as_deref() == Some(name))
            .and_then(|v| match v.value? {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|v| !v.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    async fn client(server: &Server) -> DattoClient {
        DattoClient::new(&server.url(), "key", "secret", &SyncSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_access_token_password_grant() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/oauth/token")
            .match_header("authorization", PUBLIC_CLIENT_AUTH)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "password".into()),
                Matcher::UrlEncoded("username".into(), "key".into()),
                Matcher::UrlEncoded("password".into(), "secret".into()),
            ]))
            .with_body(r#"{"access_token": "tok"}"#)
            .create_async()
            .await;

        assert_eq!(client(&server).await.access_token().await.unwrap(), "tok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sites_follow_next_page_url() {
        let mut server = Server::new_async().await;
        let next = format!("{}/api/v2/account/sites/page-2", server.url());
        server
            .mock("GET", "/api/v2/account/sites")
            .match_header("authorization", "Bearer tok")
            .with_body(
                serde_json::json!({
                    "sites": [{"uid": "s1", "name": "Acme HQ"}],
                    "pageDetails": {"nextPageUrl": next}
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/v2/account/sites/page-2")
            .with_body(r#"{"sites": [{"uid": "s2"}], "pageDetails": {"nextPageUrl": null}}"#)
            .create_async()
            .await;

        let sites = client(&server).await.list_sites("tok").await.unwrap();
        let uids: Vec<&str> = sites.iter().map(|s| s.uid.as_str()).collect();
        assert_eq!(uids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_device_page_without_page_details() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v2/site/s1/devices")
            .with_body(r#"{"devices": [{"uid": "d1", "hostname": "ACME-LT1"}, {"uid": "d2"}]}"#)
            .create_async()
            .await;

        let devices = client(&server).await.list_devices("tok", "s1").await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].hostname.as_deref(), Some("ACME-LT1"));
        assert_eq!(devices[1].hostname, None);
    }

    #[tokio::test]
    async fn test_site_variable_lookup() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v2/site/s1/variables")
            .with_body(r#"{"variables": [{"name": "Other", "value": "x"}, {"name": "AccountNumber", "value": "4711"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v2/site/s2/variables")
            .with_status(404)
            .create_async()
            .await;

        let datto = client(&server).await;
        assert_eq!(
            datto.site_variable("tok", "s1", ACCOUNT_NUMBER_VARIABLE).await.unwrap().as_deref(),
            Some("4711")
        );
        assert_eq!(
            datto.site_variable("tok", "s2", ACCOUNT_NUMBER_VARIABLE).await.unwrap(),
            None
        );
    }
}
