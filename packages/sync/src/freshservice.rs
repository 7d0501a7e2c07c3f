//! Freshservice REST client
//!
//! Basic auth with `{api_key}:X`. Departments stand for client companies
//! (the account number lives in a custom field) and requesters for their
//! staff.

use crate::error::SyncError;
use crate::http::ApiClient;
use crate::settings::SyncSettings;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

const SERVICE: &str = "freshservice";
pub const PAGE_SIZE: usize = 100;

/// Custom field on a department holding the company account number
pub const ACCOUNT_NUMBER_FIELD: &str = "account_number";

#[derive(Debug, Clone, Deserialize)]
pub struct Department {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub custom_fields: Option<serde_json::Map<String, Value>>,
}

impl Department {
    /// Account number from the custom field, numbers and strings alike
    pub fn account_number(&self) -> Option<String> {
        let raw = self.custom_fields.as_ref()?.get(ACCOUNT_NUMBER_FIELD)?;
        let text = match raw {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Requester {
    pub id: u64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub primary_email: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub department_ids: Option<Vec<u64>>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub work_phone_number: Option<String>,
    #[serde(default)]
    pub mobile_phone_number: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl Requester {
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketSummary {
    pub id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ticket {
    pub id: u64,
    #[serde(default)]
    pub subject: Option<String>,
    /// HTML body
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub requester_id: Option<u64>,
    #[serde(default)]
    pub responder: Option<NamedRef>,
    #[serde(default)]
    pub group: Option<NamedRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Conversation {
    /// HTML body
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user: Option<NamedRef>,
}

#[derive(Deserialize)]
struct DepartmentsPage {
    #[serde(default)]
    departments: Vec<Department>,
}

#[derive(Deserialize)]
struct RequestersPage {
    #[serde(default)]
    requesters: Vec<Requester>,
}

#[derive(Deserialize)]
struct TicketsPage {
    #[serde(default)]
    tickets: Vec<TicketSummary>,
}

#[derive(Deserialize)]
struct TicketEnvelope {
    ticket: Ticket,
}

#[derive(Deserialize)]
struct ConversationsPage {
    #[serde(default)]
    conversations: Vec<Conversation>,
}

/// Sort direction for ticket listings (by `created_at`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOrder {
    NewestFirst,
    OldestFirst,
}

impl TicketOrder {
    fn as_query(self) -> &'static str {
        match self {
            Self::NewestFirst => "desc",
            Self::OldestFirst => "asc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FreshserviceClient {
    api: ApiClient,
    base_url: String,
    api_key: String,
}

impl FreshserviceClient {
    /// `domain` is a bare host (`acme.freshservice.com`) or a full base URL
    pub fn new(domain: &str, api_key: &str, settings: &SyncSettings) -> Result<Self, SyncError> {
        let domain = domain.trim_end_matches('/');
        let base_url = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        };
        Ok(Self {
            api: ApiClient::new(SERVICE, settings.request_timeout)?,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn from_settings(settings: &SyncSettings) -> Result<Self, SyncError> {
        match (&settings.freshservice_domain, &settings.freshservice_api_key) {
            (Some(domain), Some(key)) => Self::new(domain, key, settings),
            _ => Err(SyncError::missing_config(
                "FRESHSERVICE_DOMAIN and FRESHSERVICE_API_KEY",
            )),
        }
    }

    fn request(&self, client: &Client, path: &str) -> RequestBuilder {
        client
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.api_key, Some("X"))
            .header(CONTENT_TYPE, "application/json")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        self.api.json(|client| self.request(client, path)).await
    }

    /// Fetch `page=1..` until an empty page
    async fn all_pages<P, T>(&self, path: &str, items: fn(P) -> Vec<T>) -> Result<Vec<T>, SyncError>
    where
        P: DeserializeOwned,
    {
        let mut all = Vec::new();
        for page in 1.. {
            let batch = items(
                self.get::<P>(&format!("{}?page={}&per_page={}", path, page, PAGE_SIZE))
                    .await?,
            );
            if batch.is_empty() {
                break;
            }
            all.extend(batch);
        }
        Ok(all)
    }

    pub async fn list_departments(&self) -> Result<Vec<Department>, SyncError> {
        let departments = self
            .all_pages("/api/v2/departments", |p: DepartmentsPage| p.departments)
            .await?;
        tracing::info!(count = departments.len(), "fetched Freshservice departments");
        Ok(departments)
    }

    pub async fn list_requesters(&self) -> Result<Vec<Requester>, SyncError> {
        let requesters = self
            .all_pages("/api/v2/requesters", |p: RequestersPage| p.requesters)
            .await?;
        tracing::info!(count = requesters.len(), "fetched Freshservice requesters");
        Ok(requesters)
    }

    /// One page of ticket ids
    pub async fn list_tickets(
        &self,
        page: u32,
        order: TicketOrder,
    ) -> Result<Vec<TicketSummary>, SyncError> {
        let path = format!(
            "/api/v2/tickets?page={}&per_page={}&order_by=created_at&order_type={}",
            page,
            PAGE_SIZE,
            order.as_query()
        );
        Ok(self.get::<TicketsPage>(&path).await?.tickets)
    }

    pub async fn get_ticket(&self, id: u64) -> Result<Ticket, SyncError> {
        Ok(self
            .get::<TicketEnvelope>(&format!("/api/v2/tickets/{}", id))
            .await?
            .ticket)
    }

    pub async fn get_conversations(&self, ticket_id: u64) -> Result<Vec<Conversation>, SyncError> {
        Ok(self
            .get::<ConversationsPage>(&format!("/api/v2/tickets/{}/conversations", ticket_id))
            .await?
            .conversations)
    }
}
