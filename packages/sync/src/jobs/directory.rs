//! Directory sync: Freshservice departments and requesters become company
//! and user folders under "Companies".

use super::{
    company_id, contact_id, merge_counted, user_id, users_folder_id, SyncReport,
    COMPANIES_ROOT_ID, REQUESTER_ID_PROPERTY, USER_EMAIL_PROPERTY,
};
use crate::error::SyncError;
use crate::freshservice::{Department, FreshserviceClient, Requester};
use crate::jobs::templates::contact_markdown;
use knowledgetree_core::models::ROOT_ID;
use knowledgetree_core::services::NodeService;
use knowledgetree_core::Node;
use std::collections::HashMap;

pub const COMPANIES_FOLDER_NAME: &str = "Companies";
pub const USERS_FOLDER_NAME: &str = "Users";
pub const CONTACT_ARTICLE_NAME: &str = "Contact.md";

pub async fn run(
    nodes: &NodeService,
    client: &FreshserviceClient,
) -> Result<SyncReport, SyncError> {
    let departments = client.list_departments().await?;
    let requesters = client.list_requesters().await?;
    sync_directory(nodes, &departments, &requesters).await
}

/// Merge already-fetched departments and requesters into the tree
pub async fn sync_directory(
    nodes: &NodeService,
    departments: &[Department],
    requesters: &[Requester],
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    // Without the companies folder nothing below can be placed
    let companies = Node::new_with_id(
        COMPANIES_ROOT_ID,
        Some(ROOT_ID.to_string()),
        COMPANIES_FOLDER_NAME,
        true,
        false,
    )
    .with_read_only(true);
    report.record(&nodes.merge(companies).await?);

    let mut accounts: HashMap<u64, String> = HashMap::new();
    for department in departments {
        let (Some(name), Some(account)) = (
            department.name.as_deref().filter(|n| !n.trim().is_empty()),
            department.account_number(),
        ) else {
            tracing::debug!(department_id = department.id, "department without name or account number");
            continue;
        };

        let company = Node::new_with_id(
            company_id(&account),
            Some(COMPANIES_ROOT_ID.to_string()),
            name.trim(),
            true,
            false,
        )
        .with_read_only(true);
        if merge_counted(nodes, company, &mut report).await?.is_none() {
            continue;
        }

        let users = Node::new_with_id(
            users_folder_id(&account),
            Some(company_id(&account)),
            USERS_FOLDER_NAME,
            true,
            false,
        )
        .with_read_only(true);
        if merge_counted(nodes, users, &mut report).await?.is_some() {
            accounts.insert(department.id, account);
        }
    }

    for requester in requesters {
        if !requester.active {
            continue;
        }
        let name = requester.full_name();
        let email = requester
            .primary_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let account = requester
            .department_ids
            .iter()
            .flatten()
            .find_map(|id| accounts.get(id));

        let (Some(email), Some(account)) = (email, account) else {
            report.skipped += 1;
            continue;
        };
        if name.is_empty() {
            report.skipped += 1;
            continue;
        }

        let folder = Node::new_with_id(
            user_id(email),
            Some(users_folder_id(account)),
            name.as_str(),
            true,
            false,
        )
        .with_read_only(true)
        .with_property(USER_EMAIL_PROPERTY, email)
        .with_property(REQUESTER_ID_PROPERTY, requester.id.to_string());
        let Some(folder) = merge_counted(nodes, folder, &mut report).await? else {
            continue;
        };

        let contact = Node::new_with_id(
            contact_id(email),
            Some(folder.id.clone()),
            CONTACT_ARTICLE_NAME,
            false,
            false,
        )
        .with_content(contact_markdown(requester, &name, email))
        .with_read_only(true)
        .with_property(USER_EMAIL_PROPERTY, email);
        merge_counted(nodes, contact, &mut report).await?;
    }

    tracing::info!(
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        "directory sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledgetree_core::MemoryStore;
    use std::sync::Arc;

    async fn service() -> NodeService {
        let nodes = NodeService::new(Arc::new(MemoryStore::new()));
        nodes.ensure_root().await.unwrap();
        nodes
    }

    fn department(id: u64, name: &str, account: &str) -> Department {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "custom_fields": {"account_number": account}
        }))
        .unwrap()
    }

    fn requester(
        id: u64,
        first: &str,
        last: &str,
        email: &str,
        departments: Vec<u64>,
    ) -> Requester {
        Requester {
            id,
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            primary_email: Some(email.to_string()),
            active: true,
            department_ids: Some(departments),
            ..Requester::default()
        }
    }

    #[tokio::test]
    async fn test_builds_company_and_user_folders() {
        let nodes = service().await;
        let departments = vec![department(10, "Acme", "4711")];
        let requesters = vec![requester(7, "Alice", "Smith", "alice@acme.test", vec![10])];

        let report = sync_directory(&nodes, &departments, &requesters).await.unwrap();
        assert_eq!(report.created, 5);
        assert_eq!(report.skipped, 0);

        let company = nodes.get_node("company_4711").await.unwrap();
        assert_eq!(company.name, "Acme");
        assert_eq!(company.parent_id.as_deref(), Some(COMPANIES_ROOT_ID));
        assert!(company.read_only);

        let user = nodes.get_node("user_alice@acme.test").await.unwrap();
        assert_eq!(user.name, "Alice Smith");
        assert_eq!(user.parent_id.as_deref(), Some("users_for_4711"));
        assert_eq!(user.property(REQUESTER_ID_PROPERTY), Some("7"));
        assert_eq!(user.property(USER_EMAIL_PROPERTY), Some("alice@acme.test"));

        let contact = nodes.get_node("contact_for_alice@acme.test").await.unwrap();
        assert_eq!(contact.name, CONTACT_ARTICLE_NAME);
        assert!(!contact.is_folder);
        assert!(contact.content.contains("# Contact Information for Alice Smith"));
    }

    #[tokio::test]
    async fn test_second_run_updates_in_place() {
        let nodes = service().await;
        let departments = vec![department(10, "Acme", "4711")];
        let requesters = vec![requester(7, "Alice", "Smith", "alice@acme.test", vec![10])];
        sync_directory(&nodes, &departments, &requesters).await.unwrap();

        let renamed = vec![department(10, "Acme Corp", "4711")];
        let report = sync_directory(&nodes, &renamed, &requesters).await.unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 5);
        assert_eq!(nodes.get_node("company_4711").await.unwrap().name, "Acme Corp");
        assert_eq!(nodes.get_children(COMPANIES_ROOT_ID).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_skips_unmappable_requesters() {
        let nodes = service().await;
        let departments = vec![
            department(10, "Acme", "4711"),
            serde_json::from_value(serde_json::json!({"id": 11, "name": "No Account"})).unwrap(),
        ];
        let mut inactive = requester(1, "Ina", "Active", "ina@acme.test", vec![10]);
        inactive.active = false;
        let requesters = vec![
            inactive,
            requester(2, "Nora", "Dept", "nora@acme.test", vec![11]),
            requester(3, "Ed", "Mail", "", vec![10]),
            requester(4, "Bob", "Jones", "bob@acme.test", vec![11, 10]),
        ];

        let report = sync_directory(&nodes, &departments, &requesters).await.unwrap();

        assert_eq!(report.skipped, 2);
        assert!(nodes.get_node("user_ina@acme.test").await.is_err());
        assert!(nodes.get_node("user_nora@acme.test").await.is_err());
        let bob = nodes.get_node("user_bob@acme.test").await.unwrap();
        assert_eq!(bob.parent_id.as_deref(), Some("users_for_4711"));
    }

    #[tokio::test]
    async fn test_duplicate_user_names_skip_the_second() {
        let nodes = service().await;
        let departments = vec![department(10, "Acme", "4711")];
        let requesters = vec![
            requester(1, "Sam", "Lee", "sam1@acme.test", vec![10]),
            requester(2, "Sam", "Lee", "sam2@acme.test", vec![10]),
        ];

        let report = sync_directory(&nodes, &departments, &requesters).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(nodes.get_node("user_sam1@acme.test").await.is_ok());
        assert!(nodes.get_node("user_sam2@acme.test").await.is_err());
    }
}
