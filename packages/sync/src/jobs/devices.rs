//! Device sync: Datto RMM devices are matched to users of the site's company
//! and written as computer articles into the user's folder.

use super::{device_id, merge_counted, users_folder_id, SyncReport};
use crate::datto::{DattoClient, Device, ACCOUNT_NUMBER_VARIABLE};
use crate::error::SyncError;
use crate::jobs::templates::{device_markdown, sanitize_filename};
use knowledgetree_core::services::NodeService;
use knowledgetree_core::Node;

/// Property linking a computer article to its Datto device
pub const DEVICE_UID_PROPERTY: &str = "datto_uid";

const UNKNOWN_HOSTNAME: &str = "Unknown Device";

pub async fn run(nodes: &NodeService, client: &DattoClient) -> Result<SyncReport, SyncError> {
    let token = client.access_token().await?;
    let sites = client.list_sites(&token).await?;

    let mut report = SyncReport::default();
    for site in sites {
        let Some(account) = client
            .site_variable(&token, &site.uid, ACCOUNT_NUMBER_VARIABLE)
            .await?
        else {
            tracing::debug!(site_uid = %site.uid, "site has no account number");
            continue;
        };

        let users = match nodes.get_children(&users_folder_id(&account)).await {
            Ok(children) => children.into_iter().filter(|n| n.is_folder).collect::<Vec<_>>(),
            Err(err) if err.is_not_found() => {
                tracing::warn!(site_uid = %site.uid, account = %account, "no company for site account number");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let devices = client.list_devices(&token, &site.uid).await?;
        tracing::debug!(site = ?site.name, devices = devices.len(), "processing Datto site");
        sync_site_devices(nodes, &users, &devices, &mut report).await?;
    }

    tracing::info!(
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        "device sync finished"
    );
    Ok(report)
}

/// Merge the devices of one site, given the company's user folders
pub async fn sync_site_devices(
    nodes: &NodeService,
    users: &[Node],
    devices: &[Device],
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    for device in devices {
        let hostname = device
            .hostname
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(UNKNOWN_HOSTNAME);
        let description = device.description.as_deref().unwrap_or_default();

        let Some(user) = match_user(users, hostname, description) else {
            tracing::debug!(device_uid = %device.uid, hostname, "no user matches device");
            report.skipped += 1;
            continue;
        };

        let article = Node::new_with_id(
            device_id(&device.uid),
            Some(user.id.clone()),
            format!("{}.md", sanitize_filename(hostname)),
            false,
            false,
        )
        .with_content(device_markdown(device))
        .with_read_only(true)
        .with_property(DEVICE_UID_PROPERTY, device.uid.as_str());
        merge_counted(nodes, article, report).await?;
    }
    Ok(())
}

fn first_name(user: &Node) -> Option<String> {
    user.name.split_whitespace().next().map(str::to_lowercase)
}

/// Pick the user a device belongs to
///
/// Tried in order, case-insensitively: the user's full name appears in the
/// description; a first name shared by no other user appears in the
/// description; such a first name appears in the hostname.
pub fn match_user<'a>(users: &'a [Node], hostname: &str, description: &str) -> Option<&'a Node> {
    let hostname = hostname.to_lowercase();
    let description = description.to_lowercase();

    let named: Vec<&Node> = users.iter().filter(|u| !u.name.trim().is_empty()).collect();

    if let Some(user) = named
        .iter()
        .copied()
        .find(|u| description.contains(&u.name.trim().to_lowercase()))
    {
        return Some(user);
    }

    let first_names: Vec<Option<String>> = named.iter().map(|u| first_name(u)).collect();
    let unique = |name: &String| first_names.iter().flatten().filter(|n| *n == name).count() == 1;

    for haystack in [&description, &hostname] {
        let hit = named.iter().zip(&first_names).find_map(|(user, first)| {
            let first = first.as_ref()?;
            (unique(first) && haystack.contains(first.as_str())).then_some(*user)
        });
        if hit.is_some() {
            return hit;
        }
    }
    None
}
