//! Ticket sync: each Freshservice ticket becomes an article in the
//! requester's attached "Tickets" folder.
//!
//! Incremental runs only fetch tickets newer than the highest `ticket_{id}`
//! already in the tree, and stop at the first ticket that cannot be fetched
//! so the next run picks it up again. Overwrite runs re-fetch every ticket
//! from the configured start id and skip the ones that fail.

use super::{
    merge_counted, ticket_id, tickets_folder_id, SyncReport, REQUESTER_ID_PROPERTY,
    USER_EMAIL_PROPERTY,
};
use crate::error::SyncError;
use crate::freshservice::{FreshserviceClient, TicketOrder, PAGE_SIZE};
use crate::jobs::templates::{ticket_filename, ticket_markdown};
use knowledgetree_core::services::NodeService;
use knowledgetree_core::Node;

pub const TICKET_ID_PREFIX: &str = "ticket_";
pub const TICKETS_FOLDER_NAME: &str = "Tickets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TicketMode {
    #[default]
    Incremental,
    Overwrite,
}

/// Highest ticket number already synced, or `start_id - 1`
pub async fn high_water_mark(nodes: &NodeService, start_id: u64) -> Result<u64, SyncError> {
    let ids = nodes.ids_with_prefix(TICKET_ID_PREFIX).await?;

    let highest = ids
        .iter()
        .filter_map(|id| id.strip_prefix(TICKET_ID_PREFIX)?.parse::<u64>().ok())
        .max();
    Ok(highest.unwrap_or_else(|| start_id.saturating_sub(1)))
}

/// Ticket ids to process, ascending
pub async fn pending_ticket_ids(
    client: &FreshserviceClient,
    nodes: &NodeService,
    start_id: u64,
    mode: TicketMode,
) -> Result<Vec<u64>, SyncError> {
    let mut ids = Vec::new();
    match mode {
        TicketMode::Incremental => {
            let mark = high_water_mark(nodes, start_id).await?;
            tracing::debug!(mark, "collecting tickets newer than the high-water mark");
            'pages: for page in 1.. {
                let batch = client.list_tickets(page, TicketOrder::NewestFirst).await?;
                if batch.is_empty() {
                    break;
                }
                for ticket in batch {
                    if ticket.id <= mark {
                        break 'pages;
                    }
                    ids.push(ticket.id);
                }
            }
        }
        TicketMode::Overwrite => {
            for page in 1.. {
                let batch = client.list_tickets(page, TicketOrder::OldestFirst).await?;
                let full_page = batch.len() >= PAGE_SIZE;
                ids.extend(batch.into_iter().map(|t| t.id).filter(|id| *id >= start_id));
                if !full_page {
                    break;
                }
            }
        }
    }

    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

pub async fn run(
    nodes: &NodeService,
    client: &FreshserviceClient,
    start_id: u64,
    mode: TicketMode,
) -> Result<SyncReport, SyncError> {
    let ids = pending_ticket_ids(client, nodes, start_id, mode).await?;
    tracing::info!(count = ids.len(), ?mode, "tickets to sync");

    let mut report = SyncReport::default();
    for id in ids {
        sync_ticket(nodes, client, id, mode, &mut report).await?;
    }

    tracing::info!(
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        "ticket sync finished"
    );
    Ok(report)
}

async fn sync_ticket(
    nodes: &NodeService,
    client: &FreshserviceClient,
    id: u64,
    mode: TicketMode,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    // Incremental runs abort so the high-water mark stays below this ticket
    let ticket = match client.get_ticket(id).await {
        Ok(ticket) => ticket,
        Err(err @ (SyncError::UpstreamUnavailable { .. } | SyncError::Decode { .. }))
            if mode == TicketMode::Overwrite =>
        {
            tracing::warn!(ticket_id = id, error = %err, "could not fetch ticket, skipping");
            report.skipped += 1;
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let Some(requester_id) = ticket.requester_id else {
        tracing::debug!(ticket_id = id, "ticket without requester");
        report.skipped += 1;
        return Ok(());
    };

    let users = nodes
        .find_by_property(REQUESTER_ID_PROPERTY, &requester_id.to_string())
        .await?;
    let Some((user, email)) = users.iter().find_map(|u| {
        let email = u.property(USER_EMAIL_PROPERTY)?;
        u.is_folder.then(|| (u, email.to_string()))
    }) else {
        tracing::debug!(ticket_id = id, requester_id, "requester not in the tree");
        report.skipped += 1;
        return Ok(());
    };

    let conversations = client.get_conversations(id).await?;

    let folder = Node::new_with_id(
        tickets_folder_id(&email),
        Some(user.id.clone()),
        TICKETS_FOLDER_NAME,
        true,
        true,
    )
    .with_read_only(true)
    .with_property(USER_EMAIL_PROPERTY, email.as_str());
    let Some(folder) = merge_counted(nodes, folder, report).await? else {
        return Ok(());
    };

    let article = Node::new_with_id(
        ticket_id(id),
        Some(folder.id.clone()),
        ticket_filename(&ticket),
        false,
        false,
    )
    .with_content(ticket_markdown(&ticket, &conversations))
    .with_read_only(true);
    merge_counted(nodes, article, report).await?;
    Ok(())
}
