use crate::error::BillingError;
use crate::models::{Project, WorkItem, WorkItemQuery, WorkItemStatus, WorkItemView};
use crate::services::repository::Repository;
use crate::services::store::{Filter, FindOptions, SortOrder, Update};
use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;
use std::collections::HashMap;

/// Work items that may be billed: requested, owned, in one of the invoiced
/// projects and not yet on any invoice. One predicate, evaluated by the store.
pub fn billable(user_id: &str, work_item_ids: &[String], project_ids: &[String]) -> Filter {
    Filter::and(vec![
        Filter::is_in("_id", work_item_ids.iter().cloned()),
        Filter::eq("user_id", user_id),
        Filter::is_in("project_id", project_ids.iter().cloned()),
        Filter::is_null("invoice_id"),
    ])
}

/// Bulk mark-billed predicate. The null check makes a concurrent claim show
/// up as a short modified count instead of an overwrite.
pub fn claimable(user_id: &str, work_item_ids: &[String]) -> Filter {
    Filter::and(vec![
        Filter::is_in("_id", work_item_ids.iter().cloned()),
        Filter::eq("user_id", user_id),
        Filter::is_null("invoice_id"),
    ])
}

pub fn mark_billed(invoice_id: &str, now: DateTime<Utc>) -> Update {
    Update::set("invoice_id", invoice_id)
        .and_set("status", WorkItemStatus::Processed.as_str())
        .and_set("updated_at", BsonDateTime::from_chrono(now))
}

pub fn listing(user_id: &str, query: &WorkItemQuery) -> Filter {
    let mut filter = Filter::and(vec![Filter::eq("user_id", user_id)]);
    if let Some(project_id) = &query.project_id {
        filter = filter.with(Filter::eq("project_id", project_id.as_str()));
    }
    match query.billed {
        Some(true) => filter = filter.with(Filter::not_null("invoice_id")),
        Some(false) => filter = filter.with(Filter::is_null("invoice_id")),
        None => {}
    }
    filter
}

/// Newest work items first, each joined with its project. A work item whose
/// project is gone is kept with empty project fields.
pub async fn list_with_projects(
    work_items: &Repository<WorkItem>,
    projects: &Repository<Project>,
    user_id: &str,
    query: &WorkItemQuery,
) -> Result<Vec<WorkItemView>, BillingError> {
    let options =
        FindOptions::sorted("created_at", SortOrder::Descending).page(query.skip, query.limit);
    let items = work_items.find(&listing(user_id, query), &options).await?;

    let mut project_ids: Vec<String> = items.iter().map(|w| w.project_id.clone()).collect();
    project_ids.sort();
    project_ids.dedup();

    let by_id: HashMap<String, Project> = if project_ids.is_empty() {
        HashMap::new()
    } else {
        projects
            .find(
                &Filter::and(vec![
                    Filter::is_in("_id", project_ids),
                    Filter::eq("user_id", user_id),
                ]),
                &FindOptions::default(),
            )
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect()
    };

    Ok(items
        .into_iter()
        .map(|work_item| {
            let project = by_id.get(&work_item.project_id);
            WorkItemView {
                project_name: project.map(|p| p.name.clone()),
                client_id: project.map(|p| p.client_id.clone()),
                work_item,
            }
        })
        .collect())
}
