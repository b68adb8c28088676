//! Clients, projects and work items: the records invoices are built from.

mod clients;
mod projects;
mod work_items;

use crate::billing::EventLog;
use crate::models::{Client, Event, Project, WorkItem};
use crate::services::repository::Repository;
use crate::services::store::DocumentStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct Catalog {
    clients: Repository<Client>,
    projects: Repository<Project>,
    work_items: Repository<WorkItem>,
    events: EventLog,
}

impl Catalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            clients: Repository::new(store.clone()),
            projects: Repository::new(store.clone()),
            work_items: Repository::new(store.clone()),
            events: EventLog::new(Repository::<Event>::new(store)),
        }
    }
}
