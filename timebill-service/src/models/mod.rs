//! Domain models for timebill-service.

mod client;
mod event;
mod invoice;
mod line_item;
mod project;
mod work_item;

pub use client::{Client, ClientInfo, ClientUpdate, NewClient};
pub use event::{Event, EventQuery, EventType};
pub use invoice::{
    CreateInvoiceRequest, EmailContent, EmailTemplateRequest, Invoice, InvoiceQuery,
    InvoiceStatus,
};
pub use line_item::InvoiceLineItem;
pub use project::{NewProject, Project, ProjectStatus, Rate};
pub use work_item::{
    NewTimeEntry, NewWorkItem, TimeEntry, WorkItem, WorkItemQuery, WorkItemStatus, WorkItemView,
};
