//! Services module for timebill-service.

pub mod database;
pub mod email;
pub mod memory;
pub mod metrics;
pub mod queries;
pub mod renderer;
pub mod repository;
pub mod store;

pub use database::MongoDb;
pub use email::{EmailComposer, TemplateEmailComposer};
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use renderer::{HttpPdfRenderer, MockPdfRenderer, PdfRenderer};
pub use repository::{Entity, Repository};
pub use store::{DocumentStore, Filter, FindOptions, SortOrder, Update};
