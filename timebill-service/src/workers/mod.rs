mod pdf_worker;

pub use pdf_worker::{PdfJob, PdfQueue, PdfWorker};
