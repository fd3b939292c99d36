//! bankfeed-sync: submits transaction batches to the budgeting service and
//! drives whole import runs (parse → map → submit → dispose, one file at a time).

pub mod envelope;
pub mod http;
pub mod import;
pub mod submitter;

pub use envelope::{encode_batch, to_milliunits};
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};
pub use import::{prepare_batch, FileOutcome, FileReport, Importer, PreparedBatch, RunReport};
pub use submitter::{BatchSubmitter, Confirmation};
