//! Domain types shared across the review platform.
//!
//! Everything that crosses a crate boundary lives here: scan requests,
//! static findings, and the report DTOs returned to callers.

mod finding;
mod report;
mod request;

pub use finding::{Finding, Severity};
pub use report::{
    DiagramData, LlmReview, ReportDetail, ScanInfo, ScanMetadata, ScanStatus, ScanSummary,
    REPORT_VERSION,
};
pub use request::{RequestError, ScanRequest, ScanType};
