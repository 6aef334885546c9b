//! Approval workflow
//!
//! A DML request moves through a manager sign-off, then a production-support
//! sign-off, then exactly one execution attempt:
//!
//! ```text
//! PendingManagerApproval ──reject──▶ RejectedByManager
//!        │ approve
//!        ▼
//! PendingSupportApproval ──reject──▶ RejectedBySupport
//!        │ approve
//!        ▼
//!    Approved ──execute──▶ Executed | ExecutionFailed
//! ```

pub mod engine;
mod request;
mod status;

pub use engine::{ExecutionReport, WorkflowEngine};
pub use request::{DmlRequest, NewDmlRequest, EXECUTION_SUCCESS};
pub use status::RequestStatus;
