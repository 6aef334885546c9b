//! The DML request record
//!
//! Every state change goes through a method here so the decision and
//! execution fields always agree with `status`.

use crate::error::AppError;
use crate::workflow::status::{RequestStatus, WorkflowEvent};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result text recorded for a successful execution
pub const EXECUTION_SUCCESS: &str = "Success";

/// A DML statement waiting for, or past, its sign-offs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmlRequest {
    pub request_id: Uuid,
    pub requestor: String,
    pub dml_statement: String,
    pub target_db: String,
    pub target_schema: String,
    pub status: RequestStatus,
    pub created_date: DateTime<Utc>,

    pub manager_username: Option<String>,
    pub manager_comments: Option<String>,
    pub manager_action_date: Option<DateTime<Utc>>,

    pub support_username: Option<String>,
    pub support_comments: Option<String>,
    pub support_action_date: Option<DateTime<Utc>>,

    pub execution_date: Option<DateTime<Utc>>,
    pub execution_result: Option<String>,
}

/// Submission payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDmlRequest {
    pub dml_statement: String,
    pub target_db: String,
    pub target_schema: String,
}

impl DmlRequest {
    /// Create a request in `PendingManagerApproval`
    pub fn new(requestor: impl Into<String>, submission: NewDmlRequest) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            requestor: requestor.into(),
            dml_statement: submission.dml_statement,
            target_db: submission.target_db,
            target_schema: submission.target_schema,
            status: RequestStatus::PendingManagerApproval,
            created_date: Utc::now().trunc_subsecs(6),
            manager_username: None,
            manager_comments: None,
            manager_action_date: None,
            support_username: None,
            support_comments: None,
            support_action_date: None,
            execution_date: None,
            execution_result: None,
        }
    }

    /// Record the manager's decision
    pub fn record_manager_decision(&mut self, manager: &str, approve: bool, comments: String) -> Result<(), AppError> {
        let event = if approve {
            WorkflowEvent::ManagerApproved
        } else {
            WorkflowEvent::ManagerRejected
        };
        let next = self.next_status(event)?;
        let acted_at = action_time_after(self.created_date);

        self.manager_username = Some(manager.to_string());
        self.manager_comments = Some(comments);
        self.manager_action_date = Some(acted_at);
        self.status = next;
        debug_assert!(self.is_consistent(), "request {} left inconsistent", self.request_id);
        Ok(())
    }

    /// Record the production-support decision
    pub fn record_support_decision(&mut self, support: &str, approve: bool, comments: String) -> Result<(), AppError> {
        let event = if approve {
            WorkflowEvent::SupportApproved
        } else {
            WorkflowEvent::SupportRejected
        };
        let next = self.next_status(event)?;
        let acted_at = action_time_after(self.latest_action_date());

        self.support_username = Some(support.to_string());
        self.support_comments = Some(comments);
        self.support_action_date = Some(acted_at);
        self.status = next;
        debug_assert!(self.is_consistent(), "request {} left inconsistent", self.request_id);
        Ok(())
    }

    /// Record the single execution attempt
    pub fn record_execution(&mut self, succeeded: bool, result: String) -> Result<(), AppError> {
        let event = if succeeded {
            WorkflowEvent::ExecutionSucceeded
        } else {
            WorkflowEvent::ExecutionFailed
        };
        let next = self.next_status(event)?;
        let executed_at = action_time_after(self.latest_action_date());

        self.execution_date = Some(executed_at);
        self.execution_result = Some(result);
        self.status = next;
        debug_assert!(self.is_consistent(), "request {} left inconsistent", self.request_id);
        Ok(())
    }

    /// Check that the populated fields match `status`
    pub fn is_consistent(&self) -> bool {
        use RequestStatus::*;

        let manager_done = self.manager_username.is_some()
            && self.manager_comments.is_some()
            && self.manager_action_date.is_some();
        let manager_empty = self.manager_username.is_none()
            && self.manager_comments.is_none()
            && self.manager_action_date.is_none();
        let support_done = self.support_username.is_some()
            && self.support_comments.is_some()
            && self.support_action_date.is_some();
        let support_empty = self.support_username.is_none()
            && self.support_comments.is_none()
            && self.support_action_date.is_none();
        let executed = self.execution_date.is_some() && self.execution_result.is_some();
        let not_executed = self.execution_date.is_none() && self.execution_result.is_none();

        let fields_match = match self.status {
            PendingManagerApproval => manager_empty && support_empty && not_executed,
            RejectedByManager | PendingSupportApproval => manager_done && support_empty && not_executed,
            RejectedBySupport | Approved => manager_done && support_done && not_executed,
            Executed | ExecutionFailed => manager_done && support_done && executed,
        };

        let dates = [
            Some(self.created_date),
            self.manager_action_date,
            self.support_action_date,
            self.execution_date,
        ];
        let ordered = dates
            .iter()
            .flatten()
            .zip(dates.iter().flatten().skip(1))
            .all(|(earlier, later)| earlier < later);

        fields_match && ordered
    }

    fn next_status(&self, event: WorkflowEvent) -> Result<RequestStatus, AppError> {
        self.status.transition(event).ok_or_else(|| {
            if self.status.is_terminal() {
                AppError::InvalidState(format!(
                    "Request {} is already closed as '{}'",
                    self.request_id, self.status
                ))
            } else {
                AppError::InvalidState(format!(
                    "Request {} is '{}' and cannot accept {:?}",
                    self.request_id, self.status, event
                ))
            }
        })
    }

    fn latest_action_date(&self) -> DateTime<Utc> {
        self.execution_date
            .or(self.support_action_date)
            .or(self.manager_action_date)
            .unwrap_or(self.created_date)
    }
}

/// Current time at microsecond precision (what `TIMESTAMPTZ` keeps), nudged
/// forward so it is strictly after `previous`
fn action_time_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    if now > previous {
        now
    } else {
        previous.trunc_subsecs(6) + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn submission() -> NewDmlRequest {
        NewDmlRequest {
            dml_statement: "UPDATE t SET x=1".to_string(),
            target_db: "DEV".to_string(),
            target_schema: "public".to_string(),
        }
    }

    #[test]
    fn test_new_request_is_pending_and_empty() {
        let request = DmlRequest::new("requestor1", submission());
        assert_eq!(request.status, RequestStatus::PendingManagerApproval);
        assert!(request.manager_username.is_none());
        assert!(request.support_username.is_none());
        assert!(request.execution_date.is_none());
        assert!(request.is_consistent());
    }

    #[test]
    fn test_full_chain_keeps_dates_ordered() {
        let mut request = DmlRequest::new("requestor1", submission());
        request.record_manager_decision("manager1", true, "ok".into()).unwrap();
        request.record_support_decision("support1", true, "go".into()).unwrap();
        request.record_execution(true, EXECUTION_SUCCESS.into()).unwrap();

        assert_eq!(request.status, RequestStatus::Executed);
        let manager = request.manager_action_date.unwrap();
        let support = request.support_action_date.unwrap();
        let executed = request.execution_date.unwrap();
        assert!(request.created_date < manager);
        assert!(manager < support);
        assert!(support < executed);
        assert!(request.is_consistent());
    }

    #[test]
    fn test_dates_forced_forward_when_clock_lags() {
        let mut request = DmlRequest::new("requestor1", submission());
        request.created_date = Utc::now() + Duration::hours(1);

        request.record_manager_decision("manager1", false, String::new()).unwrap();
        assert!(request.manager_action_date.unwrap() > request.created_date);
    }

    #[test]
    fn test_action_times_fit_microsecond_storage() {
        use chrono::Timelike;

        // 500ns past a microsecond boundary, ahead of the wall clock
        let previous = (Utc::now() + Duration::hours(1)).trunc_subsecs(6) + Duration::nanoseconds(500);
        let next = action_time_after(previous);
        assert!(next > previous);
        assert_eq!(next.nanosecond() % 1_000, 0);
        assert_eq!(next - previous.trunc_subsecs(6), Duration::microseconds(1));

        let mut request = DmlRequest::new("requestor1", submission());
        assert_eq!(request.created_date.nanosecond() % 1_000, 0);
        request.record_manager_decision("manager1", true, String::new()).unwrap();
        request.record_support_decision("support1", true, String::new()).unwrap();
        request.record_execution(true, EXECUTION_SUCCESS.into()).unwrap();
        for date in [
            request.manager_action_date,
            request.support_action_date,
            request.execution_date,
        ] {
            assert_eq!(date.unwrap().nanosecond() % 1_000, 0);
        }
        assert!(request.is_consistent());
    }

    #[test]
    fn test_rejected_request_refuses_further_decisions() {
        let mut request = DmlRequest::new("requestor1", submission());
        request
            .record_manager_decision("manager1", false, "not needed".into())
            .unwrap();

        let before = request.clone();
        let err = request
            .record_support_decision("support1", true, String::new())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(request, before);
    }

    #[test]
    fn test_execution_only_from_approved() {
        let mut request = DmlRequest::new("requestor1", submission());
        assert!(request.record_execution(true, EXECUTION_SUCCESS.into()).is_err());
        assert!(request.execution_date.is_none());
    }

    #[test]
    fn test_inconsistent_record_detected() {
        let mut request = DmlRequest::new("requestor1", submission());
        request.status = RequestStatus::Executed;
        assert!(!request.is_consistent());
    }
}
