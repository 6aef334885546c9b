//! Request lifecycle states and the transition table

use bytes::BytesMut;
use postgres_types::{accepts, to_sql_checked, FromSql, IsNull, ToSql, Type};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::str::FromStr;
use thiserror::Error;

/// Where a DML request sits in the approval chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    PendingManagerApproval,
    RejectedByManager,
    PendingSupportApproval,
    RejectedBySupport,
    Approved,
    Executed,
    ExecutionFailed,
}

/// Something that moves a request forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    ManagerApproved,
    ManagerRejected,
    SupportApproved,
    SupportRejected,
    ExecutionSucceeded,
    ExecutionFailed,
}

#[derive(Debug, Error)]
#[error("Unknown request status '{0}'")]
pub struct ParseStatusError(String);

impl RequestStatus {
    pub const ALL: [RequestStatus; 7] = [
        RequestStatus::PendingManagerApproval,
        RequestStatus::RejectedByManager,
        RequestStatus::PendingSupportApproval,
        RequestStatus::RejectedBySupport,
        RequestStatus::Approved,
        RequestStatus::Executed,
        RequestStatus::ExecutionFailed,
    ];

    /// Label stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::PendingManagerApproval => "Pending Manager Approval",
            RequestStatus::RejectedByManager => "Rejected by Manager",
            RequestStatus::PendingSupportApproval => "Pending Production Support Approval",
            RequestStatus::RejectedBySupport => "Rejected by Production Support",
            RequestStatus::Approved => "Approved",
            RequestStatus::Executed => "Executed",
            RequestStatus::ExecutionFailed => "Execution Failed",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::RejectedByManager
                | RequestStatus::RejectedBySupport
                | RequestStatus::Executed
                | RequestStatus::ExecutionFailed
        )
    }

    /// Target state for `event`, or `None` when the event is not allowed here
    pub fn transition(self, event: WorkflowEvent) -> Option<RequestStatus> {
        use RequestStatus::*;
        use WorkflowEvent as E;

        match (self, event) {
            (PendingManagerApproval, E::ManagerApproved) => Some(PendingSupportApproval),
            (PendingManagerApproval, E::ManagerRejected) => Some(RejectedByManager),
            (PendingSupportApproval, E::SupportApproved) => Some(Approved),
            (PendingSupportApproval, E::SupportRejected) => Some(RejectedBySupport),
            (Approved, E::ExecutionSucceeded) => Some(Executed),
            (Approved, E::ExecutionFailed) => Some(ExecutionFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseStatusError;

    /// Accepts the stored label or the snake_case API name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RequestStatus::ALL
            .into_iter()
            .find(|status| {
                status.as_str().eq_ignore_ascii_case(wanted)
                    || serde_json::to_value(status)
                        .ok()
                        .and_then(|v| v.as_str().map(|name| name == wanted))
                        .unwrap_or(false)
            })
            .ok_or_else(|| ParseStatusError(wanted.to_string()))
    }
}

impl ToSql for RequestStatus {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        <&str as ToSql>::to_sql(&self.as_str(), ty, out)
    }

    accepts!(TEXT, VARCHAR);
    to_sql_checked!();
}

impl<'a> FromSql<'a> for RequestStatus {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let label = <&str as FromSql>::from_sql(ty, raw)?;
        Ok(label.parse::<RequestStatus>()?)
    }

    accepts!(TEXT, VARCHAR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labels_parse_back() {
        for status in RequestStatus::ALL {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert_eq!(
            "pending_support_approval".parse::<RequestStatus>().unwrap(),
            RequestStatus::PendingSupportApproval
        );
        assert!("Cancelled".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_happy_path_transitions() {
        let status = RequestStatus::PendingManagerApproval
            .transition(WorkflowEvent::ManagerApproved)
            .and_then(|s| s.transition(WorkflowEvent::SupportApproved))
            .and_then(|s| s.transition(WorkflowEvent::ExecutionSucceeded));
        assert_eq!(status, Some(RequestStatus::Executed));
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let events = [
            WorkflowEvent::ManagerApproved,
            WorkflowEvent::ManagerRejected,
            WorkflowEvent::SupportApproved,
            WorkflowEvent::SupportRejected,
            WorkflowEvent::ExecutionSucceeded,
            WorkflowEvent::ExecutionFailed,
        ];

        for status in RequestStatus::ALL.into_iter().filter(RequestStatus::is_terminal) {
            for event in events {
                assert_eq!(status.transition(event), None, "{status} accepted {event:?}");
            }
        }
    }

    #[test]
    fn test_stages_cannot_be_skipped() {
        assert_eq!(
            RequestStatus::PendingManagerApproval.transition(WorkflowEvent::SupportApproved),
            None
        );
        assert_eq!(
            RequestStatus::PendingSupportApproval.transition(WorkflowEvent::ExecutionSucceeded),
            None
        );
        assert_eq!(
            RequestStatus::Approved.transition(WorkflowEvent::ManagerRejected),
            None
        );
    }
}
