//! # Governance collaborator
//!
//! Optional external approval gate. Only the callback shape is in scope
//! here — no council-voting implementation. Approval is bounded by a
//! configurable deadline (default 30s); a timeout is treated as a
//! rejection.

use crate::models::AIRequest;
use async_trait::async_trait;
use std::time::Duration;

pub struct ApprovalDecision {
    pub approved: bool,
    pub reason: Option<String>,
}

#[async_trait]
pub trait Governance: Send + Sync {
    async fn request_approval(
        &self,
        request: &AIRequest,
        estimated_cost: f64,
        selected_model: &str,
    ) -> ApprovalDecision;
}

pub const DEFAULT_APPROVAL_DEADLINE: Duration = Duration::from_secs(30);

/// Runs `governance.request_approval` under `DEFAULT_APPROVAL_DEADLINE` (or
/// a caller-supplied deadline), collapsing a timeout into a rejection per
/// "timeout is treated as rejection".
pub async fn request_approval_with_deadline(
    governance: &dyn Governance,
    request: &AIRequest,
    estimated_cost: f64,
    selected_model: &str,
    deadline: Duration,
) -> ApprovalDecision {
    match tokio::time::timeout(
        deadline,
        governance.request_approval(request, estimated_cost, selected_model),
    )
    .await
    {
        Ok(decision) => decision,
        Err(_) => ApprovalDecision {
            approved: false,
            reason: Some("governance approval timed out".to_string()),
        },
    }
}

/// Always-approve stub for tests and for deployments that enable the
/// `AI_GOVERNANCE_ENABLED` flag without a real council/approval backend yet.
pub struct AutoApproveGovernance;

#[async_trait]
impl Governance for AutoApproveGovernance {
    async fn request_approval(
        &self,
        _request: &AIRequest,
        _estimated_cost: f64,
        _selected_model: &str,
    ) -> ApprovalDecision {
        ApprovalDecision {
            approved: true,
            reason: None,
        }
    }
}

/// Always-deny stub, useful for exercising `GovernanceDenied` in tests.
pub struct AutoDenyGovernance;

#[async_trait]
impl Governance for AutoDenyGovernance {
    async fn request_approval(
        &self,
        _request: &AIRequest,
        _estimated_cost: f64,
        _selected_model: &str,
    ) -> ApprovalDecision {
        ApprovalDecision {
            approved: false,
            reason: Some("denied by policy".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    #[tokio::test]
    async fn slow_governance_times_out_as_denial() {
        struct SlowGovernance;
        #[async_trait]
        impl Governance for SlowGovernance {
            async fn request_approval(
                &self,
                _request: &AIRequest,
                _estimated_cost: f64,
                _selected_model: &str,
            ) -> ApprovalDecision {
                tokio::time::sleep(Duration::from_secs(10)).await;
                ApprovalDecision {
                    approved: true,
                    reason: None,
                }
            }
        }

        let req = AIRequest::new("hi", Category::Chat, "agent-1");
        let decision = request_approval_with_deadline(
            &SlowGovernance,
            &req,
            0.0,
            "claude-haiku-4.5",
            Duration::from_millis(20),
        )
        .await;
        assert!(!decision.approved);
    }
}
