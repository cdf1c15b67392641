//! Pickup fulfillment jobs.
//!
//! Settlement spawns exactly one REQUESTED job per paid order. From there
//! the job is driven by pickup agents (accept, pick up from the farm) and
//! community representatives (receive, hand to delivery).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, FarmgateError, OrderId, PickupJobId, Result};

/// Lifecycle status of a pickup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PickupStatus {
    Requested,
    Accepted,
    PickedUp,
    HandedToCr,
    Delivered,
    Cancelled,
}

impl PickupStatus {
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Self::Requested, Self::Accepted)
                | (Self::Accepted, Self::PickedUp)
                | (Self::PickedUp, Self::HandedToCr)
                | (Self::HandedToCr, Self::Delivered)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl std::fmt::Display for PickupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "REQUESTED"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::PickedUp => write!(f, "PICKED_UP"),
            Self::HandedToCr => write!(f, "HANDED_TO_CR"),
            Self::Delivered => write!(f, "DELIVERED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One fulfillment work item, unique per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupJob {
    pub id: PickupJobId,
    pub order_id: OrderId,
    /// The agent who accepted the job, once one has.
    pub agent_id: Option<AgentId>,
    pub status: PickupStatus,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PickupJob {
    /// Spawn the REQUESTED job for a freshly paid order.
    #[must_use]
    pub fn request(order_id: OrderId) -> Self {
        let now = Utc::now();
        Self {
            id: PickupJobId::new(),
            order_id,
            agent_id: None,
            status: PickupStatus::Requested,
            requested_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: PickupStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(FarmgateError::InvalidPickupTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_accepted(&mut self, agent_id: AgentId) -> Result<()> {
        self.transition(PickupStatus::Accepted)?;
        self.agent_id = Some(agent_id);
        Ok(())
    }

    pub fn mark_picked_up(&mut self) -> Result<()> {
        self.transition(PickupStatus::PickedUp)
    }

    pub fn mark_handed_to_cr(&mut self) -> Result<()> {
        self.transition(PickupStatus::HandedToCr)
    }

    pub fn mark_delivered(&mut self) -> Result<()> {
        self.transition(PickupStatus::Delivered)
    }

    pub fn mark_cancelled(&mut self) -> Result<()> {
        self.transition(PickupStatus::Cancelled)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", PickupStatus::Requested), "REQUESTED");
        assert_eq!(format!("{}", PickupStatus::HandedToCr), "HANDED_TO_CR");
    }

    #[test]
    fn full_happy_path() {
        let mut job = PickupJob::request(OrderId::new());
        job.mark_accepted(AgentId::new()).unwrap();
        job.mark_picked_up().unwrap();
        job.mark_handed_to_cr().unwrap();
        job.mark_delivered().unwrap();
        assert_eq!(job.status, PickupStatus::Delivered);
        assert!(!job.is_open());
    }

    #[test]
    fn cannot_skip_ahead() {
        let mut job = PickupJob::request(OrderId::new());
        let err = job.mark_picked_up().unwrap_err();
        assert!(format!("{err}").contains("FG_ERR_500"));
        assert_eq!(job.status, PickupStatus::Requested);
        assert!(job.agent_id.is_none());
    }

    #[test]
    fn cancel_from_any_live_state() {
        let mut job = PickupJob::request(OrderId::new());
        job.mark_accepted(AgentId::new()).unwrap();
        job.mark_cancelled().unwrap();
        assert_eq!(job.status, PickupStatus::Cancelled);
        assert!(job.mark_accepted(AgentId::new()).is_err());
    }

    #[test]
    fn delivered_is_terminal() {
        let mut job = PickupJob::request(OrderId::new());
        job.mark_accepted(AgentId::new()).unwrap();
        job.mark_picked_up().unwrap();
        job.mark_handed_to_cr().unwrap();
        job.mark_delivered().unwrap();
        assert!(job.mark_cancelled().is_err());
    }
}
