//! Scheduler progress events
//!
//! Published to an optional unbounded channel while a plan runs. A dropped
//! receiver never affects execution.

use crate::scheduler::executor::TaskStatus;
use std::time::SystemTime;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerEventType {
    PlanStarted {
        total_steps: usize,
        batch_count: usize,
    },
    BatchStarted {
        batch_id: String,
        task_count: usize,
    },
    TaskFinished {
        batch_id: String,
        task_id: String,
        status: TaskStatus,
    },
    BatchFinished {
        batch_id: String,
        successful_tasks: usize,
        failed_tasks: usize,
    },
    PlanCompleted {
        successful_tasks: usize,
        failed_tasks: usize,
    },
}

#[derive(Clone, Debug)]
pub struct SchedulerEvent {
    pub event_type: SchedulerEventType,
    pub timestamp: SystemTime,
    pub plan_id: Option<String>,
}

impl SchedulerEvent {
    pub fn new(event_type: SchedulerEventType, plan_id: Option<String>) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            plan_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.event_type, SchedulerEventType::PlanCompleted { .. })
    }
}

/// Send `event` if there is a subscriber
pub(crate) fn publish(
    sender: Option<&UnboundedSender<SchedulerEvent>>,
    event_type: SchedulerEventType,
    plan_id: Option<&str>,
) {
    if let Some(sender) = sender {
        let event = SchedulerEvent::new(event_type, plan_id.map(str::to_string));
        if sender.send(event).is_err() {
            log::debug!("Scheduler event dropped: no active subscriber");
        }
    }
}
