use std::time::Duration;

use anyhow::Result;
use ark_core::env::infer_or;
use k8s_openapi::api::batch::v1::JobStatus;
use kubemodel_api::model::ModelPhase;

use crate::consts;

/// What the reconciler found out about a model in its current phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observation {
    /// Outcome of ensuring the storage claim and the download job.
    Pending(PendingOutcome),
    /// State of the download job, `None` if it is gone.
    Downloading(Option<TaskObservation>),
    Ready { storage_claim_exists: bool },
    Failed { task_exists: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingOutcome {
    /// Both the storage claim and the download job exist.
    Scheduled,
    BuildFailed {
        resource: &'static str,
        error: String,
    },
    CreateFailed {
        resource: &'static str,
        error: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskObservation {
    pub active: i32,
    pub succeeded: i32,
    /// Message of the `Failed=True` job condition, if any.
    pub failure: Option<String>,
}

impl TaskObservation {
    const CONDITION_FAILED: &'static str = "Failed";

    pub fn from_status(status: Option<&JobStatus>) -> Self {
        let Some(status) = status else {
            return Self::default();
        };

        Self {
            active: status.active.unwrap_or_default(),
            succeeded: status.succeeded.unwrap_or_default(),
            failure: status
                .conditions
                .iter()
                .flatten()
                .find(|condition| {
                    condition.type_ == Self::CONDITION_FAILED && condition.status == "True"
                })
                .map(|condition| condition.message.clone().unwrap_or_default()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub phase: ModelPhase,
    /// `None` keeps the stored message.
    pub message: Option<String>,
    pub progress: u8,
    pub requeue: Duration,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RequeueIntervals {
    pub pending: Duration,
    pub downloading: Duration,
    pub ready: Duration,
    pub failed: Duration,
}

impl Default for RequeueIntervals {
    fn default() -> Self {
        Self {
            pending: Duration::from_secs(10),
            downloading: Duration::from_secs(15),
            ready: Duration::from_secs(5 * 60),
            failed: Duration::from_secs(60),
        }
    }
}

impl RequeueIntervals {
    pub fn try_from_env() -> Result<Self> {
        fn infer_secs(key: &str, default: Duration) -> Result<Duration> {
            infer_or(key, default.as_secs()).map(Duration::from_secs)
        }

        let default = Self::default();
        Ok(Self {
            pending: infer_secs(consts::ENV_REQUEUE_PENDING, default.pending)?,
            downloading: infer_secs(consts::ENV_REQUEUE_DOWNLOADING, default.downloading)?,
            ready: infer_secs(consts::ENV_REQUEUE_READY, default.ready)?,
            failed: infer_secs(consts::ENV_REQUEUE_FAILED, default.failed)?,
        })
    }

    pub const fn of(&self, phase: ModelPhase) -> Duration {
        match phase {
            ModelPhase::Pending => self.pending,
            ModelPhase::Downloading => self.downloading,
            ModelPhase::Ready => self.ready,
            ModelPhase::Failed => self.failed,
        }
    }
}

pub fn transition(observation: Observation, intervals: &RequeueIntervals) -> Transition {
    let (phase, message) = match observation {
        Observation::Pending(PendingOutcome::Scheduled) => {
            (ModelPhase::Downloading, Some("Download started".into()))
        }
        Observation::Pending(PendingOutcome::BuildFailed { resource, error }) => (
            ModelPhase::Failed,
            Some(format!("Failed to build {resource}: {error}")),
        ),
        Observation::Pending(PendingOutcome::CreateFailed { resource, error }) => (
            ModelPhase::Pending,
            Some(format!("Failed to create {resource}: {error}")),
        ),
        Observation::Downloading(None) => {
            (ModelPhase::Pending, Some("Job not found, recreating".into()))
        }
        Observation::Downloading(Some(task)) if task.succeeded > 0 => {
            (ModelPhase::Ready, Some("Download complete".into()))
        }
        Observation::Downloading(Some(TaskObservation {
            failure: Some(failure),
            ..
        })) => (ModelPhase::Failed, Some(format!("Download failed: {failure}"))),
        Observation::Downloading(Some(TaskObservation { active, .. })) => (
            ModelPhase::Downloading,
            Some(if active > 0 {
                format!("Download in progress (active pods: {active})")
            } else {
                "Download in progress".into()
            }),
        ),
        Observation::Ready {
            storage_claim_exists: false,
        } => (ModelPhase::Pending, Some("PVC was deleted, recreating".into())),
        Observation::Ready {
            storage_claim_exists: true,
        } => (ModelPhase::Ready, None),
        Observation::Failed { task_exists: false } => {
            (ModelPhase::Pending, Some("Retrying download".into()))
        }
        Observation::Failed { task_exists: true } => (ModelPhase::Failed, None),
    };

    Transition {
        phase,
        message,
        progress: if phase == ModelPhase::Ready { 100 } else { 0 },
        requeue: intervals.of(phase),
    }
}
