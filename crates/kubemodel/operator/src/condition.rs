use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kubemodel_api::model::ModelPhase;

pub const TYPE_READY: &str = "Ready";

const REASON_COMPLETE: &str = "DownloadComplete";
const REASON_FAILED: &str = "DownloadFailed";
const REASON_IN_PROGRESS: &str = "InProgress";

const fn status_of(phase: ModelPhase) -> (&'static str, &'static str) {
    match phase {
        ModelPhase::Ready => ("True", REASON_COMPLETE),
        ModelPhase::Failed => ("False", REASON_FAILED),
        ModelPhase::Pending | ModelPhase::Downloading => ("False", REASON_IN_PROGRESS),
    }
}

/// Upserts the `Ready` condition for `phase`.
///
/// `lastTransitionTime` is bumped to `now` only when the condition status flips.
pub fn set_ready(
    conditions: &mut Vec<Condition>,
    phase: ModelPhase,
    message: &str,
    observed_generation: Option<i64>,
    now: Time,
) {
    let (status, reason) = status_of(phase);

    match conditions
        .iter_mut()
        .find(|condition| condition.type_ == TYPE_READY)
    {
        Some(condition) => {
            if condition.status != status {
                condition.status = status.into();
                condition.last_transition_time = now;
            }
            condition.reason = reason.into();
            condition.message = message.into();
            condition.observed_generation = observed_generation;
        }
        None => conditions.push(Condition {
            last_transition_time: now,
            message: message.into(),
            observed_generation,
            reason: reason.into(),
            status: status.into(),
            type_: TYPE_READY.into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> Time {
        Time(Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn insert_when_missing() {
        let mut conditions = Vec::default();
        set_ready(&mut conditions, ModelPhase::Pending, "Download started", Some(1), at(10));

        assert_eq!(conditions.len(), 1);
        let condition = &conditions[0];
        assert_eq!(condition.type_, "Ready");
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason, "InProgress");
        assert_eq!(condition.message, "Download started");
        assert_eq!(condition.observed_generation, Some(1));
        assert_eq!(condition.last_transition_time, at(10));
    }

    #[test]
    fn keep_transition_time_while_status_holds() {
        let mut conditions = Vec::default();
        set_ready(&mut conditions, ModelPhase::Pending, "Download started", Some(1), at(10));
        set_ready(&mut conditions, ModelPhase::Failed, "Download failed: oom", Some(2), at(20));

        let condition = &conditions[0];
        assert_eq!(condition.reason, "DownloadFailed");
        assert_eq!(condition.message, "Download failed: oom");
        assert_eq!(condition.observed_generation, Some(2));
        assert_eq!(condition.last_transition_time, at(10));
    }

    #[test]
    fn bump_transition_time_when_status_flips() {
        let mut conditions = Vec::default();
        set_ready(&mut conditions, ModelPhase::Downloading, "Download in progress", None, at(10));
        set_ready(&mut conditions, ModelPhase::Ready, "Download complete", None, at(30));

        assert_eq!(conditions.len(), 1);
        let condition = &conditions[0];
        assert_eq!(condition.status, "True");
        assert_eq!(condition.reason, "DownloadComplete");
        assert_eq!(condition.last_transition_time, at(30));
    }

    #[test]
    fn leave_other_conditions_alone() {
        let other = Condition {
            last_transition_time: at(1),
            message: String::default(),
            observed_generation: None,
            reason: "Reason".into(),
            status: "True".into(),
            type_: "Other".into(),
        };
        let mut conditions = vec![other.clone()];
        set_ready(&mut conditions, ModelPhase::Ready, "Download complete", None, at(10));

        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0], other);
    }
}
