//! Per-(asset, video) record of asynchronous processing steps.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known step names.
pub mod steps {
    pub const ANALYZE: &str = "analyze";
    pub const HLS: &str = "hls";
    pub const DASH: &str = "dash";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Requested,
    Completed,
    Failed,
}

impl StepStatus {
    /// Completed and failed steps only change through an explicit overwrite.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Requested => "requested",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepState {
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// What a step mutation did to the stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTransition {
    Applied,
    /// The step already held the requested terminal outcome.
    Unchanged,
    /// The step held the opposite terminal outcome, which was replaced.
    Overwrote(StepStatus),
}

/// Storage key of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineKey {
    pub asset_id: String,
    pub video_id: String,
}

impl PipelineKey {
    pub fn new(asset_id: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            video_id: video_id.into(),
        }
    }
}

impl fmt::Display for PipelineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_id, self.video_id)
    }
}

/// A step absent from `steps` has not started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub asset_id: String,
    pub video_id: String,
    #[serde(default)]
    pub steps: BTreeMap<String, StepState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn new(asset_id: impl Into<String>, video_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            asset_id: asset_id.into(),
            video_id: video_id.into(),
            steps: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> PipelineKey {
        PipelineKey::new(self.asset_id.clone(), self.video_id.clone())
    }

    /// State of `name`, if the step was ever touched.
    pub fn step(&self, name: &str) -> Option<&StepState> {
        self.steps.get(name)
    }

    pub fn step_status(&self, name: &str) -> Option<StepStatus> {
        self.steps.get(name).map(|state| state.status)
    }

    /// Start (or restart) a step. Always replaces whatever the step held.
    pub fn set_requested(
        &mut self,
        step: &str,
        job_id: Option<String>,
        correlation_id: Option<String>,
    ) -> StepTransition {
        let now = Utc::now();
        self.steps.insert(
            step.to_string(),
            StepState {
                status: StepStatus::Requested,
                started_at: now,
                completed_at: None,
                error_message: None,
                job_id,
                correlation_id,
            },
        );
        self.updated_at = now;
        StepTransition::Applied
    }

    /// Mark `step` completed, creating it first if it was never requested.
    pub fn set_completed(&mut self, step: &str) -> StepTransition {
        self.finish(step, StepStatus::Completed, None)
    }

    /// Mark `step` failed with `error_message`.
    pub fn set_failed(&mut self, step: &str, error_message: impl Into<String>) -> StepTransition {
        self.finish(step, StepStatus::Failed, Some(error_message.into()))
    }

    fn finish(
        &mut self,
        step: &str,
        outcome: StepStatus,
        error_message: Option<String>,
    ) -> StepTransition {
        let now = Utc::now();
        let state = self.steps.entry(step.to_string()).or_insert_with(|| StepState {
            status: StepStatus::Requested,
            started_at: now,
            completed_at: None,
            error_message: None,
            job_id: None,
            correlation_id: None,
        });

        let transition = match state.status {
            status if status == outcome => return StepTransition::Unchanged,
            StepStatus::Requested => StepTransition::Applied,
            previous => StepTransition::Overwrote(previous),
        };

        state.status = outcome;
        state.completed_at = Some(now);
        state.error_message = error_message;
        self.updated_at = now;
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_then_completed() {
        let mut pipeline = Pipeline::new("a1", "v1");
        pipeline.set_requested(steps::HLS, Some("job-1".into()), Some("job-1".into()));
        assert_eq!(pipeline.set_completed(steps::HLS), StepTransition::Applied);

        let state = pipeline.step(steps::HLS).unwrap();
        assert_eq!(state.status, StepStatus::Completed);
        assert!(state.completed_at.is_some());
        assert_eq!(state.job_id.as_deref(), Some("job-1"));
    }

    #[test]
    fn repeated_completion_is_unchanged() {
        let mut pipeline = Pipeline::new("a1", "v1");
        pipeline.set_completed(steps::HLS);
        let before = pipeline.clone();

        assert_eq!(pipeline.set_completed(steps::HLS), StepTransition::Unchanged);
        assert_eq!(pipeline, before);
    }

    #[test]
    fn completing_an_absent_step_starts_it() {
        let mut pipeline = Pipeline::new("a1", "v1");
        assert_eq!(pipeline.set_completed(steps::DASH), StepTransition::Applied);
        let state = pipeline.step(steps::DASH).unwrap();
        assert!(state.started_at <= state.completed_at.unwrap());
    }

    #[test]
    fn opposite_outcome_overwrites() {
        let mut pipeline = Pipeline::new("a1", "v1");
        pipeline.set_completed(steps::HLS);
        assert_eq!(
            pipeline.set_failed(steps::HLS, "late failure"),
            StepTransition::Overwrote(StepStatus::Completed)
        );
        let state = pipeline.step(steps::HLS).unwrap();
        assert_eq!(state.status, StepStatus::Failed);
        assert_eq!(state.error_message.as_deref(), Some("late failure"));
    }

    #[test]
    fn mutations_bump_updated_at() {
        let mut pipeline = Pipeline::new("a1", "v1");
        let created = pipeline.updated_at;
        pipeline.set_requested(steps::ANALYZE, None, None);
        assert!(pipeline.updated_at >= created);
        assert_eq!(pipeline.created_at, created);
    }

    #[test]
    fn serializes_camel_case_steps() {
        let mut pipeline = Pipeline::new("a1", "v1");
        pipeline.set_failed(steps::HLS, "encoder crash");
        let wire = serde_json::to_value(&pipeline).unwrap();
        assert_eq!(wire["steps"]["hls"]["status"], "failed");
        assert_eq!(wire["steps"]["hls"]["errorMessage"], "encoder crash");
        assert!(wire["assetId"].is_string());
    }
}
