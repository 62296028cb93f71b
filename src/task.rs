// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Progress reporting and cooperative cancellation for long operations.
//!
//! Operations such as re-keying a dataset report their progress through a
//! [`TaskControl`]. Every call returns whether the operation should go on; a
//! `false` stops it at the next stage or step boundary, never in the middle of a
//! record.

/// Receives progress reports and decides whether to continue.
pub trait TaskControl {
    fn set_num_stages(&mut self, stages: usize) -> bool {
        let _ = stages;
        true
    }

    fn set_new_stage(&mut self, name: &str) -> bool {
        let _ = name;
        true
    }

    fn set_num_steps(&mut self, steps: usize) -> bool {
        let _ = steps;
        true
    }

    fn set_steps_done(&mut self, done: usize) -> bool {
        let _ = done;
        true
    }
}

/// Ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTask;

impl TaskControl for NullTask {}

/// One call received by a [`RecordingTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Stages(usize),
    Stage(String),
    Steps(usize),
    Done(usize),
}

/// Records every report, and can be told to cancel at a given point.
///
/// Mostly useful in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingTask {
    pub events: Vec<TaskEvent>,
    /// Cancel when a stage with this name starts.
    pub stop_at_stage: Option<String>,
    /// Cancel once this many steps of any stage are done.
    pub stop_after_steps: Option<usize>,
}

impl RecordingTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopping_at_stage(stage: impl Into<String>) -> Self {
        Self {
            stop_at_stage: Some(stage.into()),
            ..Self::default()
        }
    }

    pub fn stopping_after_steps(steps: usize) -> Self {
        Self {
            stop_after_steps: Some(steps),
            ..Self::default()
        }
    }

    /// Names of the stages started so far.
    pub fn stages(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TaskEvent::Stage(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl TaskControl for RecordingTask {
    fn set_num_stages(&mut self, stages: usize) -> bool {
        self.events.push(TaskEvent::Stages(stages));
        true
    }

    fn set_new_stage(&mut self, name: &str) -> bool {
        self.events.push(TaskEvent::Stage(name.to_owned()));
        self.stop_at_stage.as_deref() != Some(name)
    }

    fn set_num_steps(&mut self, steps: usize) -> bool {
        self.events.push(TaskEvent::Steps(steps));
        true
    }

    fn set_steps_done(&mut self, done: usize) -> bool {
        self.events.push(TaskEvent::Done(done));
        self.stop_after_steps.is_none_or(|limit| done < limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_task_cancels_where_told() {
        let mut task = RecordingTask::stopping_at_stage("Purge");
        assert!(task.set_num_stages(2));
        assert!(task.set_new_stage("Update"));
        assert!(!task.set_new_stage("Purge"));
        assert_eq!(task.stages(), ["Update", "Purge"]);

        let mut task = RecordingTask::stopping_after_steps(2);
        assert!(task.set_num_steps(5));
        assert!(task.set_steps_done(1));
        assert!(!task.set_steps_done(2));
        assert_eq!(
            task.events,
            [TaskEvent::Steps(5), TaskEvent::Done(1), TaskEvent::Done(2)]
        );
    }

    #[test]
    fn null_task_never_cancels() {
        let mut task = NullTask;
        assert!(task.set_new_stage("anything"));
        assert!(task.set_steps_done(usize::MAX));
    }
}
