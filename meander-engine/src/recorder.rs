//! Activity history recording.
//!
//! The recorder is the engine's only hook for visualization and post-hoc
//! analysis: an ordered sequence of per-step activity snapshots, consumed
//! after the run by code outside this crate. Rendering is out of scope here.

/// Collects per-step activity snapshots between `begin` and `end`.
#[derive(Debug, Clone, Default)]
pub struct ActivityRecorder {
    recording: bool,
    /// One full activity snapshot per recorded step, in step order.
    pub history: Vec<Vec<f32>>,
}

impl ActivityRecorder {
    /// Start a fresh recording, discarding any previous history.
    pub fn begin(&mut self) {
        self.history.clear();
        self.recording = true;
    }

    /// Append a snapshot. No-op unless recording.
    pub fn record(&mut self, snapshot: Vec<f32>) {
        if self.recording {
            self.history.push(snapshot);
        }
    }

    /// Stop recording. History is kept until the next `begin`.
    pub fn end(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_only_between_begin_and_end() {
        let mut recorder = ActivityRecorder::default();
        recorder.record(vec![1.0]);
        assert!(recorder.is_empty());

        recorder.begin();
        recorder.record(vec![1.0, 2.0]);
        recorder.record(vec![3.0, 4.0]);
        recorder.end();
        recorder.record(vec![5.0, 6.0]);

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.history[1], vec![3.0, 4.0]);
    }

    #[test]
    fn test_begin_clears_previous_history() {
        let mut recorder = ActivityRecorder::default();
        recorder.begin();
        recorder.record(vec![1.0]);
        recorder.end();

        recorder.begin();
        assert!(recorder.is_empty());
    }
}
