use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use super::packet::FrameResult;
use crate::types::{CameraId, FrameId};

pub const RESULT_BUFFER_CAPACITY: usize = 60;

pub type SharedFrameBuffers = Arc<Mutex<FrameBuffers>>;

/// Bounded `frame_id -> result` map for one camera.
///
/// Eviction drops the numerically smallest id, which tolerates modest reordering.
#[derive(Clone, Debug, Default)]
pub struct ResultBuffer {
    entries: BTreeMap<FrameId, Arc<FrameResult>>,
}

impl ResultBuffer {
    pub fn insert(&mut self, result: Arc<FrameResult>) {
        self.entries.insert(result.frame_id, result);
        while self.entries.len() > RESULT_BUFFER_CAPACITY {
            self.entries.pop_first();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.entries.contains_key(&frame_id)
    }

    pub fn newest(&self) -> Option<&Arc<FrameResult>> {
        self.entries.last_key_value().map(|(_, v)| v)
    }

    /// Exact match, else the newest older result, else the newest overall.
    pub fn join(&self, frame_id: Option<FrameId>) -> Option<&Arc<FrameResult>> {
        if let Some(frame_id) = frame_id {
            if let Some(hit) = self.entries.range(..=frame_id).next_back() {
                return Some(hit.1);
            }
        }
        self.newest()
    }
}

/// Result buffers for every camera, keyed by camera id.
#[derive(Debug, Default)]
pub struct FrameBuffers {
    cameras: HashMap<CameraId, ResultBuffer>,
}

impl FrameBuffers {
    pub fn shared() -> SharedFrameBuffers {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn insert(&mut self, result: Arc<FrameResult>) {
        self.cameras
            .entry(result.camera_id)
            .or_default()
            .insert(result);
    }

    #[cfg(test)]
    pub fn camera(&self, camera_id: CameraId) -> Option<&ResultBuffer> {
        self.cameras.get(&camera_id)
    }

    pub fn join(
        &self,
        camera_id: CameraId,
        frame_id: Option<FrameId>,
    ) -> Option<Arc<FrameResult>> {
        self.cameras
            .get(&camera_id)
            .and_then(|buffer| buffer.join(frame_id))
            .cloned()
    }

    /// Drops every camera's entries except `camera_id`.
    pub fn retain_only(&mut self, camera_id: CameraId) {
        self.cameras.retain(|id, _| *id == camera_id);
    }

    #[cfg(test)]
    pub fn camera_ids(&self) -> Vec<CameraId> {
        let mut ids: Vec<_> = self.cameras.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn result(camera_id: CameraId, frame_id: FrameId) -> Arc<FrameResult> {
        Arc::new(FrameResult {
            camera_id,
            frame_id,
            results: None,
            errors: Vec::new(),
            active_plugins: Value::Null,
            camera_config: Value::Null,
        })
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_smallest() {
        let mut buffer = ResultBuffer::default();
        for frame_id in 100..160 {
            buffer.insert(result(0, frame_id));
        }
        assert_eq!(buffer.len(), RESULT_BUFFER_CAPACITY);
        assert!(buffer.contains(100));

        buffer.insert(result(0, 160));
        assert_eq!(buffer.len(), RESULT_BUFFER_CAPACITY);
        assert!(!buffer.contains(100));
        assert!(buffer.contains(101));
        assert!(buffer.contains(160));
    }

    #[test]
    fn eviction_is_by_id_not_arrival() {
        let mut buffer = ResultBuffer::default();
        for frame_id in (1..=60).rev() {
            buffer.insert(result(0, frame_id));
        }
        // Arrives last but is the smallest: it is the one evicted.
        buffer.insert(result(0, 0));
        assert_eq!(buffer.len(), RESULT_BUFFER_CAPACITY);
        assert!(!buffer.contains(0));
        assert!(buffer.contains(60));
    }

    #[test]
    fn join_prefers_exact_then_older_then_newest() {
        let mut buffer = ResultBuffer::default();
        for frame_id in [10, 20, 30] {
            buffer.insert(result(0, frame_id));
        }
        assert_eq!(buffer.join(Some(20)).unwrap().frame_id, 20);
        assert_eq!(buffer.join(Some(25)).unwrap().frame_id, 20);
        assert_eq!(buffer.join(Some(5)).unwrap().frame_id, 30);
        assert_eq!(buffer.join(None).unwrap().frame_id, 30);
    }

    #[test]
    fn camera_switch_isolation() {
        let mut buffers = FrameBuffers::default();
        buffers.insert(result(0, 50));
        buffers.insert(result(1, 7));
        buffers.insert(result(2, 9));

        buffers.retain_only(1);
        assert!(buffers.camera(0).is_none());
        assert!(buffers.camera(2).is_none());
        assert_eq!(buffers.camera_ids(), vec![1]);
        // A frame id only camera 0 had is not served from camera 0's data.
        assert_eq!(buffers.join(1, Some(50)).unwrap().camera_id, 1);
        assert!(buffers.join(0, None).is_none());
    }
}
