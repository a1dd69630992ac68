use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crossbeam_channel::Sender;
use serde_json::{Map, Value};

use super::{
    buffer::SharedFrameBuffers,
    packet::{self, FrameResult, TelemetryPacket},
    store::{TelemetryStore, camera_slot},
};
use crate::types::{CameraId, Notification};

/// Only every Nth frame result per camera is published as a snapshot.
pub const SNAPSHOT_DECIMATION: u64 = 10;
pub const NOTIFICATION_DEDUP_CAP: usize = 100;

/// Routes inbound telemetry to the store, the frame buffers and the toast channel.
pub struct Dispatcher {
    store: Arc<TelemetryStore>,
    buffers: SharedFrameBuffers,
    notify_tx: Sender<Notification>,
    // Per-camera count of frame results; drives decimation independent of id wraparound.
    result_counters: HashMap<CameraId, u64>,
    seen_notifications: HashSet<String>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<TelemetryStore>,
        buffers: SharedFrameBuffers,
        notify_tx: Sender<Notification>,
    ) -> Self {
        Self {
            store,
            buffers,
            notify_tx,
            result_counters: HashMap::new(),
            seen_notifications: HashSet::new(),
        }
    }

    /// Handles one inbound text message. Malformed packets are dropped individually.
    pub fn handle_text(&mut self, text: &str) {
        let raw_packets = match packet::normalize(text) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("dropping telemetry message: {err}");
                return;
            }
        };

        for raw in &raw_packets {
            match packet::classify(raw) {
                Ok(packets) => {
                    for packet in packets {
                        self.dispatch(packet);
                    }
                }
                Err(err) => log::warn!("dropping telemetry packet: {err}"),
            }
        }
    }

    pub fn dispatch(&mut self, packet: TelemetryPacket) {
        match packet {
            TelemetryPacket::Broadcast { plugin_id, data } => {
                self.store.publish_plugin(&plugin_id, data);
            }
            TelemetryPacket::FrameResult(result) => self.handle_frame_result(result),
            TelemetryPacket::WidgetUpdate { widget_id, data } => {
                self.store.merge_widget(&widget_id, data);
            }
            TelemetryPacket::Notification(notification) => self.surface(notification),
        }
    }

    fn handle_frame_result(&mut self, result: FrameResult) {
        let result = Arc::new(result);
        self.buffers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(result.clone());

        let counter = self.result_counters.entry(result.camera_id).or_insert(0);
        let publish = *counter % SNAPSHOT_DECIMATION == 0;
        *counter = counter.wrapping_add(1);

        if publish {
            if let Some(results) = &result.results {
                let snapshot = camera_snapshot(results, &result);
                self.store
                    .publish_plugin(&camera_slot(result.camera_id), snapshot);
            }
        }
    }

    fn surface(&mut self, notification: Notification) {
        if self.seen_notifications.contains(&notification.id) {
            return;
        }
        self.seen_notifications.insert(notification.id.clone());
        if self.seen_notifications.len() >= NOTIFICATION_DEDUP_CAP {
            self.seen_notifications.clear();
        }
        log::info!("notification {}: {}", notification.id, notification.message);
        let _ = self.notify_tx.send(notification);
    }

    #[cfg(test)]
    fn seen_count(&self) -> usize {
        self.seen_notifications.len()
    }
}

fn camera_snapshot(results: &Value, result: &FrameResult) -> Value {
    let mut snapshot = match results {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("results".to_string(), other.clone());
            map
        }
    };
    snapshot.insert("_active_plugins".to_string(), result.active_plugins.clone());
    snapshot.insert("_camera_config".to_string(), result.camera_config.clone());
    Value::Object(snapshot)
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{Receiver, unbounded};
    use serde_json::json;

    use super::*;
    use crate::telemetry::buffer::FrameBuffers;

    fn dispatcher() -> (
        Dispatcher,
        Arc<TelemetryStore>,
        SharedFrameBuffers,
        Receiver<Notification>,
    ) {
        let store = Arc::new(TelemetryStore::new());
        let buffers = FrameBuffers::shared();
        let (tx, rx) = unbounded();
        (
            Dispatcher::new(store.clone(), buffers.clone(), tx),
            store,
            buffers,
            rx,
        )
    }

    #[test]
    fn every_result_is_buffered_but_snapshots_are_decimated() {
        let (mut dispatcher, store, buffers, _rx) = dispatcher();
        let snapshots = store.subscribe_plugin("cam_0");

        for frame_id in 0..25u64 {
            let message = json!({
                "frame_id": frame_id,
                "camera_id": 0,
                "results": {"vision": {"keypoints": []}, "n": frame_id},
                "active_plugins": [],
                "camera_config": {}
            });
            dispatcher.handle_text(&message.to_string());
        }

        assert_eq!(buffers.lock().unwrap().camera(0).unwrap().len(), 25);
        let published: Vec<Value> = snapshots.try_iter().collect();
        assert_eq!(published.len(), 3);
        assert_eq!(published[1]["n"], json!(10));
        assert_eq!(published[2]["_active_plugins"], json!([]));
    }

    #[test]
    fn decimation_ignores_id_gaps() {
        let (mut dispatcher, store, _buffers, _rx) = dispatcher();
        let snapshots = store.subscribe_plugin("cam_2");
        // Ids never hit a multiple of ten, snapshots still flow at 1 in 10.
        for i in 0..20u64 {
            let message = json!({"frame_id": i * 7 + 3, "camera_id": 2, "results": {}});
            dispatcher.handle_text(&message.to_string());
        }
        assert_eq!(snapshots.try_iter().count(), 2);
    }

    #[test]
    fn results_absent_means_no_snapshot() {
        let (mut dispatcher, store, buffers, _rx) = dispatcher();
        dispatcher.handle_text(&json!({"frame_id": 0, "camera_id": 0}).to_string());
        assert!(store.plugin("cam_0").is_none());
        assert_eq!(buffers.lock().unwrap().camera(0).unwrap().len(), 1);
    }

    #[test]
    fn array_messages_and_malformed_members() {
        let (mut dispatcher, store, _buffers, _rx) = dispatcher();
        let message = json!([
            {"type": "plugin_data", "payload": {"plugin": "system_monitor", "data": {"cpu": 1}}},
            17,
            {"widgets": [{"widget_id": "a", "v": 1}]},
            {"widgets": [{"widget_id": "b", "v": 2}]}
        ]);
        dispatcher.handle_text(&message.to_string());
        dispatcher.handle_text("not json");

        assert_eq!(store.plugin("system_monitor"), Some(json!({"cpu": 1})));
        assert_eq!(store.widget("a").unwrap()["v"], json!(1));
        assert_eq!(store.widget("b").unwrap()["v"], json!(2));
    }

    #[test]
    fn notifications_are_deduplicated() {
        let (mut dispatcher, _store, _buffers, rx) = dispatcher();
        let message = json!({"notifications": [{"id": "n1", "message": "calibrated"}]});
        dispatcher.handle_text(&message.to_string());
        dispatcher.handle_text(&message.to_string());
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn dedup_set_clears_at_cap() {
        let (mut dispatcher, _store, _buffers, rx) = dispatcher();
        for i in 0..(NOTIFICATION_DEDUP_CAP - 1) {
            let message = json!({"notifications": [{"id": format!("n{i}"), "message": "m"}]});
            dispatcher.handle_text(&message.to_string());
        }
        assert_eq!(dispatcher.seen_count(), NOTIFICATION_DEDUP_CAP - 1);

        let notify = |dispatcher: &mut Dispatcher, id: &str| {
            let message = json!({"notifications": [{"id": id, "message": "m"}]});
            dispatcher.handle_text(&message.to_string());
        };

        // A repeat while below the cap is suppressed.
        notify(&mut dispatcher, "n0");
        assert_eq!(rx.try_iter().count(), NOTIFICATION_DEDUP_CAP - 1);

        notify(&mut dispatcher, "last");
        assert_eq!(dispatcher.seen_count(), 0);
        // After clearing, an old id surfaces again.
        notify(&mut dispatcher, "n0");
        assert_eq!(rx.try_iter().count(), 2);
    }
}
