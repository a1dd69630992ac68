//! Observable telemetry state.
//!
//! Named slots hold the last value written to them. Consumers subscribe to the
//! one slot they care about and drain their receiver on each tick.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde_json::Value;

use super::connection::{ConnectionState, ConnectionStatus};
use crate::types::CameraId;

pub const SYSTEM_MONITOR_SLOT: &str = "system_monitor";

pub fn camera_slot(camera_id: CameraId) -> String {
    format!("cam_{camera_id}")
}

#[derive(Debug)]
struct SlotMap<V> {
    values: HashMap<String, V>,
    subscribers: HashMap<String, Vec<Sender<V>>>,
}

impl<V> Default for SlotMap<V> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            subscribers: HashMap::new(),
        }
    }
}

impl<V: Clone> SlotMap<V> {
    fn publish(&mut self, key: &str, value: V) {
        if let Some(subscribers) = self.subscribers.get_mut(key) {
            subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        }
        self.values.insert(key.to_string(), value);
    }

    fn subscribe(&mut self, key: &str) -> Receiver<V> {
        let (tx, rx) = unbounded();
        if let Some(current) = self.values.get(key) {
            let _ = tx.send(current.clone());
        }
        self.subscribers.entry(key.to_string()).or_default().push(tx);
        rx
    }

    fn get(&self, key: &str) -> Option<V> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Default)]
pub struct TelemetryStore {
    plugins: Mutex<SlotMap<Value>>,
    widgets: Mutex<SlotMap<Value>>,
    state: Mutex<ConnectionState>,
    status_subscribers: Mutex<Vec<Sender<ConnectionStatus>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a plugin slot wholesale.
    pub fn publish_plugin(&self, slot: &str, data: Value) {
        lock(&self.plugins).publish(slot, data);
    }

    #[cfg(test)]
    pub fn plugin(&self, slot: &str) -> Option<Value> {
        lock(&self.plugins).get(slot)
    }

    pub fn subscribe_plugin(&self, slot: &str) -> Receiver<Value> {
        lock(&self.plugins).subscribe(slot)
    }

    /// Merges one widget by id; other widgets are untouched.
    pub fn merge_widget(&self, widget_id: &str, data: Value) {
        lock(&self.widgets).publish(widget_id, data);
    }

    #[cfg(test)]
    pub fn widget(&self, widget_id: &str) -> Option<Value> {
        lock(&self.widgets).get(widget_id)
    }

    pub fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = lock(&self.state);
            let changed = state.status() != next.status();
            *state = next;
            changed
        };
        if changed {
            let status = next.status();
            lock(&self.status_subscribers).retain(|tx| tx.send(status).is_ok());
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.state).status()
    }

    pub fn subscribe_status(&self) -> Receiver<ConnectionStatus> {
        let (tx, rx) = unbounded();
        let _ = tx.send(self.status());
        lock(&self.status_subscribers).push(tx);
        rx
    }

}

/// A camera announced by the system monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: CameraId,
    pub role: Option<String>,
}

impl CameraInfo {
    pub fn label(&self) -> String {
        match &self.role {
            Some(role) => format!("CAM {} ({role})", self.id),
            None => format!("CAM {}", self.id),
        }
    }
}

/// Cameras listed in a `system_monitor` snapshot, sorted by id. Falls back to
/// camera 0 when the snapshot names none.
pub fn cameras_from_monitor(monitor: Option<&Value>) -> Vec<CameraInfo> {
    let mut cameras: Vec<CameraInfo> = monitor
        .and_then(|data| data.get("cameras"))
        .and_then(Value::as_object)
        .map(|cameras| {
            cameras
                .iter()
                .filter_map(|(key, info)| {
                    Some(CameraInfo {
                        id: key.parse().ok()?,
                        role: info.get("role").and_then(Value::as_str).map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    if cameras.is_empty() {
        cameras.push(CameraInfo { id: 0, role: None });
    }
    cameras.sort_unstable_by_key(|camera| camera.id);
    cameras
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plugin_slots_are_last_write_wins() {
        let store = TelemetryStore::new();
        store.publish_plugin("calibration_widget", json!({"a": 1, "b": 2}));
        store.publish_plugin("calibration_widget", json!({"c": 3}));
        assert_eq!(store.plugin("calibration_widget"), Some(json!({"c": 3})));
    }

    #[test]
    fn subscribers_only_see_their_slot() {
        let store = TelemetryStore::new();
        let cam0 = store.subscribe_plugin(&camera_slot(0));
        store.publish_plugin(&camera_slot(1), json!({"x": 1}));
        store.publish_plugin(&camera_slot(0), json!({"x": 2}));
        let received: Vec<Value> = cam0.try_iter().collect();
        assert_eq!(received, vec![json!({"x": 2})]);
    }

    #[test]
    fn late_subscriber_gets_current_value() {
        let store = TelemetryStore::new();
        store.publish_plugin(SYSTEM_MONITOR_SLOT, json!({"fps": 30}));
        let rx = store.subscribe_plugin(SYSTEM_MONITOR_SLOT);
        assert_eq!(rx.try_recv().unwrap(), json!({"fps": 30}));
    }

    #[test]
    fn widgets_merge_by_id() {
        let store = TelemetryStore::new();
        store.merge_widget("fps", json!({"value": 30}));
        store.merge_widget("latency", json!({"value": 12}));
        store.merge_widget("fps", json!({"value": 25}));
        assert_eq!(store.widget("fps"), Some(json!({"value": 25})));
        assert_eq!(store.widget("latency"), Some(json!({"value": 12})));
    }

    #[test]
    fn status_notifies_on_change_only() {
        let store = TelemetryStore::new();
        let rx = store.subscribe_status();
        assert_eq!(rx.try_recv().unwrap(), ConnectionStatus::Disconnected);
        store.set_state(ConnectionState::Connecting);
        assert!(rx.try_recv().is_err());
        store.set_state(ConnectionState::Connected);
        assert_eq!(rx.try_recv().unwrap(), ConnectionStatus::Connected);
        store.set_state(ConnectionState::Disconnected);
        assert_eq!(rx.try_recv().unwrap(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn cameras_come_from_system_monitor() {
        let fallback = cameras_from_monitor(None);
        assert_eq!(fallback, vec![CameraInfo { id: 0, role: None }]);
        assert_eq!(fallback[0].label(), "CAM 0");

        let monitor = json!({"cameras": {"1": {"role": "side"}, "0": {"role": "front"}, "x": {}}});
        let cameras = cameras_from_monitor(Some(&monitor));
        let labels: Vec<String> = cameras.iter().map(CameraInfo::label).collect();
        assert_eq!(labels, vec!["CAM 0 (front)", "CAM 1 (side)"]);
    }
}
