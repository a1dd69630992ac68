use std::{
    io::{ErrorKind, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use thiserror::Error;

use super::{decode::decode_payload, demux::FrameDemuxer, latest::LatestFrame};
use crate::types::CameraId;

pub const RETRY_DELAY: Duration = Duration::from_secs(1);
const READ_CHUNK_SIZE: usize = 64 * 1024;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream cancelled")]
    Cancelled,
    #[error("frame stream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("frame stream read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame stream returned HTTP {0}")]
    Status(u16),
    #[error("frame stream ended")]
    Ended,
}

#[derive(Clone, Debug)]
pub struct StreamSettings {
    pub api_url: String,
    /// Per-read liveness timeout; `None` waits forever on a silent connection.
    pub stall_timeout: Option<Duration>,
}

pub fn frame_feed_url(api_url: &str, camera_id: CameraId) -> String {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!(
        "{}/video_feed/{camera_id}?t={nonce}",
        api_url.trim_end_matches('/')
    )
}

#[derive(Debug)]
pub struct CameraStream {
    camera_id: CameraId,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    /// Signals the worker and returns without waiting for the blocking read to unwind.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Detach: the worker exits at its next read and its frames are rejected by
        // the generation guard in the meantime.
        drop(self.handle.take());
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

pub fn start_camera_stream(
    camera_id: CameraId,
    settings: &StreamSettings,
    latest: LatestFrame,
) -> Result<CameraStream> {
    let client = Client::builder()
        .timeout(settings.stall_timeout)
        .build()
        .context("failed to build frame stream client")?;

    let generation = latest.begin_generation();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let api_url = settings.api_url.clone();

    let handle = thread::Builder::new()
        .name(format!("frame-stream-{camera_id}"))
        .spawn(move || {
            let mut demuxer = FrameDemuxer::new();
            let session = Session {
                camera_id,
                generation,
                latest: &latest,
                stop: &stop_flag,
            };
            while !stop_flag.load(Ordering::Relaxed) {
                let url = frame_feed_url(&api_url, camera_id);
                match run_session(&client, &url, &mut demuxer, &session) {
                    StreamError::Cancelled => {
                        log::info!("stream {camera_id} cancelled");
                        break;
                    }
                    err => {
                        log::warn!("stream {camera_id} error: {err}; retrying in {RETRY_DELAY:?}");
                        sleep_unless_stopped(RETRY_DELAY, &stop_flag);
                    }
                }
            }
        })
        .context("failed to spawn frame stream thread")?;

    Ok(CameraStream {
        camera_id,
        stop,
        handle: Some(handle),
    })
}

/// Identity of one worker's publishing session.
pub(crate) struct Session<'a> {
    camera_id: CameraId,
    generation: u64,
    latest: &'a LatestFrame,
    stop: &'a AtomicBool,
}

fn run_session(
    client: &Client,
    url: &str,
    demuxer: &mut FrameDemuxer,
    session: &Session<'_>,
) -> StreamError {
    let camera_id = session.camera_id;
    let response = match client.get(url).send() {
        Ok(response) => response,
        Err(err) if session.stop.load(Ordering::Relaxed) => {
            log::debug!("stream {camera_id} request ended during cancel: {err}");
            return StreamError::Cancelled;
        }
        Err(err) => return err.into(),
    };
    if !response.status().is_success() {
        return StreamError::Status(response.status().as_u16());
    }

    log::info!("stream {camera_id} opened at {url}");
    pump_frames(response, demuxer, session)
}

/// Feeds the byte stream through the demuxer until it fails or is cancelled.
/// The demuxer is reset first; bytes left from a broken connection are dropped.
pub(crate) fn pump_frames<R: Read>(
    mut reader: R,
    demuxer: &mut FrameDemuxer,
    session: &Session<'_>,
) -> StreamError {
    let Session {
        camera_id,
        generation,
        latest,
        stop,
    } = *session;
    demuxer.reset();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        if stop.load(Ordering::Relaxed) {
            return StreamError::Cancelled;
        }

        let read = match reader.read(&mut chunk) {
            Ok(0) => return StreamError::Ended,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(_) if stop.load(Ordering::Relaxed) => return StreamError::Cancelled,
            Err(err) => return err.into(),
        };

        for payload in demuxer.push(&chunk[..read]) {
            if stop.load(Ordering::Relaxed) {
                return StreamError::Cancelled;
            }
            match decode_payload(camera_id, &payload) {
                Ok(frame) => {
                    if !latest.publish(generation, frame) {
                        return StreamError::Cancelled;
                    }
                }
                Err(err) => {
                    log::debug!(
                        "skipping undecodable frame {} on camera {camera_id}: {err:#}",
                        payload.frame_id
                    );
                }
            }
        }
    }
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let step = remaining.min(STOP_POLL_INTERVAL);
        thread::sleep(step);
        remaining -= step;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::stream::{decode::encode_test_jpeg, demux::encode_frame};

    fn pump(
        stream: Vec<u8>,
        camera_id: CameraId,
        generation: u64,
        latest: &LatestFrame,
        stop: &AtomicBool,
    ) -> StreamError {
        let session = Session {
            camera_id,
            generation,
            latest,
            stop,
        };
        pump_frames(Cursor::new(stream), &mut FrameDemuxer::new(), &session)
    }

    #[test]
    fn pumps_valid_frames_and_skips_corrupt_ones() {
        let mut stream = encode_frame(1, &encode_test_jpeg(8, 8, [10, 20, 30]));
        stream.extend(encode_frame(2, b"not a jpeg at all"));
        stream.extend(encode_frame(3, &encode_test_jpeg(4, 2, [200, 200, 200])));

        let latest = LatestFrame::new();
        let generation = latest.begin_generation();
        let stop = AtomicBool::new(false);
        let err = pump(stream, 5, generation, &latest, &stop);

        assert!(matches!(err, StreamError::Ended));
        let frame = latest.current().unwrap();
        assert_eq!(frame.frame_id, 3);
        assert_eq!(frame.camera_id, 5);
        assert_eq!((frame.width, frame.height), (4, 2));
    }

    #[test]
    fn stop_flag_reports_cancellation() {
        let stream = encode_frame(1, &encode_test_jpeg(8, 8, [0, 0, 0]));
        let latest = LatestFrame::new();
        let generation = latest.begin_generation();
        let stop = AtomicBool::new(true);
        let err = pump(stream, 0, generation, &latest, &stop);
        assert!(matches!(err, StreamError::Cancelled));
        assert!(latest.current().is_none());
    }

    #[test]
    fn superseded_session_stops_publishing() {
        let stream = encode_frame(1, &encode_test_jpeg(8, 8, [0, 0, 0]));
        let latest = LatestFrame::new();
        let stale = latest.begin_generation();
        latest.begin_generation();
        let stop = AtomicBool::new(false);
        let err = pump(stream, 0, stale, &latest, &stop);
        assert!(matches!(err, StreamError::Cancelled));
        assert!(latest.current().is_none());
    }

    #[test]
    fn reconnect_discards_partial_frame() {
        let latest = LatestFrame::new();
        let stop = AtomicBool::new(false);
        let session = Session {
            camera_id: 0,
            generation: latest.begin_generation(),
            latest: &latest,
            stop: &stop,
        };
        let mut demuxer = FrameDemuxer::new();

        let mut truncated = encode_frame(1, &encode_test_jpeg(8, 8, [0, 0, 0]));
        truncated.truncate(40);
        let err = pump_frames(Cursor::new(truncated), &mut demuxer, &session);
        assert!(matches!(err, StreamError::Ended));
        assert!(latest.current().is_none());

        let fresh = encode_frame(2, &encode_test_jpeg(4, 4, [90, 90, 90]));
        let err = pump_frames(Cursor::new(fresh), &mut demuxer, &session);
        assert!(matches!(err, StreamError::Ended));
        assert_eq!(latest.current().unwrap().frame_id, 2);
    }

    #[test]
    fn feed_url_targets_camera_endpoint() {
        let url = frame_feed_url("http://localhost:8000/", 3);
        assert!(url.starts_with("http://localhost:8000/video_feed/3?t="));
    }
}
