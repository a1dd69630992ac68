use std::{
    io::ErrorKind,
    net::TcpStream,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;
use serde_json::Value;
use tungstenite::{Message, WebSocket, stream::MaybeTlsStream};

use super::{dispatch::Dispatcher, store::TelemetryStore};

pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Connected => ConnectionStatus::Connected,
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                ConnectionStatus::Disconnected
            }
        }
    }
}

/// Outbound wire shape: `{ target, payload: { cmd, args } }`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Command {
    pub target: String,
    pub payload: CommandPayload,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandPayload {
    pub cmd: String,
    pub args: Value,
}

impl Command {
    pub fn new(target: &str, cmd: &str, args: Value) -> Self {
        Self {
            target: target.to_string(),
            payload: CommandPayload {
                cmd: cmd.to_string(),
                args,
            },
        }
    }
}

/// Anything that can take a fire-and-forget command.
pub trait CommandSink {
    fn send_command(&self, command: Command);
}

/// Cloneable handle for issuing commands over the telemetry connection.
///
/// Commands are dropped, not queued, while the connection is not open.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: Sender<Command>,
    open: Arc<AtomicBool>,
}

impl CommandSink for CommandSender {
    fn send_command(&self, command: Command) {
        if !self.open.load(Ordering::SeqCst) {
            log::debug!(
                "dropping command {} for {}: not connected",
                command.payload.cmd,
                command.target
            );
            return;
        }
        let _ = self.tx.send(command);
    }
}

pub struct TelemetryConnection {
    sender: CommandSender,
    stop: Arc<AtomicBool>,
    _handle: thread::JoinHandle<()>,
}

impl TelemetryConnection {
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }
}

impl Drop for TelemetryConnection {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

pub fn start_telemetry(
    url: String,
    mut dispatcher: Dispatcher,
    store: Arc<TelemetryStore>,
) -> Result<TelemetryConnection> {
    let (tx, rx) = unbounded();
    let open = Arc::new(AtomicBool::new(false));
    let sender = CommandSender {
        tx,
        open: open.clone(),
    };
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::Builder::new()
        .name("telemetry".into())
        .spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                store.set_state(ConnectionState::Connecting);
                match tungstenite::connect(url.as_str()) {
                    Ok((mut socket, _response)) => {
                        log::info!("telemetry connected to {url}");
                        open.store(true, Ordering::SeqCst);
                        store.set_state(ConnectionState::Connected);
                        if let Err(err) =
                            run_socket(&mut socket, &mut dispatcher, &rx, &stop_flag)
                        {
                            log::warn!("telemetry connection lost: {err:#}");
                        }
                        open.store(false, Ordering::SeqCst);
                    }
                    Err(err) => log::warn!("telemetry connect to {url} failed: {err}"),
                }
                store.set_state(ConnectionState::Disconnected);

                // Commands accepted right before the drop are not replayed.
                for command in rx.try_iter() {
                    log::debug!("discarding unsent command {}", command.payload.cmd);
                }

                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                log::info!("telemetry reconnecting in {RECONNECT_DELAY:?}");
                sleep_unless_stopped(RECONNECT_DELAY, &stop_flag);
            }
        })
        .context("failed to spawn telemetry thread")?;

    Ok(TelemetryConnection {
        sender,
        stop,
        _handle: handle,
    })
}

fn run_socket(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    dispatcher: &mut Dispatcher,
    outbound: &Receiver<Command>,
    stop: &AtomicBool,
) -> Result<()> {
    // Short read timeout so outbound commands interleave with inbound traffic.
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream
            .set_read_timeout(Some(POLL_INTERVAL))
            .context("failed to set telemetry read timeout")?,
        _ => {}
    }

    loop {
        if stop.load(Ordering::Relaxed) {
            let _ = socket.close(None);
            return Ok(());
        }

        for command in outbound.try_iter() {
            let text = serde_json::to_string(&command).context("failed to encode command")?;
            socket
                .send(Message::Text(text))
                .context("failed to send command")?;
        }

        match socket.read() {
            Ok(Message::Text(text)) => dispatcher.handle_text(&text),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => dispatcher.handle_text(text),
                Err(_) => log::warn!("dropping non-UTF-8 binary telemetry message"),
            },
            Ok(Message::Close(_)) => return Ok(()),
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
            Err(err) => return Err(err.into()),
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
