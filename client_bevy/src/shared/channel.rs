use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
#[cfg(any(test, not(target_arch = "wasm32")))]
use std::sync::mpsc::Sender;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use bevy::log::warn;
use bevy::prelude::{Deref, DerefMut, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

use vstage_shared::protocol::{AvatarPoseWire, CameraPoseWire};

use super::types::ConnectionState;

/// Lifecycle and payload events surfaced by a socket channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent<In> {
    Connected,
    Disconnected,
    Message(In),
}

#[cfg(not(target_arch = "wasm32"))]
type NativeCmdSender<Out> = tokio::sync::mpsc::UnboundedSender<Out>;

/// A reconnecting WebSocket channel.
///
/// Owns a background thread that keeps one connection to a URL alive,
/// reopening it after a fixed delay on every close or error, indefinitely,
/// with no attempt cap. Inbound JSON text frames decode into `In` and queue
/// for [`SocketChannel::poll_events`]; [`SocketChannel::send`] serializes an
/// `Out` for the writer half. Sends while disconnected are dropped.
pub struct SocketChannel<In, Out> {
    pub label: &'static str,
    pub state: ConnectionState,

    /// Written by the socket thread; gates [`SocketChannel::send`] so a
    /// pose sent during an outage is never queued for replay.
    connected: Arc<AtomicBool>,

    event_rx: Mutex<Receiver<ChannelEvent<In>>>,

    #[cfg(not(target_arch = "wasm32"))]
    cmd_tx: Option<NativeCmdSender<Out>>,
    #[cfg(target_arch = "wasm32")]
    _out: std::marker::PhantomData<Out>,
}

impl<In, Out> SocketChannel<In, Out>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    pub fn connect(label: &'static str, url: String, reconnect_delay: Duration) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent<In>>();
        let connected = Arc::new(AtomicBool::new(false));

        #[cfg(not(target_arch = "wasm32"))]
        let cmd_tx = Some(spawn_socket_thread::<In, Out>(
            label,
            url,
            reconnect_delay,
            event_tx,
            Arc::clone(&connected),
        ));

        #[cfg(target_arch = "wasm32")]
        {
            let _ = (url, reconnect_delay, event_tx);
        }

        Self {
            label,
            state: ConnectionState::Connecting,
            connected,
            event_rx: Mutex::new(event_rx),
            #[cfg(not(target_arch = "wasm32"))]
            cmd_tx,
            #[cfg(target_arch = "wasm32")]
            _out: std::marker::PhantomData,
        }
    }

    pub fn poll_events(&mut self) -> Vec<ChannelEvent<In>> {
        let mut out = Vec::new();
        if let Ok(rx) = self.event_rx.lock() {
            while let Ok(evt) = rx.try_recv() {
                out.push(evt);
            }
        }
        out
    }

    pub fn send(&self, msg: Out) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            if !self.connected.load(Ordering::Relaxed) {
                return;
            }
            if let Some(tx) = &self.cmd_tx {
                let _ = tx.send(msg);
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let _ = msg;
        }
    }

    /// Builds a channel with no socket thread, plus the sender that feeds
    /// its event queue.
    #[cfg(test)]
    pub fn test_stub_with_sender(label: &'static str) -> (Self, Sender<ChannelEvent<In>>) {
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent<In>>();
        (
            Self {
                label,
                state: ConnectionState::Connecting,
                connected: Arc::new(AtomicBool::new(false)),
                event_rx: Mutex::new(event_rx),
                #[cfg(not(target_arch = "wasm32"))]
                cmd_tx: None,
                #[cfg(target_arch = "wasm32")]
                _out: std::marker::PhantomData,
            },
            event_tx,
        )
    }
}

/// Decodes one inbound text frame. A frame that fails to decode is logged
/// and dropped; it must never take the connection or the handler down.
#[cfg(not(target_arch = "wasm32"))]
fn decode_frame<In: DeserializeOwned>(label: &str, raw: &str) -> Option<In> {
    match serde_json::from_str(raw) {
        Ok(msg) => Some(msg),
        Err(err) => {
            warn!("{label}: dropping undecodable frame: {err}");
            None
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_socket_thread<In, Out>(
    label: &'static str,
    url: String,
    reconnect_delay: Duration,
    event_tx: Sender<ChannelEvent<In>>,
    connected: Arc<AtomicBool>,
) -> NativeCmdSender<Out>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<Out>();

    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                warn!("{label}: failed to build socket runtime: {err}");
                return;
            }
        };

        rt.block_on(async move {
            loop {
                let connect = tokio_tungstenite::connect_async(url.as_str()).await;

                let (ws_stream, _) = match connect {
                    Ok(x) => x,
                    Err(_) => {
                        tokio::time::sleep(reconnect_delay).await;
                        continue;
                    }
                };

                // Anything that raced into the queue during the outage is
                // stale; it must not replay on the fresh connection.
                while cmd_rx.try_recv().is_ok() {}
                connected.store(true, Ordering::Relaxed);

                if event_tx.send(ChannelEvent::Connected).is_err() {
                    return;
                }

                let (mut write, mut read) = ws_stream.split();

                loop {
                    tokio::select! {
                        biased;

                        Some(cmd) = cmd_rx.recv() => {
                            if let Ok(text) = serde_json::to_string(&cmd) {
                                if write.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                        }

                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(txt))) => {
                                    if let Some(decoded) = decode_frame::<In>(label, &txt) {
                                        let _ = event_tx.send(ChannelEvent::Message(decoded));
                                    }
                                }
                                Some(Ok(Message::Close(_))) => break,
                                Some(Ok(_)) => {}
                                Some(Err(_)) => break,
                                None => break,
                            }
                        }
                    }
                }

                connected.store(false, Ordering::Relaxed);
                if event_tx.send(ChannelEvent::Disconnected).is_err() {
                    return;
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        });
    });

    cmd_tx
}

/// Camera pose channel: poses flow both ways.
#[derive(Resource, Deref, DerefMut)]
pub struct CameraChannel(pub SocketChannel<CameraPoseWire, CameraPoseWire>);

/// Avatar pose channel: inbound only.
#[derive(Resource, Deref, DerefMut)]
pub struct PoseChannel(pub SocketChannel<AvatarPoseWire, ()>);

#[cfg(test)]
mod tests {
    use super::*;

    use vstage_shared::protocol::Vec3Wire;

    #[test]
    fn stub_channel_delivers_events_in_order() {
        let (mut channel, tx) =
            SocketChannel::<CameraPoseWire, CameraPoseWire>::test_stub_with_sender("camera");
        tx.send(ChannelEvent::Connected).unwrap();
        tx.send(ChannelEvent::Message(CameraPoseWire {
            position: Vec3Wire::new(1.0, 2.0, 3.0),
            target: Vec3Wire::new(0.0, 0.0, 0.0),
        }))
        .unwrap();
        tx.send(ChannelEvent::Disconnected).unwrap();

        let events = channel.poll_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ChannelEvent::Connected));
        assert!(matches!(events[1], ChannelEvent::Message(_)));
        assert!(matches!(events[2], ChannelEvent::Disconnected));

        // Draining leaves the queue empty.
        assert!(channel.poll_events().is_empty());
    }

    #[test]
    fn send_without_socket_is_a_no_op() {
        let (channel, _tx) =
            SocketChannel::<CameraPoseWire, CameraPoseWire>::test_stub_with_sender("camera");
        channel.send(CameraPoseWire {
            position: Vec3Wire::new(0.0, 0.0, 0.0),
            target: Vec3Wire::new(0.0, 0.0, 0.0),
        });
    }

    fn pose(x: f64) -> CameraPoseWire {
        CameraPoseWire {
            position: Vec3Wire::new(x, 0.0, 0.0),
            target: Vec3Wire::new(0.0, 1.0, 0.0),
        }
    }

    #[test]
    fn sends_while_disconnected_are_dropped_not_queued() {
        let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel::<CameraPoseWire>();
        let (_event_tx, event_rx) = mpsc::channel();
        let channel = SocketChannel::<CameraPoseWire, CameraPoseWire> {
            label: "camera",
            state: ConnectionState::Connecting,
            connected: Arc::new(AtomicBool::new(false)),
            event_rx: Mutex::new(event_rx),
            cmd_tx: Some(cmd_tx),
        };

        // Never connected: nothing may reach the writer queue.
        channel.send(pose(1.0));
        assert!(cmd_rx.try_recv().is_err());

        channel.connected.store(true, Ordering::Relaxed);
        channel.send(pose(2.0));
        let delivered = cmd_rx.try_recv().unwrap();
        assert!((delivered.position.x - 2.0).abs() < 1e-12);

        // Connection lost again: sends go back to being dropped.
        channel.connected.store(false, Ordering::Relaxed);
        channel.send(pose(3.0));
        assert!(cmd_rx.try_recv().is_err());
    }

    #[test]
    fn closed_socket_reconnects_after_the_configured_delay() {
        use std::time::Instant;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let delay = Duration::from_millis(200);
            let mut channel = SocketChannel::<CameraPoseWire, CameraPoseWire>::connect(
                "camera",
                format!("ws://{addr}/client/camera"),
                delay,
            );

            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let closed_at = Instant::now();
            drop(ws);

            // One new attempt, no sooner than the configured delay.
            let (stream, _) = listener.accept().await.unwrap();
            assert!(closed_at.elapsed() >= delay);
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            drop(ws);

            // And again after the next closure; the delay does not grow.
            let (stream, _) = listener.accept().await.unwrap();
            assert!(closed_at.elapsed() >= delay * 2);
            let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let connects = channel
                .poll_events()
                .iter()
                .filter(|evt| matches!(evt, ChannelEvent::Connected))
                .count();
            assert!(connects >= 2);
        });
    }

    #[test]
    fn bad_frame_is_dropped_and_next_valid_frame_decodes() {
        assert!(decode_frame::<AvatarPoseWire>("pose", "{garbage").is_none());
        assert!(decode_frame::<AvatarPoseWire>("pose", "[1,2,3]").is_none());

        let decoded = decode_frame::<AvatarPoseWire>(
            "pose",
            r#"{"bones":{"hips":{"rotation":{"x":0,"y":0,"z":0,"w":1}}}}"#,
        );
        assert!(decoded.is_some());
        assert_eq!(decoded.unwrap().bones.len(), 1);
    }
}
