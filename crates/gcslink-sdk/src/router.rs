//! Background task that owns the read half of the link.
//!
//! The router decodes every datagram, folds each message into the
//! telemetry snapshot and only then publishes it on the inbound queue, so
//! telemetry is never older than anything a waiter has seen. It is the
//! only task that reads the transport and the only writer of telemetry
//! while a link is up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gcslink_models::{frame, Inbound, Telemetry};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::error::SdkError;
use crate::transport::LinkReader;

/// Lifecycle of the router task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RouterState {
    /// No link has been opened yet.
    Idle,
    /// Reading and dispatching.
    Running,
    /// Asked to stop; exits at the next check.
    Stopping,
    /// Task has exited.
    Stopped,
}

/// Facts the session learns outside the inbound stream and hands to the
/// router so telemetry keeps a single writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouterNote {
    /// A mission upload was accepted with this many items.
    MissionUploaded { count: u16 },
}

/// Shared handles the router writes to.
#[derive(Clone)]
pub(crate) struct RouterOutputs {
    pub telemetry: Arc<watch::Sender<Telemetry>>,
    pub inbound: broadcast::Sender<Inbound>,
    pub state: Arc<watch::Sender<RouterState>>,
}

/// The read loop of one link.
pub(crate) struct MessageRouter {
    reader: LinkReader,
    outputs: RouterOutputs,
    notes: mpsc::UnboundedReceiver<RouterNote>,
    poll_interval: Duration,
}

impl MessageRouter {
    pub(crate) fn new(
        reader: LinkReader,
        outputs: RouterOutputs,
        notes: mpsc::UnboundedReceiver<RouterNote>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            reader,
            outputs,
            notes,
            poll_interval,
        }
    }

    /// Decode a datagram, update telemetry, then enqueue each message.
    pub(crate) fn dispatch(&self, datagram: &[u8]) {
        for (header, message) in frame::decode_datagram(datagram) {
            let Some(inbound) = Inbound::from_frame(&header, &message) else {
                trace!(system = header.system_id, "ignored message kind");
                continue;
            };
            self.outputs.telemetry.send_modify(|t| {
                t.apply(&inbound);
                t.last_update = Some(Utc::now());
            });
            // No receivers just means no exchange is in flight.
            let _ = self.outputs.inbound.send(inbound);
        }
    }

    fn apply_note(&self, note: RouterNote) {
        match note {
            RouterNote::MissionUploaded { count } => {
                self.outputs
                    .telemetry
                    .send_modify(|t| t.total_mission_points = Some(count));
            }
        }
    }

    fn running(&self) -> bool {
        *self.outputs.state.borrow() == RouterState::Running
    }

    /// Run until asked to stop or the link closes.
    ///
    /// The session moves the state to `Running` before spawning this task.
    pub(crate) async fn run(mut self) {
        info!(poll_interval = ?self.poll_interval, "router running");
        let mut stop = self.outputs.state.subscribe();

        while self.running() {
            tokio::select! {
                received = tokio::time::timeout(self.poll_interval, self.reader.recv()) => {
                    match received {
                        Err(_) => continue,
                        Ok(Ok(datagram)) => self.dispatch(&datagram),
                        Ok(Err(SdkError::LinkClosed)) => {
                            warn!("link closed by peer");
                            break;
                        }
                        Ok(Err(e)) => warn!(error = %e, "receive failed"),
                    }
                }
                Some(note) = self.notes.recv() => {
                    debug!(?note, "router note");
                    self.apply_note(note);
                }
                _ = stop.changed() => {}
            }
        }

        self.outputs.state.send_replace(RouterState::Stopped);
        info!("router stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use gcslink_models::VehicleMessage;
    use mavlink::common::{
        MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, ATTITUDE_DATA, HEARTBEAT_DATA,
    };
    use mavlink::MavHeader;

    fn make_outputs() -> RouterOutputs {
        RouterOutputs {
            telemetry: Arc::new(watch::channel(Telemetry::default()).0),
            inbound: broadcast::channel(16).0,
            state: Arc::new(watch::channel(RouterState::Running).0),
        }
    }

    fn frame_of(message: &MavMessage) -> Vec<u8> {
        let header = MavHeader {
            system_id: 1,
            component_id: 1,
            sequence: 0,
        };
        frame::encode(header, message).unwrap()
    }

    fn attitude(roll: f32) -> MavMessage {
        MavMessage::ATTITUDE(ATTITUDE_DATA {
            roll,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn telemetry_is_updated_before_enqueue() {
        let (transport, peer) = Transport::loopback();
        let (reader, _writer) = transport.into_split();
        let outputs = make_outputs();
        let mut inbound = outputs.inbound.subscribe();
        let telemetry = outputs.telemetry.subscribe();
        let (_notes_tx, notes_rx) = mpsc::unbounded_channel();
        let router = MessageRouter::new(reader, outputs, notes_rx, Duration::from_millis(20));

        let heartbeat = MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 3,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            autopilot: MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
            system_status: MavState::MAV_STATE_STANDBY,
            mavlink_version: 3,
        });
        router.dispatch(&frame_of(&heartbeat));

        let received = inbound.recv().await.unwrap();
        assert!(matches!(received.message, VehicleMessage::Heartbeat(_)));
        assert_eq!(telemetry.borrow().mode.as_deref(), Some("AUTO"));
        assert!(telemetry.borrow().last_update.is_some());
        drop(peer);
    }

    #[tokio::test]
    async fn stops_on_request_and_on_closed_link() {
        let (transport, peer) = Transport::loopback();
        let (reader, _writer) = transport.into_split();
        let outputs = make_outputs();
        let state = outputs.state.clone();
        let telemetry = outputs.telemetry.subscribe();
        let (notes_tx, notes_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(
            MessageRouter::new(reader, outputs, notes_rx, Duration::from_millis(20)).run(),
        );

        peer.to_ground.send(frame_of(&attitude(0.25))).unwrap();
        notes_tx
            .send(RouterNote::MissionUploaded { count: 4 })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(telemetry.borrow().roll, Some(0.25));
        assert_eq!(telemetry.borrow().total_mission_points, Some(4));

        state.send_replace(RouterState::Stopping);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*state.borrow(), RouterState::Stopped);

        let (transport, peer) = Transport::loopback();
        let (reader, _writer) = transport.into_split();
        let outputs = make_outputs();
        let state = outputs.state.clone();
        let (_notes_tx, notes_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(
            MessageRouter::new(reader, outputs, notes_rx, Duration::from_millis(20)).run(),
        );
        drop(peer);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*state.borrow(), RouterState::Stopped);
    }
}
