//! Vehicle session: one link, one router, one telemetry snapshot.
//!
//! [`VehicleSession`] owns at most one live transport. Connecting waits for
//! an autopilot heartbeat, then hands the read half to a background
//! [`MessageRouter`](crate::router) task; every service sends through the
//! session and waits for replies through an [`Exchange`].
//!
//! # Typical usage
//!
//! ```rust,no_run
//! use gcslink_sdk::{SessionConfig, VehicleSession};
//!
//! # async fn run() -> Result<(), gcslink_sdk::SdkError> {
//! let session = VehicleSession::new(SessionConfig::from_env());
//! session.connect("udpin:0.0.0.0:14550").await?;
//!
//! println!("mode: {:?}", session.telemetry().mode);
//! session.set_mode("GUIDED").await?;
//! session.arm().await?;
//! session.takeoff(10.0).await?;
//!
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gcslink_models::{
    frame, Inbound, MissionItem, MissionType, ParamId, ParamValue, Telemetry, Waypoint,
};
use mavlink::common::{
    MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA,
};
use mavlink::MavHeader;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{CommandService, ModeSelector};
use crate::config::SessionConfig;
use crate::endpoint::Endpoint;
use crate::error::SdkError;
use crate::mission::MissionTransfer;
use crate::param::ParameterService;
use crate::router::{MessageRouter, RouterNote, RouterOutputs, RouterState};
use crate::transport::{LinkReader, LinkWriter, Transport};
use crate::waiter::{Exchange, Matcher};

/// Bound on waiting for an aborted router to unwind.
const ABORT_GRACE: Duration = Duration::from_millis(250);

/// MAVLink address of the vehicle we are talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// System id.
    pub system_id: u8,
    /// Component id.
    pub component_id: u8,
}

// ------------------------------------------------------------------
// Framing
// ------------------------------------------------------------------

/// Stamps outbound messages with our address and a wrapping sequence.
#[derive(Debug, Clone)]
struct Framer {
    system_id: u8,
    component_id: u8,
    sequence: Arc<AtomicU8>,
}

impl Framer {
    fn frame(&self, message: &MavMessage) -> Result<Vec<u8>, SdkError> {
        let header = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        Ok(frame::encode(header, message)?)
    }
}

/// Everything that exists only while connected.
struct ActiveLink {
    description: String,
    target: Target,
    writer: Arc<LinkWriter>,
    notes: mpsc::UnboundedSender<RouterNote>,
    router: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl ActiveLink {
    fn is_live(&self) -> bool {
        !self.router.is_finished()
    }
}

// ------------------------------------------------------------------
// VehicleSession
// ------------------------------------------------------------------

/// A ground-station session with one vehicle.
///
/// All methods take `&self`; share the session behind an `Arc` to use it
/// from several tasks.
pub struct VehicleSession {
    config: SessionConfig,
    framer: Framer,
    telemetry: Arc<watch::Sender<Telemetry>>,
    inbound: broadcast::Sender<Inbound>,
    router_state: Arc<watch::Sender<RouterState>>,
    exchange_token: Mutex<()>,
    link: Mutex<Option<ActiveLink>>,
}

impl VehicleSession {
    /// Create a disconnected session.
    pub fn new(config: SessionConfig) -> Self {
        let framer = Framer {
            system_id: config.source_system,
            component_id: config.source_component,
            sequence: Arc::new(AtomicU8::new(0)),
        };
        let (inbound, _) = broadcast::channel(config.queue_capacity.max(1));
        Self {
            framer,
            telemetry: Arc::new(watch::channel(Telemetry::default()).0),
            inbound,
            router_state: Arc::new(watch::channel(RouterState::Idle).0),
            exchange_token: Mutex::new(()),
            link: Mutex::new(None),
            config,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open `uri` and wait for the vehicle's heartbeat.
    ///
    /// Does nothing if a link is already up.
    pub async fn connect(&self, uri: &str) -> Result<(), SdkError> {
        if self.is_connected().await {
            debug!(endpoint = uri, "already connected");
            return Ok(());
        }
        let endpoint: Endpoint = uri.parse()?;
        let transport = Transport::open(&endpoint).await?;
        self.connect_transport(transport).await
    }

    /// Take over an already open transport and wait for a heartbeat on it.
    ///
    /// Does nothing (and drops `transport`) if a link is already up.
    pub async fn connect_transport(&self, transport: Transport) -> Result<(), SdkError> {
        let mut link = self.link.lock().await;
        match link.take() {
            Some(active) if active.is_live() => {
                debug!(endpoint = transport.description(), "already connected");
                *link = Some(active);
                return Ok(());
            }
            Some(stale) => {
                debug!(endpoint = %stale.description, "replacing closed link");
                self.shut_down(stale).await;
            }
            None => {}
        }

        let description = transport.description().to_string();
        let (mut reader, writer) = transport.into_split();
        info!(endpoint = %description, timeout = ?self.config.heartbeat_timeout, "waiting for heartbeat");

        let (datagram, target) =
            tokio::time::timeout(self.config.heartbeat_timeout, first_heartbeat(&mut reader))
                .await
                .map_err(|_| SdkError::Connect {
                    endpoint: description.clone(),
                    timeout: self.config.heartbeat_timeout,
                })??;

        let (notes, notes_rx) = mpsc::unbounded_channel();
        let router = MessageRouter::new(
            reader,
            RouterOutputs {
                telemetry: Arc::clone(&self.telemetry),
                inbound: self.inbound.clone(),
                state: Arc::clone(&self.router_state),
            },
            notes_rx,
            self.config.poll_interval,
        );
        router.dispatch(&datagram);
        self.router_state.send_replace(RouterState::Running);
        let router = tokio::spawn(router.run());

        let writer = Arc::new(writer);
        let heartbeat = self.config.gcs_heartbeat_interval.map(|interval| {
            tokio::spawn(gcs_heartbeat(
                Arc::clone(&writer),
                self.framer.clone(),
                interval,
            ))
        });

        info!(
            endpoint = %description,
            system = target.system_id,
            component = target.component_id,
            "connected"
        );
        *link = Some(ActiveLink {
            description,
            target,
            writer,
            notes,
            router,
            heartbeat,
        });
        Ok(())
    }

    /// Stop the router, close the link and clear telemetry.
    ///
    /// Does nothing if not connected. Exchanges still waiting run on to
    /// their own deadline.
    pub async fn disconnect(&self) -> Result<(), SdkError> {
        let Some(active) = self.link.lock().await.take() else {
            return Ok(());
        };
        let description = active.description.clone();
        self.shut_down(active).await;
        info!(endpoint = %description, "disconnected");
        Ok(())
    }

    /// Stop the tasks of `active` and clear telemetry.
    ///
    /// The router gets `join_timeout` to stop on its own. After that it is
    /// aborted, and telemetry is only cleared once the task is gone so a
    /// late dispatch cannot repopulate it.
    async fn shut_down(&self, active: ActiveLink) {
        if let Some(heartbeat) = active.heartbeat {
            heartbeat.abort();
        }
        let mut router = active.router;
        if !router.is_finished() {
            self.router_state.send_replace(RouterState::Stopping);
            if tokio::time::timeout(self.config.join_timeout, &mut router)
                .await
                .is_err()
            {
                warn!(timeout = ?self.config.join_timeout, "router did not stop in time, aborting");
                router.abort();
                if tokio::time::timeout(ABORT_GRACE, &mut router)
                    .await
                    .is_err()
                {
                    warn!("aborted router still running");
                }
            }
        }
        self.router_state.send_replace(RouterState::Stopped);
        self.telemetry.send_replace(Telemetry::default());
    }

    /// Whether a link is up.
    ///
    /// A link whose router has exited (the transport closed under it) no
    /// longer counts; the next `connect` replaces it.
    pub async fn is_connected(&self) -> bool {
        self.link
            .lock()
            .await
            .as_ref()
            .is_some_and(ActiveLink::is_live)
    }

    /// Current router lifecycle state.
    pub fn router_state(&self) -> RouterState {
        *self.router_state.borrow()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The configuration this session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Address of the connected vehicle.
    pub async fn target(&self) -> Result<Target, SdkError> {
        self.link
            .lock()
            .await
            .as_ref()
            .map(|l| l.target)
            .ok_or(SdkError::NotConnected)
    }

    /// Copy of the current telemetry snapshot.
    pub fn telemetry(&self) -> Telemetry {
        self.telemetry.borrow().clone()
    }

    /// Receiver notified on every telemetry change.
    pub fn subscribe_telemetry(&self) -> watch::Receiver<Telemetry> {
        self.telemetry.subscribe()
    }

    // ------------------------------------------------------------------
    // Sending and waiting
    // ------------------------------------------------------------------

    /// Write one raw datagram to the vehicle.
    pub async fn send_raw(&self, datagram: &[u8]) -> Result<(), SdkError> {
        let writer = self
            .link
            .lock()
            .await
            .as_ref()
            .map(|l| Arc::clone(&l.writer))
            .ok_or(SdkError::NotConnected)?;
        writer.send(datagram).await
    }

    /// Frame and send one message.
    pub async fn send(&self, message: &MavMessage) -> Result<(), SdkError> {
        let datagram = self.framer.frame(message)?;
        self.send_raw(&datagram).await
    }

    /// Start a request/response exchange.
    ///
    /// Waits until no other exchange is in flight. Subscribe first, then
    /// send the request, then wait for the reply.
    pub async fn exchange(&self) -> Exchange<'_> {
        let token = self.exchange_token.lock().await;
        Exchange::new(token, self.inbound.subscribe())
    }

    pub(crate) async fn note(&self, note: RouterNote) {
        if let Some(active) = self.link.lock().await.as_ref() {
            // A stopped router has nothing left to update.
            let _ = active.notes.send(note);
        }
    }

    // ------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------

    /// Mission, fence and rally transfers.
    pub fn missions(&self) -> MissionTransfer<'_> {
        MissionTransfer::new(self)
    }

    /// Parameter reads and writes.
    pub fn params(&self) -> ParameterService<'_> {
        ParameterService::new(self)
    }

    /// Arm, disarm, takeoff and mode changes.
    pub fn commands(&self) -> CommandService<'_> {
        CommandService::new(self)
    }

    // ------------------------------------------------------------------
    // Shortcuts
    // ------------------------------------------------------------------

    /// Arm the motors.
    pub async fn arm(&self) -> Result<(), SdkError> {
        self.commands().arm().await
    }

    /// Disarm the motors.
    pub async fn disarm(&self) -> Result<(), SdkError> {
        self.commands().disarm().await
    }

    /// Take off to `altitude` metres from the current position.
    pub async fn takeoff(&self, altitude: f32) -> Result<(), SdkError> {
        self.commands().takeoff(altitude).await
    }

    /// Change flight mode by name or number.
    pub async fn set_mode(&self, mode: impl Into<ModeSelector>) -> Result<u32, SdkError> {
        self.commands().set_mode(mode).await
    }

    /// Upload a waypoint mission.
    pub async fn upload_mission(&self, waypoints: &[Waypoint]) -> Result<(), SdkError> {
        self.missions()
            .upload_waypoints(MissionType::Mission, waypoints)
            .await
    }

    /// Upload an inclusion fence polygon.
    pub async fn upload_fence(&self, vertices: &[Waypoint]) -> Result<(), SdkError> {
        self.missions()
            .upload_waypoints(MissionType::Fence, vertices)
            .await
    }

    /// Upload rally points.
    pub async fn upload_rally(&self, points: &[Waypoint]) -> Result<(), SdkError> {
        self.missions()
            .upload_waypoints(MissionType::Rally, points)
            .await
    }

    /// Upload prepared items to one store.
    pub async fn upload_items(
        &self,
        items: &[MissionItem],
        mission_type: MissionType,
    ) -> Result<(), SdkError> {
        self.missions().upload(items, mission_type).await
    }

    /// Download one item store.
    pub async fn download_items(
        &self,
        mission_type: MissionType,
    ) -> Result<Vec<MissionItem>, SdkError> {
        self.missions().download(mission_type).await
    }

    /// Read a parameter.
    pub async fn get_param(&self, id: &ParamId) -> Result<ParamValue, SdkError> {
        self.params().get(id).await
    }

    /// Write a parameter and return the value the vehicle echoed.
    pub async fn set_param(&self, id: &ParamId, value: f32) -> Result<f32, SdkError> {
        self.params().set(id, value).await
    }
}

// ------------------------------------------------------------------
// Tasks
// ------------------------------------------------------------------

/// Read until an autopilot heartbeat arrives; return its datagram and
/// sender.
async fn first_heartbeat(reader: &mut LinkReader) -> Result<(Vec<u8>, Target), SdkError> {
    loop {
        let datagram = reader.recv().await?;
        let sender = frame::decode_datagram(&datagram)
            .iter()
            .filter_map(|(header, message)| Inbound::from_frame(header, message))
            .find(|inbound| Matcher::Heartbeat.matches(&inbound.message))
            .map(|inbound| Target {
                system_id: inbound.system_id,
                component_id: inbound.component_id,
            });
        if let Some(target) = sender {
            return Ok((datagram, target));
        }
    }
}

async fn gcs_heartbeat(writer: Arc<LinkWriter>, framer: Framer, interval: Duration) {
    let message = MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    });
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let sent = match framer.frame(&message) {
            Ok(datagram) => writer.send(&datagram).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            debug!(error = %e, "gcs heartbeat not sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_sequence_wraps() {
        let framer = Framer {
            system_id: 255,
            component_id: 190,
            sequence: Arc::new(AtomicU8::new(255)),
        };
        let message = MavMessage::HEARTBEAT(HEARTBEAT_DATA::default());
        let first = frame::decode_datagram(&framer.frame(&message).unwrap());
        let second = frame::decode_datagram(&framer.frame(&message).unwrap());
        assert_eq!(first[0].0.sequence, 255);
        assert_eq!(second[0].0.sequence, 0);
        assert_eq!(second[0].0.system_id, 255);
        assert_eq!(second[0].0.component_id, 190);
    }

    #[tokio::test]
    async fn idle_session_rejects_sends() {
        let session = VehicleSession::new(SessionConfig::default());
        assert_eq!(session.router_state(), RouterState::Idle);
        assert!(!session.is_connected().await);
        assert!(matches!(session.target().await, Err(SdkError::NotConnected)));
        assert!(matches!(session.send_raw(&[0]).await, Err(SdkError::NotConnected)));
        session.disconnect().await.unwrap();
        assert_eq!(session.telemetry(), Telemetry::default());
    }

    #[tokio::test]
    async fn connect_times_out_without_heartbeat() {
        let config = SessionConfig::default().with_timeouts(Duration::from_millis(50));
        let session = VehicleSession::new(config);
        let (transport, _peer) = Transport::loopback();
        let err = session.connect_transport(transport).await.unwrap_err();
        assert!(matches!(err, SdkError::Connect { .. }));
        assert!(!session.is_connected().await);
    }

    fn vehicle_heartbeat() -> Vec<u8> {
        let header = MavHeader {
            system_id: 1,
            component_id: 1,
            sequence: 0,
        };
        let message = MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            autopilot: MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
            ..Default::default()
        });
        frame::encode(header, &message).unwrap()
    }

    fn quiet_config() -> SessionConfig {
        SessionConfig {
            gcs_heartbeat_interval: None,
            ..SessionConfig::default()
        }
        .with_timeouts(Duration::from_secs(1))
        .with_poll_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn closed_link_is_replaced_on_connect() {
        let session = VehicleSession::new(quiet_config());
        let (transport, peer) = Transport::loopback();
        peer.to_ground.send(vehicle_heartbeat()).unwrap();
        session.connect_transport(transport).await.unwrap();
        assert!(session.is_connected().await);
        assert!(session.telemetry().mode.is_some());

        drop(peer);
        tokio::time::timeout(Duration::from_secs(1), async {
            while session.is_connected().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(session.router_state(), RouterState::Stopped);

        let (transport, peer) = Transport::loopback();
        peer.to_ground.send(vehicle_heartbeat()).unwrap();
        session.connect_transport(transport).await.unwrap();
        assert!(session.is_connected().await);
        assert_eq!(session.router_state(), RouterState::Running);

        session.disconnect().await.unwrap();
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn disconnect_after_join_timeout_still_clears_telemetry() {
        let config = SessionConfig {
            join_timeout: Duration::ZERO,
            ..quiet_config()
        };
        let session = VehicleSession::new(config);
        let (transport, peer) = Transport::loopback();
        peer.to_ground.send(vehicle_heartbeat()).unwrap();
        session.connect_transport(transport).await.unwrap();
        assert_ne!(session.telemetry(), Telemetry::default());

        session.disconnect().await.unwrap();
        assert_eq!(session.router_state(), RouterState::Stopped);
        assert_eq!(session.telemetry(), Telemetry::default());
        assert!(!session.is_connected().await);

        // Anything the vehicle still sends lands nowhere.
        let _ = peer.to_ground.send(vehicle_heartbeat());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.telemetry(), Telemetry::default());
    }

    #[tokio::test]
    async fn connect_rejects_bad_uri() {
        let session = VehicleSession::new(SessionConfig::default());
        let err = session.connect("serial:/dev/ttyUSB0:57600").await.unwrap_err();
        assert!(matches!(err, SdkError::Endpoint { .. }));
    }
}
