//! # Mock vehicle
//!
//! A small simulated ArduPilot autopilot. It answers the mission, parameter
//! and command protocols the way a real vehicle does and streams a basic
//! telemetry set, which is enough to drive a ground-station session end to
//! end without SITL.
//!
//! [`MockVehicle`] is the pure state machine; [`serve`] runs it over a pair
//! of datagram channels (the far end of an in-memory link, or a UDP pump
//! as in the `mock-vehicle` binary).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gcslink_models::{
    degrees_to_e7, frame, MissionItem, MissionType, ParamId, VehicleFamily,
};
use mavlink::common::{
    GpsFixType, MavAutopilot, MavCmd, MavMessage, MavMissionResult, MavMissionType, MavModeFlag,
    MavParamType, MavResult, MavState, MavType, ATTITUDE_DATA, BATTERY_STATUS_DATA,
    COMMAND_ACK_DATA, COMMAND_LONG_DATA, GLOBAL_POSITION_INT_DATA, GPS_RAW_INT_DATA, HEARTBEAT_DATA,
    MISSION_ACK_DATA, MISSION_COUNT_DATA, MISSION_CURRENT_DATA, MISSION_REQUEST_DATA,
    MISSION_REQUEST_INT_DATA, PARAM_VALUE_DATA,
};
use mavlink::MavHeader;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Name of the parameter echoed as background noise by [`MockVehicle::noisy`].
pub const NOISE_PARAM: &str = "STAT_RUNTIME";

/// An upload in progress.
#[derive(Debug)]
struct Upload {
    mission_type: MissionType,
    count: u16,
    items: Vec<MissionItem>,
}

/// Simulated vehicle state.
#[derive(Debug)]
pub struct MockVehicle {
    system_id: u8,
    component_id: u8,
    mav_type: MavType,
    armed: bool,
    custom_mode: u32,
    position: Option<(f64, f64)>,
    altitude: f32,
    params: Vec<(ParamId, f32, MavParamType)>,
    mission: Vec<MissionItem>,
    fence: Vec<MissionItem>,
    rally: Vec<MissionItem>,
    current_seq: u16,
    upload: Option<Upload>,
    reject_with: Option<MavMissionResult>,
    silent_missions: bool,
    legacy_requests: bool,
    noisy: bool,
    gcs: (u8, u8),
    requests_sent: Vec<u16>,
    acks_received: usize,
    gcs_heartbeats: usize,
}

impl MockVehicle {
    /// A disarmed vehicle of `family` with no position and empty stores.
    pub fn new(family: VehicleFamily) -> Self {
        let mav_type = match family {
            VehicleFamily::Copter => MavType::MAV_TYPE_QUADROTOR,
            VehicleFamily::Plane => MavType::MAV_TYPE_FIXED_WING,
            VehicleFamily::Rover => MavType::MAV_TYPE_GROUND_ROVER,
            VehicleFamily::Sub => MavType::MAV_TYPE_SUBMARINE,
        };
        Self {
            system_id: 1,
            component_id: 1,
            mav_type,
            armed: false,
            custom_mode: 0,
            position: None,
            altitude: 0.0,
            params: Vec::new(),
            mission: Vec::new(),
            fence: Vec::new(),
            rally: Vec::new(),
            current_seq: 0,
            upload: None,
            reject_with: None,
            silent_missions: false,
            legacy_requests: false,
            noisy: false,
            gcs: (255, 190),
            requests_sent: Vec::new(),
            acks_received: 0,
            gcs_heartbeats: 0,
        }
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// Report a GPS position.
    #[must_use]
    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.position = Some((lat, lon));
        self
    }

    /// Add a 32-bit float parameter.
    #[must_use]
    pub fn with_param(mut self, id: &ParamId, value: f32) -> Self {
        self.params
            .push((id.clone(), value, MavParamType::MAV_PARAM_TYPE_REAL32));
        self
    }

    /// Answer every completed upload with `result` instead of accepting it.
    #[must_use]
    pub fn reject_uploads(mut self, result: MavMissionResult) -> Self {
        self.reject_with = Some(result);
        self
    }

    /// Ignore mission uploads entirely.
    #[must_use]
    pub fn silent_missions(mut self) -> Self {
        self.silent_missions = true;
        self
    }

    /// Ask for upload items with the deprecated `MISSION_REQUEST`.
    #[must_use]
    pub fn legacy_requests(mut self) -> Self {
        self.legacy_requests = true;
        self
    }

    /// Precede every reply with unrelated traffic.
    #[must_use]
    pub fn noisy(mut self) -> Self {
        self.noisy = true;
        self
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Our MAVLink system id.
    pub fn system_id(&self) -> u8 {
        self.system_id
    }

    /// Our MAVLink component id.
    pub fn component_id(&self) -> u8 {
        self.component_id
    }

    /// Whether the motors are armed.
    pub fn armed(&self) -> bool {
        self.armed
    }

    /// Current `custom_mode` number.
    pub fn custom_mode(&self) -> u32 {
        self.custom_mode
    }

    /// Target altitude of the last accepted takeoff.
    pub fn altitude(&self) -> f32 {
        self.altitude
    }

    /// Stored items of one type.
    pub fn items(&self, mission_type: MissionType) -> &[MissionItem] {
        match mission_type {
            MissionType::Mission => &self.mission,
            MissionType::Fence => &self.fence,
            MissionType::Rally => &self.rally,
        }
    }

    /// Current value of a parameter.
    pub fn param(&self, id: &ParamId) -> Option<f32> {
        self.params
            .iter()
            .find(|(name, _, _)| name == id)
            .map(|(_, value, _)| *value)
    }

    /// Sequence numbers requested during uploads, in order.
    pub fn requests_sent(&self) -> &[u16] {
        &self.requests_sent
    }

    /// `MISSION_ACK`s received from the ground after downloads.
    pub fn acks_received(&self) -> usize {
        self.acks_received
    }

    /// Ground-station heartbeats seen.
    pub fn gcs_heartbeats(&self) -> usize {
        self.gcs_heartbeats
    }

    // ------------------------------------------------------------------
    // Protocol
    // ------------------------------------------------------------------

    /// The periodic telemetry set.
    pub fn telemetry_frames(&self) -> Vec<MavMessage> {
        // Single cell; unused cells report UINT16_MAX.
        let mut voltages = [u16::MAX; 10];
        voltages[0] = 12_600;
        let mut frames = vec![
            self.heartbeat(),
            MavMessage::ATTITUDE(ATTITUDE_DATA {
                roll: 0.01,
                pitch: -0.02,
                yaw: 1.5,
                ..Default::default()
            }),
            MavMessage::BATTERY_STATUS(BATTERY_STATUS_DATA {
                voltages,
                current_battery: 350,
                battery_remaining: 87,
                ..Default::default()
            }),
            MavMessage::MISSION_CURRENT(MISSION_CURRENT_DATA {
                seq: self.current_seq,
                ..Default::default()
            }),
        ];
        if let Some((lat, lon)) = self.position {
            frames.push(MavMessage::GPS_RAW_INT(GPS_RAW_INT_DATA {
                lat: degrees_to_e7(lat),
                lon: degrees_to_e7(lon),
                fix_type: GpsFixType::GPS_FIX_TYPE_3D_FIX,
                satellites_visible: 12,
                ..Default::default()
            }));
            frames.push(MavMessage::GLOBAL_POSITION_INT(GLOBAL_POSITION_INT_DATA {
                lat: degrees_to_e7(lat),
                lon: degrees_to_e7(lon),
                hdg: 9000,
                ..Default::default()
            }));
        } else {
            frames.push(MavMessage::GPS_RAW_INT(GPS_RAW_INT_DATA {
                fix_type: GpsFixType::GPS_FIX_TYPE_NO_FIX,
                ..Default::default()
            }));
        }
        frames
    }

    fn heartbeat(&self) -> MavMessage {
        let mut base_mode = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED;
        if self.armed {
            base_mode |= MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED;
        }
        MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: self.custom_mode,
            mavtype: self.mav_type,
            autopilot: MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            base_mode,
            system_status: if self.armed {
                MavState::MAV_STATE_ACTIVE
            } else {
                MavState::MAV_STATE_STANDBY
            },
            mavlink_version: 3,
        })
    }

    /// React to one message from the ground; returns the replies in order.
    pub fn handle(&mut self, header: &MavHeader, message: &MavMessage) -> Vec<MavMessage> {
        self.gcs = (header.system_id, header.component_id);
        let replies = match message {
            MavMessage::HEARTBEAT(_) => {
                self.gcs_heartbeats += 1;
                return Vec::new();
            }
            MavMessage::COMMAND_LONG(data) => self.on_command(data),
            MavMessage::PARAM_SET(data) => {
                let id = ParamId::from_wire(&data.param_id);
                match self.params.iter_mut().find(|(name, _, _)| *name == id) {
                    Some(entry) => {
                        entry.1 = data.param_value;
                        entry.2 = data.param_type;
                    }
                    None => self.params.push((id.clone(), data.param_value, data.param_type)),
                }
                self.param_value(&id).into_iter().collect()
            }
            MavMessage::PARAM_REQUEST_READ(data) => {
                let id = match usize::try_from(data.param_index) {
                    Ok(index) => self.params.get(index).map(|(name, _, _)| name.clone()),
                    Err(_) => Some(ParamId::from_wire(&data.param_id)),
                };
                id.and_then(|id| self.param_value(&id)).into_iter().collect()
            }
            MavMessage::MISSION_COUNT(data) => self.on_mission_count(data.count, data.mission_type),
            MavMessage::MISSION_ITEM_INT(data) => {
                self.on_mission_item(MissionItem::from_wire(data), data.mission_type)
            }
            MavMessage::MISSION_REQUEST_LIST(data) => {
                let Ok(mission_type) = MissionType::try_from(data.mission_type) else {
                    return Vec::new();
                };
                let count = u16::try_from(self.items(mission_type).len()).unwrap_or(u16::MAX);
                vec![MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
                    count,
                    target_system: self.gcs.0,
                    target_component: self.gcs.1,
                    mission_type: data.mission_type,
                    ..Default::default()
                })]
            }
            MavMessage::MISSION_REQUEST_INT(data) => self.on_item_request(data.seq, data.mission_type),
            MavMessage::MISSION_REQUEST(data) => self.on_item_request(data.seq, data.mission_type),
            MavMessage::MISSION_ACK(_) => {
                self.acks_received += 1;
                return Vec::new();
            }
            other => {
                trace!(message = ?other, "ignored");
                return Vec::new();
            }
        };

        if self.noisy && !replies.is_empty() {
            let mut noisy = self.noise();
            noisy.extend(replies);
            noisy
        } else {
            replies
        }
    }

    fn noise(&self) -> Vec<MavMessage> {
        let mut param_id = [0u8; 16];
        param_id[..NOISE_PARAM.len()].copy_from_slice(NOISE_PARAM.as_bytes());
        vec![
            MavMessage::ATTITUDE(ATTITUDE_DATA {
                roll: 0.5,
                ..Default::default()
            }),
            MavMessage::PARAM_VALUE(PARAM_VALUE_DATA {
                param_value: 1234.0,
                param_count: 1,
                param_index: 0,
                param_id,
                param_type: MavParamType::MAV_PARAM_TYPE_REAL32,
            }),
        ]
    }

    fn param_value(&self, id: &ParamId) -> Option<MavMessage> {
        let index = self.params.iter().position(|(name, _, _)| name == id)?;
        let (name, value, param_type) = &self.params[index];
        Some(MavMessage::PARAM_VALUE(PARAM_VALUE_DATA {
            param_value: *value,
            param_count: u16::try_from(self.params.len()).unwrap_or(u16::MAX),
            param_index: u16::try_from(index).unwrap_or(u16::MAX),
            param_id: name.to_wire(),
            param_type: *param_type,
        }))
    }

    fn on_command(&mut self, data: &COMMAND_LONG_DATA) -> Vec<MavMessage> {
        let command = data.command;
        let result = match command {
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM => {
                self.armed = data.param1 > 0.5;
                info!(armed = self.armed, "arm state changed");
                MavResult::MAV_RESULT_ACCEPTED
            }
            MavCmd::MAV_CMD_NAV_TAKEOFF if self.armed && self.position.is_some() => {
                self.altitude = data.param7;
                MavResult::MAV_RESULT_ACCEPTED
            }
            MavCmd::MAV_CMD_NAV_TAKEOFF => MavResult::MAV_RESULT_TEMPORARILY_REJECTED,
            MavCmd::MAV_CMD_DO_SET_MODE => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let mode = data.param2 as u32;
                let known = VehicleFamily::from_heartbeat(
                    MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
                    self.mav_type,
                )
                .and_then(|family| family.mode_name(mode))
                .is_some();
                if known {
                    self.custom_mode = mode;
                    info!(custom_mode = mode, "mode changed");
                    MavResult::MAV_RESULT_ACCEPTED
                } else {
                    MavResult::MAV_RESULT_DENIED
                }
            }
            _ => MavResult::MAV_RESULT_UNSUPPORTED,
        };
        vec![
            MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
                command,
                result,
                ..Default::default()
            }),
            self.heartbeat(),
        ]
    }

    fn on_mission_count(&mut self, count: u16, wire_type: MavMissionType) -> Vec<MavMessage> {
        if self.silent_missions {
            return Vec::new();
        }
        let Ok(mission_type) = MissionType::try_from(wire_type) else {
            return vec![self.mission_ack(wire_type, MavMissionResult::MAV_MISSION_UNSUPPORTED)];
        };
        debug!(%mission_type, count, "upload started");
        self.upload = Some(Upload {
            mission_type,
            count,
            items: Vec::with_capacity(usize::from(count)),
        });
        self.next_upload_step(wire_type)
    }

    fn on_mission_item(&mut self, item: MissionItem, wire_type: MavMissionType) -> Vec<MavMessage> {
        let Some(upload) = self.upload.as_mut() else {
            return Vec::new();
        };
        let expected = u16::try_from(upload.items.len()).unwrap_or(u16::MAX);
        if MavMissionType::from(upload.mission_type) != wire_type || item.seq != expected {
            return vec![self.mission_ack(wire_type, MavMissionResult::MAV_MISSION_INVALID_SEQUENCE)];
        }
        upload.items.push(item);
        self.next_upload_step(wire_type)
    }

    fn next_upload_step(&mut self, wire_type: MavMissionType) -> Vec<MavMessage> {
        let Some(upload) = self.upload.as_ref() else {
            return Vec::new();
        };
        let received = u16::try_from(upload.items.len()).unwrap_or(u16::MAX);
        if received < upload.count {
            self.requests_sent.push(received);
            return vec![self.item_request(received, wire_type)];
        }

        let Some(upload) = self.upload.take() else {
            return Vec::new();
        };
        let result = match self.reject_with {
            Some(result) => result,
            None => {
                info!(mission_type = %upload.mission_type, items = upload.items.len(), "upload stored");
                match upload.mission_type {
                    MissionType::Mission => {
                        self.mission = upload.items;
                        self.current_seq = 0;
                    }
                    MissionType::Fence => self.fence = upload.items,
                    MissionType::Rally => self.rally = upload.items,
                }
                MavMissionResult::MAV_MISSION_ACCEPTED
            }
        };
        vec![self.mission_ack(wire_type, result)]
    }

    fn item_request(&self, seq: u16, mission_type: MavMissionType) -> MavMessage {
        if self.legacy_requests {
            MavMessage::MISSION_REQUEST(MISSION_REQUEST_DATA {
                seq,
                target_system: self.gcs.0,
                target_component: self.gcs.1,
                mission_type,
            })
        } else {
            MavMessage::MISSION_REQUEST_INT(MISSION_REQUEST_INT_DATA {
                seq,
                target_system: self.gcs.0,
                target_component: self.gcs.1,
                mission_type,
            })
        }
    }

    fn on_item_request(&self, seq: u16, wire_type: MavMissionType) -> Vec<MavMessage> {
        let Ok(mission_type) = MissionType::try_from(wire_type) else {
            return Vec::new();
        };
        match self.items(mission_type).get(usize::from(seq)) {
            Some(item) => vec![MavMessage::MISSION_ITEM_INT(item.to_wire(
                self.gcs.0,
                self.gcs.1,
                mission_type,
            ))],
            None => vec![self.mission_ack(wire_type, MavMissionResult::MAV_MISSION_INVALID_SEQUENCE)],
        }
    }

    fn mission_ack(&self, mission_type: MavMissionType, result: MavMissionResult) -> MavMessage {
        MavMessage::MISSION_ACK(MISSION_ACK_DATA {
            target_system: self.gcs.0,
            target_component: self.gcs.1,
            mavtype: result,
            mission_type,
            ..Default::default()
        })
    }
}

// ------------------------------------------------------------------
// Serving
// ------------------------------------------------------------------

/// Run `vehicle` against a datagram link until either side closes.
///
/// Telemetry goes out every `interval`, starting immediately, so a
/// connecting ground station sees a heartbeat at once.
pub async fn serve(
    vehicle: Arc<Mutex<MockVehicle>>,
    to_ground: mpsc::UnboundedSender<Vec<u8>>,
    mut from_ground: mpsc::UnboundedReceiver<Vec<u8>>,
    interval: Duration,
) {
    let mut sequence: u8 = 0;
    let mut ticker = tokio::time::interval(interval);

    loop {
        let outgoing = tokio::select! {
            _ = ticker.tick() => lock(&vehicle).telemetry_frames(),
            received = from_ground.recv() => {
                let Some(datagram) = received else { break };
                let mut guard = lock(&vehicle);
                frame::decode_datagram(&datagram)
                    .iter()
                    .flat_map(|(header, message)| guard.handle(header, message))
                    .collect()
            }
        };

        let (system_id, component_id) = {
            let guard = lock(&vehicle);
            (guard.system_id, guard.component_id)
        };
        for message in outgoing {
            let header = MavHeader {
                system_id,
                component_id,
                sequence,
            };
            sequence = sequence.wrapping_add(1);
            let Ok(datagram) = frame::encode(header, &message) else {
                continue;
            };
            if to_ground.send(datagram).is_err() {
                debug!("ground side closed");
                return;
            }
        }
    }
    debug!("link closed");
}

fn lock(vehicle: &Mutex<MockVehicle>) -> std::sync::MutexGuard<'_, MockVehicle> {
    vehicle.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::{
        MavFrame, MISSION_ITEM_INT_DATA, PARAM_REQUEST_READ_DATA,
        PARAM_SET_DATA,
    };

    fn gcs() -> MavHeader {
        MavHeader {
            system_id: 255,
            component_id: 190,
            sequence: 0,
        }
    }

    fn item(seq: u16) -> MISSION_ITEM_INT_DATA {
        MissionItem {
            seq,
            frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
            command: MavCmd::MAV_CMD_NAV_WAYPOINT,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            x: 47.0,
            y: 8.0,
            z: 30.0,
        }
        .to_wire(1, 1, MissionType::Fence)
    }

    fn command(command: MavCmd, param1: f32, param2: f32) -> MavMessage {
        MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1,
            param2,
            command,
            target_system: 1,
            target_component: 1,
            ..Default::default()
        })
    }

    #[test]
    fn upload_is_driven_by_requests() {
        let mut vehicle = MockVehicle::new(VehicleFamily::Copter);
        let count = MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
            count: 2,
            target_system: 1,
            target_component: 1,
            mission_type: MavMissionType::MAV_MISSION_TYPE_FENCE,
            ..Default::default()
        });

        let replies = vehicle.handle(&gcs(), &count);
        assert!(matches!(&replies[..], [MavMessage::MISSION_REQUEST_INT(r)] if r.seq == 0));
        let replies = vehicle.handle(&gcs(), &MavMessage::MISSION_ITEM_INT(item(0)));
        assert!(matches!(&replies[..], [MavMessage::MISSION_REQUEST_INT(r)] if r.seq == 1));
        let replies = vehicle.handle(&gcs(), &MavMessage::MISSION_ITEM_INT(item(1)));
        assert!(matches!(
            &replies[..],
            [MavMessage::MISSION_ACK(a)] if a.mavtype == MavMissionResult::MAV_MISSION_ACCEPTED
        ));
        assert_eq!(vehicle.items(MissionType::Fence).len(), 2);
        assert_eq!(vehicle.requests_sent(), &[0, 1]);
    }

    #[test]
    fn out_of_order_item_is_rejected() {
        let mut vehicle = MockVehicle::new(VehicleFamily::Copter);
        let count = MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
            count: 2,
            mission_type: MavMissionType::MAV_MISSION_TYPE_FENCE,
            ..Default::default()
        });
        vehicle.handle(&gcs(), &count);
        let replies = vehicle.handle(&gcs(), &MavMessage::MISSION_ITEM_INT(item(1)));
        assert!(matches!(
            &replies[..],
            [MavMessage::MISSION_ACK(a)] if a.mavtype == MavMissionResult::MAV_MISSION_INVALID_SEQUENCE
        ));
    }

    #[test]
    fn params_are_stored_and_echoed() {
        let id: ParamId = "RTL_ALT".parse().unwrap();
        let mut vehicle = MockVehicle::new(VehicleFamily::Copter).with_param(&id, 1500.0);

        let set = MavMessage::PARAM_SET(PARAM_SET_DATA {
            param_value: 2000.0,
            target_system: 1,
            target_component: 1,
            param_id: id.to_wire(),
            param_type: MavParamType::MAV_PARAM_TYPE_REAL32,
        });
        let replies = vehicle.handle(&gcs(), &set);
        assert!(matches!(&replies[..], [MavMessage::PARAM_VALUE(v)] if v.param_value == 2000.0));
        assert_eq!(vehicle.param(&id), Some(2000.0));

        let unknown: ParamId = "NOT_THERE".parse().unwrap();
        let read = MavMessage::PARAM_REQUEST_READ(PARAM_REQUEST_READ_DATA {
            param_index: -1,
            target_system: 1,
            target_component: 1,
            param_id: unknown.to_wire(),
        });
        assert!(vehicle.handle(&gcs(), &read).is_empty());
    }

    #[test]
    fn commands_change_state() {
        let mut vehicle = MockVehicle::new(VehicleFamily::Copter).with_position(47.0, 8.0);

        vehicle.handle(&gcs(), &command(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, 1.0, 0.0));
        assert!(vehicle.armed());

        let replies = vehicle.handle(&gcs(), &command(MavCmd::MAV_CMD_DO_SET_MODE, 1.0, 4.0));
        assert!(matches!(
            &replies[0],
            MavMessage::COMMAND_ACK(a) if a.result == MavResult::MAV_RESULT_ACCEPTED
        ));
        assert_eq!(vehicle.custom_mode(), 4);

        let replies = vehicle.handle(&gcs(), &command(MavCmd::MAV_CMD_DO_SET_MODE, 1.0, 99.0));
        assert!(matches!(
            &replies[0],
            MavMessage::COMMAND_ACK(a) if a.result == MavResult::MAV_RESULT_DENIED
        ));
        assert_eq!(vehicle.custom_mode(), 4);
    }

    #[test]
    fn telemetry_includes_position_only_with_fix() {
        let without = MockVehicle::new(VehicleFamily::Rover).telemetry_frames();
        assert!(!without
            .iter()
            .any(|m| matches!(m, MavMessage::GLOBAL_POSITION_INT(_))));
        let with = MockVehicle::new(VehicleFamily::Rover)
            .with_position(47.0, 8.0)
            .telemetry_frames();
        assert!(with
            .iter()
            .any(|m| matches!(m, MavMessage::GLOBAL_POSITION_INT(_))));
        assert!(matches!(with[0], MavMessage::HEARTBEAT(_)));
    }

    #[tokio::test]
    async fn serve_sends_heartbeat_first() {
        let vehicle = Arc::new(Mutex::new(MockVehicle::new(VehicleFamily::Copter)));
        let (to_ground, mut ground_rx) = mpsc::unbounded_channel();
        let (ground_tx, from_ground) = mpsc::unbounded_channel::<Vec<u8>>();
        let task = tokio::spawn(serve(vehicle, to_ground, from_ground, Duration::from_secs(60)));

        let datagram = ground_rx.recv().await.unwrap();
        let frames = frame::decode_datagram(&datagram);
        assert!(matches!(frames[0].1, MavMessage::HEARTBEAT(_)));

        drop(ground_tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
