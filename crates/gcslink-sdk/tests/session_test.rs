//! End-to-end tests: a `VehicleSession` against the simulated vehicle over an
//! in-memory link.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gcslink_models::mavlink::common::{MavCmd, MavMissionResult};
use gcslink_models::{MissionType, VehicleFamily};
use gcslink_sdk::{
    ArmConfirmation, LoopbackPeer, MissionBuilder, ParamId, RouterState, SdkError, SessionConfig,
    Telemetry, Transport, VehicleSession, Waypoint,
};
use mock_vehicle::{serve, MockVehicle, NOISE_PARAM};
use strum::IntoEnumIterator;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct Harness {
    session: VehicleSession,
    vehicle: Arc<Mutex<MockVehicle>>,
    _simulator: JoinHandle<()>,
}

fn config() -> SessionConfig {
    SessionConfig {
        gcs_heartbeat_interval: Some(Duration::from_millis(25)),
        ..SessionConfig::default()
    }
    .with_timeouts(Duration::from_secs(2))
    .with_poll_interval(Duration::from_millis(20))
}

async fn start(vehicle: MockVehicle, config: SessionConfig) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (transport, peer) = Transport::loopback();
    let LoopbackPeer {
        to_ground,
        from_ground,
    } = peer;
    let vehicle = Arc::new(Mutex::new(vehicle));
    let simulator = tokio::spawn(serve(
        Arc::clone(&vehicle),
        to_ground,
        from_ground,
        Duration::from_millis(50),
    ));

    let session = VehicleSession::new(config);
    session.connect_transport(transport).await.unwrap();
    Harness {
        session,
        vehicle,
        _simulator: simulator,
    }
}

fn copter() -> MockVehicle {
    MockVehicle::new(VehicleFamily::Copter)
}

fn waypoints() -> Vec<Waypoint> {
    vec![
        Waypoint::new(47.0, 8.0, 50.0),
        Waypoint::new(47.001, 8.001, 50.0),
        Waypoint::new(47.002, 8.002, 50.0),
    ]
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

async fn telemetry_where(session: &VehicleSession, check: impl FnMut(&Telemetry) -> bool) {
    let mut telemetry = session.subscribe_telemetry();
    tokio::time::timeout(Duration::from_secs(2), telemetry.wait_for(check))
        .await
        .expect("telemetry condition not reached")
        .unwrap();
}

// ------------------------------------------------------------------
// Missions
// ------------------------------------------------------------------

#[tokio::test]
async fn upload_then_download_round_trips_every_store() {
    let h = start(copter(), config()).await;
    let builder = MissionBuilder::new();

    for mission_type in MissionType::iter() {
        let items = builder.items(mission_type, &waypoints());
        h.session.upload_items(&items, mission_type).await.unwrap();

        let downloaded = h.session.download_items(mission_type).await.unwrap();
        assert_eq!(downloaded.len(), items.len(), "{mission_type}");
        for (sent, got) in items.iter().zip(&downloaded) {
            assert!(sent.same_on_wire(got), "{mission_type}: {sent:?} != {got:?}");
            assert!((sent.x - got.x).abs() < 1e-7);
            assert!((sent.y - got.y).abs() < 1e-7);
        }
    }
    // The closing ack of the last download may still be in flight.
    assert!(eventually(|| h.vehicle.lock().unwrap().acks_received() == 3).await);
}

#[tokio::test]
async fn stores_stay_apart_on_the_vehicle() {
    let h = start(copter(), config()).await;
    let builder = MissionBuilder::new();
    let route = waypoints();

    let mut uploaded = Vec::new();
    for (take, mission_type) in (1..).zip(MissionType::iter()) {
        let items = builder.items(mission_type, &route[..take]);
        h.session.upload_items(&items, mission_type).await.unwrap();
        uploaded.push((mission_type, items));
    }

    for (mission_type, items) in &uploaded {
        let vehicle = h.vehicle.lock().unwrap();
        assert_eq!(vehicle.items(*mission_type).len(), items.len(), "{mission_type}");
    }
    for (mission_type, items) in uploaded {
        let downloaded = h.session.download_items(mission_type).await.unwrap();
        assert_eq!(downloaded.len(), items.len(), "{mission_type}");
    }
}

#[tokio::test]
async fn upload_asks_for_each_item_once_in_order() {
    let h = start(copter(), config()).await;
    let points: Vec<Waypoint> = (0..5)
        .map(|i| Waypoint::new(47.0 + f64::from(i) * 0.001, 8.0, 40.0))
        .collect();

    h.session.upload_mission(&points).await.unwrap();

    assert_eq!(h.vehicle.lock().unwrap().requests_sent(), &[0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn three_waypoint_mission_takes_off_and_returns() {
    let h = start(copter(), config()).await;

    h.session.upload_mission(&waypoints()).await.unwrap();

    {
        let vehicle = h.vehicle.lock().unwrap();
        let stored = vehicle.items(MissionType::Mission);
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].command, MavCmd::MAV_CMD_NAV_TAKEOFF);
        assert_eq!(stored[1].command, MavCmd::MAV_CMD_NAV_WAYPOINT);
        assert_eq!(stored[2].command, MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH);
    }
    telemetry_where(&h.session, |t| t.total_mission_points == Some(3)).await;
}

#[tokio::test]
async fn configured_final_leg_lands() {
    let h = start(
        copter(),
        config().with_final_leg(gcslink_sdk::FinalLeg::Land),
    )
    .await;

    h.session.upload_mission(&waypoints()).await.unwrap();

    let vehicle = h.vehicle.lock().unwrap();
    assert_eq!(
        vehicle.items(MissionType::Mission)[2].command,
        MavCmd::MAV_CMD_NAV_LAND
    );
}

#[tokio::test]
async fn empty_upload_is_acknowledged() {
    let h = start(copter(), config()).await;
    h.session.upload_rally(&[]).await.unwrap();
    assert!(h.session.download_items(MissionType::Rally).await.unwrap().is_empty());
}

#[tokio::test]
async fn legacy_item_requests_are_answered() {
    let h = start(copter().legacy_requests(), config()).await;
    h.session.upload_fence(&waypoints()).await.unwrap();
    assert_eq!(h.vehicle.lock().unwrap().items(MissionType::Fence).len(), 3);
}

#[tokio::test]
async fn rejected_upload_reports_result() {
    let h = start(
        copter().reject_uploads(MavMissionResult::MAV_MISSION_NO_SPACE),
        config(),
    )
    .await;

    let err = h.session.upload_mission(&waypoints()).await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::UploadRejected {
            mission_type: MissionType::Mission,
            result: MavMissionResult::MAV_MISSION_NO_SPACE,
        }
    ));
}

#[tokio::test]
async fn silent_vehicle_leaves_upload_incomplete() {
    let h = start(
        copter().silent_missions(),
        config().with_timeouts(Duration::from_millis(200)),
    )
    .await;

    let err = h.session.upload_mission(&waypoints()).await.unwrap_err();
    assert!(err.is_timeout());
    let SdkError::IncompleteUpload {
        items_sent, total, ..
    } = err
    else {
        panic!("expected incomplete upload, got {err}");
    };
    assert_eq!((items_sent, total), (0, 3));
}

// ------------------------------------------------------------------
// Parameters
// ------------------------------------------------------------------

#[tokio::test]
async fn set_then_get_returns_new_value() {
    let id: ParamId = "RTL_ALT".parse().unwrap();
    let h = start(copter().with_param(&id, 1500.0), config()).await;

    assert_eq!(h.session.set_param(&id, 2500.0).await.unwrap(), 2500.0);
    let value = h.session.get_param(&id).await.unwrap();
    assert_eq!(value.id, id);
    assert_eq!(value.value, 2500.0);
    assert_eq!(value.count, 1);
}

#[tokio::test]
async fn unknown_param_times_out() {
    let h = start(copter(), config().with_timeouts(Duration::from_millis(150))).await;
    let id: ParamId = "NOT_A_PARAM".parse().unwrap();
    let err = h.session.get_param(&id).await.unwrap_err();
    assert!(matches!(err, SdkError::Timeout { .. }));
}

#[tokio::test]
async fn noise_does_not_disturb_replies() {
    let id: ParamId = "WPNAV_SPEED".parse().unwrap();
    let h = start(copter().with_param(&id, 500.0).noisy(), config()).await;

    let value = h.session.get_param(&id).await.unwrap();
    assert_eq!(value.value, 500.0);
    assert_ne!(value.id.as_str(), NOISE_PARAM);
    h.session.upload_mission(&waypoints()).await.unwrap();
}

#[tokio::test]
async fn concurrent_exchanges_are_serialised() {
    let a: ParamId = "RTL_ALT".parse().unwrap();
    let b: ParamId = "WPNAV_SPEED".parse().unwrap();
    let h = start(
        copter().with_param(&a, 1.0).with_param(&b, 2.0),
        config(),
    )
    .await;

    let (first, second) = tokio::join!(h.session.get_param(&a), h.session.get_param(&b));
    assert_eq!(first.unwrap().value, 1.0);
    assert_eq!(second.unwrap().value, 2.0);
}

// ------------------------------------------------------------------
// Commands
// ------------------------------------------------------------------

#[tokio::test]
async fn takeoff_without_position_is_no_fix() {
    let h = start(copter(), config()).await;
    assert!(matches!(h.session.takeoff(10.0).await, Err(SdkError::NoFix)));
}

#[tokio::test]
async fn takeoff_uses_reported_position() {
    let h = start(copter().with_position(47.0, 8.0), config()).await;
    telemetry_where(&h.session, Telemetry::has_position).await;

    h.session
        .commands()
        .arm_with(ArmConfirmation::CommandAck)
        .await
        .unwrap();
    h.session.takeoff(12.0).await.unwrap();

    assert!(eventually(|| h.vehicle.lock().unwrap().altitude() == 12.0).await);
}

#[tokio::test]
async fn unknown_mode_lists_known_names() {
    let h = start(copter(), config()).await;

    let err = h.session.set_mode("NONEXISTENT").await.unwrap_err();
    let SdkError::UnknownMode { name, known } = &err else {
        panic!("expected unknown mode, got {err}");
    };
    assert_eq!(name, "NONEXISTENT");
    assert!(known.iter().any(|m| m == "GUIDED"));
    assert!(err.to_string().contains("available modes: STABILIZE, ACRO"));
}

#[tokio::test]
async fn mode_change_shows_in_telemetry() {
    let h = start(copter(), config()).await;

    assert_eq!(h.session.set_mode("guided").await.unwrap(), 4);
    telemetry_where(&h.session, |t| t.mode.as_deref() == Some("GUIDED")).await;
    assert_eq!(h.vehicle.lock().unwrap().custom_mode(), 4);
}

#[tokio::test]
async fn armed_state_confirmation_waits_for_heartbeat() {
    let h = start(
        copter(),
        config().with_arm_confirmation(ArmConfirmation::ArmedState),
    )
    .await;

    h.session.arm().await.unwrap();
    assert_eq!(h.session.telemetry().armed, Some(true));
    h.session.disarm().await.unwrap();
    assert_eq!(h.session.telemetry().armed, Some(false));
}

#[tokio::test]
async fn rejected_command_is_reported() {
    let h = start(copter(), config()).await;
    let err = h
        .session
        .commands()
        .command_long_acked(
            MavCmd::MAV_CMD_DO_SET_MODE,
            [1.0, 99.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::CommandRejected { .. }));
}

// ------------------------------------------------------------------
// Lifecycle
// ------------------------------------------------------------------

#[tokio::test]
async fn connect_and_disconnect_are_idempotent() {
    let h = start(copter().with_position(47.0, 8.0), config()).await;
    assert!(h.session.is_connected().await);
    assert_eq!(h.session.router_state(), RouterState::Running);
    let target = h.session.target().await.unwrap();
    assert_eq!((target.system_id, target.component_id), (1, 1));

    let (spare, _peer) = Transport::loopback();
    h.session.connect_transport(spare).await.unwrap();
    assert_eq!(h.session.target().await.unwrap(), target);

    telemetry_where(&h.session, Telemetry::has_position).await;
    h.session.disconnect().await.unwrap();
    assert!(!h.session.is_connected().await);
    assert_eq!(h.session.router_state(), RouterState::Stopped);
    assert_eq!(h.session.telemetry(), Telemetry::default());

    h.session.disconnect().await.unwrap();
    assert!(matches!(
        h.session.get_param(&"RTL_ALT".parse().unwrap()).await,
        Err(SdkError::NotConnected)
    ));
}

#[tokio::test]
async fn telemetry_follows_vehicle() {
    let h = start(copter().with_position(47.5, 8.5), config()).await;

    telemetry_where(&h.session, |t| t.has_position() && t.battery_voltage.is_some()).await;
    let t = h.session.telemetry();
    assert_eq!(t.armed, Some(false));
    assert_eq!(t.mode.as_deref(), Some("STABILIZE"));
    assert!((t.lat.unwrap() - 47.5).abs() < 1e-7);
    assert_eq!(t.heading, Some(90.0));
    assert_eq!(t.battery_voltage, Some(12.6));
    assert!(t.last_update.is_some());
}

#[tokio::test]
async fn gcs_heartbeat_reaches_vehicle() {
    let h = start(copter(), config()).await;
    assert!(eventually(|| h.vehicle.lock().unwrap().gcs_heartbeats() > 0).await);
}
