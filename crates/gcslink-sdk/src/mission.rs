//! Mission, geofence and rally transfers.
//!
//! Uploads follow the vehicle-driven handshake: we announce the count, the
//! vehicle asks for each item by sequence number, then acknowledges the
//! whole list. Downloads are the mirror image. Each transfer runs inside a
//! single [`Exchange`](crate::Exchange) and is never retried; a failed
//! upload may leave the vehicle with a partial store.

use gcslink_models::{
    MissionBuilder, MissionItem, MissionType, ModelError, VehicleMessage, Waypoint,
};
use mavlink::common::{
    MavMessage, MavMissionResult, MISSION_ACK_DATA, MISSION_COUNT_DATA, MISSION_REQUEST_INT_DATA,
    MISSION_REQUEST_LIST_DATA,
};
use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::error::SdkError;
use crate::router::RouterNote;
use crate::session::{Target, VehicleSession};
use crate::waiter::{Exchange, Matcher};

/// Where a transfer is in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing sent yet.
    Idle,
    /// Upload: item count announced.
    CountSent,
    /// Upload: waiting for the vehicle to ask for this item.
    AwaitingRequest(u16),
    /// Upload: this item has been sent.
    ItemSent(u16),
    /// Upload: all items sent, waiting for the verdict.
    AwaitingAck,
    /// Download: item list requested.
    ListRequested,
    /// Download: this item has been requested.
    ItemRequested(u16),
    /// Finished successfully.
    Done,
    /// Aborted by an error.
    Failed,
}

/// Progress of one transfer, logged on every transition.
#[derive(Debug)]
struct Progress {
    mission_type: MissionType,
    state: TransferState,
    items_done: usize,
}

impl Progress {
    fn new(mission_type: MissionType) -> Self {
        Self {
            mission_type,
            state: TransferState::Idle,
            items_done: 0,
        }
    }

    fn advance(&mut self, next: TransferState) {
        debug!(mission_type = %self.mission_type, from = ?self.state, to = ?next, "transfer state");
        self.state = next;
    }
}

/// Mission transfer operations of a [`VehicleSession`].
pub struct MissionTransfer<'a> {
    session: &'a VehicleSession,
}

impl<'a> MissionTransfer<'a> {
    pub(crate) fn new(session: &'a VehicleSession) -> Self {
        Self { session }
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Build items from `points` for `mission_type` and upload them.
    ///
    /// Missions start with a takeoff and end with the configured final leg.
    pub async fn upload_waypoints(
        &self,
        mission_type: MissionType,
        points: &[Waypoint],
    ) -> Result<(), SdkError> {
        let items = MissionBuilder::new()
            .final_leg(self.session.config().final_leg)
            .items(mission_type, points);
        self.upload(&items, mission_type).await
    }

    /// Replace the vehicle's `mission_type` store with `items`.
    ///
    /// Items are renumbered by position. A timeout or link failure part way
    /// through yields [`SdkError::IncompleteUpload`]; a negative verdict
    /// yields [`SdkError::UploadRejected`].
    pub async fn upload(
        &self,
        items: &[MissionItem],
        mission_type: MissionType,
    ) -> Result<(), SdkError> {
        let count = u16::try_from(items.len()).map_err(|_| ModelError::TooManyItems {
            count: items.len(),
        })?;
        let target = self.session.target().await?;
        let mut exchange = self.session.exchange().await;
        let mut progress = Progress::new(mission_type);

        let outcome = self
            .run_upload(&mut exchange, &mut progress, target, items, count)
            .await;
        drop(exchange);

        match outcome {
            Ok(()) => {
                progress.advance(TransferState::Done);
                info!(%mission_type, items = items.len(), "upload accepted");
                if mission_type == MissionType::Mission {
                    self.session
                        .note(RouterNote::MissionUploaded { count })
                        .await;
                }
                Ok(())
            }
            Err(e) => {
                progress.advance(TransferState::Failed);
                match e {
                    SdkError::UploadRejected { .. } => Err(e),
                    other => Err(SdkError::IncompleteUpload {
                        mission_type,
                        items_sent: progress.items_done,
                        total: items.len(),
                        source: Box::new(other),
                    }),
                }
            }
        }
    }

    async fn run_upload(
        &self,
        exchange: &mut Exchange<'_>,
        progress: &mut Progress,
        target: Target,
        items: &[MissionItem],
        count: u16,
    ) -> Result<(), SdkError> {
        let mission_type = progress.mission_type;
        let timeout = self.session.config().mission_timeout;

        self.session
            .send(&MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
                count,
                target_system: target.system_id,
                target_component: target.component_id,
                mission_type: mission_type.into(),
                ..Default::default()
            }))
            .await?;
        progress.advance(TransferState::CountSent);

        for (seq, item) in (0..count).zip(items) {
            progress.advance(TransferState::AwaitingRequest(seq));
            exchange
                .wait_for(&Matcher::MissionRequest { seq, mission_type }, timeout)
                .await?;

            let item = MissionItem { seq, ..item.clone() };
            self.session
                .send(&MavMessage::MISSION_ITEM_INT(item.to_wire(
                    target.system_id,
                    target.component_id,
                    mission_type,
                )))
                .await?;
            progress.items_done += 1;
            progress.advance(TransferState::ItemSent(seq));
        }

        progress.advance(TransferState::AwaitingAck);
        let matcher = Matcher::MissionAck { mission_type };
        match exchange.wait_for(&matcher, timeout).await? {
            VehicleMessage::MissionAck(ack) => match ack.result {
                MavMissionResult::MAV_MISSION_ACCEPTED => Ok(()),
                result => Err(SdkError::UploadRejected {
                    mission_type,
                    result,
                }),
            },
            other => Err(unexpected(&matcher, &other)),
        }
    }

    // ------------------------------------------------------------------
    // Download
    // ------------------------------------------------------------------

    /// Read the vehicle's `mission_type` store.
    pub async fn download(&self, mission_type: MissionType) -> Result<Vec<MissionItem>, SdkError> {
        let target = self.session.target().await?;
        let timeout = self.session.config().mission_timeout;
        let mut exchange = self.session.exchange().await;
        let mut progress = Progress::new(mission_type);

        self.session
            .send(&MavMessage::MISSION_REQUEST_LIST(MISSION_REQUEST_LIST_DATA {
                target_system: target.system_id,
                target_component: target.component_id,
                mission_type: mission_type.into(),
            }))
            .await?;
        progress.advance(TransferState::ListRequested);

        let matcher = Matcher::MissionCount { mission_type };
        let count = match exchange.wait_for(&matcher, timeout).await? {
            VehicleMessage::MissionCount(count) => count.count,
            other => return Err(unexpected(&matcher, &other)),
        };

        let mut items = Vec::with_capacity(usize::from(count));
        for seq in 0..count {
            self.session
                .send(&MavMessage::MISSION_REQUEST_INT(MISSION_REQUEST_INT_DATA {
                    seq,
                    target_system: target.system_id,
                    target_component: target.component_id,
                    mission_type: mission_type.into(),
                }))
                .await?;
            progress.advance(TransferState::ItemRequested(seq));

            let matcher = Matcher::MissionItem { seq, mission_type };
            match exchange.wait_for(&matcher, timeout).await? {
                VehicleMessage::MissionItem(msg) => items.push(msg.item),
                other => return Err(unexpected(&matcher, &other)),
            }
            progress.items_done += 1;
        }

        self.session
            .send(&MavMessage::MISSION_ACK(MISSION_ACK_DATA {
                target_system: target.system_id,
                target_component: target.component_id,
                mavtype: MavMissionResult::MAV_MISSION_ACCEPTED,
                mission_type: mission_type.into(),
                ..Default::default()
            }))
            .await?;
        progress.advance(TransferState::Done);
        info!(%mission_type, items = items.len(), "download complete");
        Ok(items)
    }

    /// Download mission, fence and rally stores in turn.
    pub async fn download_all(&self) -> Result<Vec<(MissionType, Vec<MissionItem>)>, SdkError> {
        let mut stores = Vec::new();
        for mission_type in MissionType::iter() {
            stores.push((mission_type, self.download(mission_type).await?));
        }
        Ok(stores)
    }
}

fn unexpected(matcher: &Matcher, received: &VehicleMessage) -> SdkError {
    SdkError::Unexpected {
        expected: matcher.to_string(),
        received: received.kind(),
    }
}
