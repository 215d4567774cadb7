//! MAVLink framing for datagram links.
//!
//! One UDP datagram may carry several frames. [`decode_datagram`] returns
//! every frame that parses and skips the ones that do not; [`encode`]
//! always produces a single v2 frame.

use std::io::Cursor;

use mavlink::common::MavMessage;
use mavlink::error::MessageReadError;
use mavlink::peek_reader::PeekReader;
use mavlink::{MavHeader, Message};
use tracing::trace;

use crate::error::ModelError;

const MAGIC_V1: u8 = 0xFE;

/// Serialise `message` as a MAVLink v2 frame.
pub fn encode(header: MavHeader, message: &MavMessage) -> Result<Vec<u8>, ModelError> {
    let mut buf = Cursor::new(Vec::with_capacity(280));
    mavlink::write_v2_msg(&mut buf, header, message).map_err(|e| ModelError::Encode {
        message: message.message_name().to_string(),
        reason: e.to_string(),
    })?;
    Ok(buf.into_inner())
}

/// Parse every frame in a datagram.
///
/// Frames are read as v1 when the datagram starts with the v1 magic byte
/// and as v2 otherwise. Frames with bad checksums are skipped by the
/// reader; frames that pass the checksum but carry an unknown message id
/// or out-of-range field are consumed and skipped here.
pub fn decode_datagram(datagram: &[u8]) -> Vec<(MavHeader, MavMessage)> {
    let v1 = datagram.first() == Some(&MAGIC_V1);
    let mut reader = PeekReader::new(Cursor::new(datagram));
    let mut frames = Vec::new();
    loop {
        let next = if v1 {
            mavlink::read_v1_msg::<MavMessage, _>(&mut reader)
        } else {
            mavlink::read_v2_msg::<MavMessage, _>(&mut reader)
        };
        match next {
            Ok(frame) => frames.push(frame),
            Err(MessageReadError::Parse(e)) => trace!(error = %e, "skipped undecodable frame"),
            Err(MessageReadError::Io(_)) => break,
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::{
        MavMissionType, ATTITUDE_DATA, MISSION_COUNT_DATA, PARAM_REQUEST_READ_DATA,
    };

    fn header(sequence: u8) -> MavHeader {
        MavHeader {
            system_id: 255,
            component_id: 190,
            sequence,
        }
    }

    #[test]
    fn frames_survive_a_datagram() {
        let count = MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
            count: 3,
            target_system: 1,
            target_component: 1,
            mission_type: MavMissionType::MAV_MISSION_TYPE_RALLY,
            ..Default::default()
        });
        let read = MavMessage::PARAM_REQUEST_READ(PARAM_REQUEST_READ_DATA {
            param_index: -1,
            ..Default::default()
        });

        let mut datagram = encode(header(7), &count).unwrap();
        datagram.extend(encode(header(8), &read).unwrap());

        let frames = decode_datagram(&datagram);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0.sequence, 7);
        assert_eq!(frames[0].1, count);
        assert_eq!(frames[1].1, read);
    }

    /// Checksum used by MAVLink (CRC-16/MCRF4XX).
    fn x25(bytes: &[u8]) -> u16 {
        bytes.iter().fold(0xFFFF_u16, |crc, &b| {
            let mut tmp = b ^ (crc & 0xFF) as u8;
            tmp ^= tmp << 4;
            let tmp = u16::from(tmp);
            (crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4)
        })
    }

    /// A checksum-valid COMMAND_ACK whose command is not in the dialect.
    fn command_ack_with_unknown_command() -> Vec<u8> {
        let payload = [0xFE, 0xFF];
        let mut frame = vec![0xFD, payload.len() as u8, 0, 0, 0, 1, 1, 77, 0, 0];
        frame.extend_from_slice(&payload);
        let mut crc_input = frame[1..].to_vec();
        crc_input.push(MavMessage::extra_crc(77));
        frame.extend_from_slice(&x25(&crc_input).to_le_bytes());
        frame
    }

    #[test]
    fn undecodable_frame_does_not_hide_the_rest() {
        let attitude = MavMessage::ATTITUDE(ATTITUDE_DATA {
            roll: 0.5,
            ..Default::default()
        });
        let mut datagram = command_ack_with_unknown_command();
        datagram.extend(encode(header(1), &attitude).unwrap());

        let frames = decode_datagram(&datagram);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1, attitude);
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(decode_datagram(&[]).is_empty());
        assert!(decode_datagram(&[0x01, 0x02, 0x03]).is_empty());
    }
}
