//! Decoding of device notifications.
//!
//! The device answers a request with a frame whose opcode is the request
//! opcode plus one. There is no status byte: receiving a reply is the only
//! success signal.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseResult;
use crate::opcode;
use crate::packet::Packet;
use crate::types::DeviceState;

/// A decoded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Response {
    /// Login accepted (0x11).
    LoginAck,
    /// Clock accepted (0x17).
    TimeSyncAck,
    /// Full device state (0x04).
    StateSnapshot {
        /// Reported state.
        state: DeviceState,
    },
    /// Timer slot contents (0x57).
    TimerStatus {
        /// Slot number, when the reply carries one.
        slot: Option<u8>,
        /// Raw payload.
        raw: Vec<u8>,
    },
    /// Device name (0x43).
    DeviceName {
        /// Name with trailing padding removed.
        name: String,
    },
    /// Serial number (0x0A).
    Serial {
        /// Raw payload.
        raw: Vec<u8>,
    },
    /// Scene name (0x69).
    SceneName {
        /// Name with trailing padding removed.
        name: String,
    },
    /// Reply to one of the other scene queries.
    SceneInfo {
        /// Request opcode being answered.
        query: u8,
        /// Raw payload.
        raw: Vec<u8>,
    },
    /// Bare acknowledgement of a known request.
    GenericAck {
        /// Request opcode being acknowledged.
        command: u8,
    },
    /// A frame whose opcode does not answer any known request.
    Unknown {
        /// Opcode of the frame.
        opcode: u8,
        /// Full frame bytes.
        raw: Vec<u8>,
    },
}

impl Response {
    /// Decode a notification frame.
    ///
    /// Unrecognised opcodes become [`Response::Unknown`] rather than errors.
    ///
    /// # Errors
    ///
    /// Fails only when a recognised reply carries an unusable payload, such as
    /// a short state report or an unknown mode byte.
    ///
    /// # Examples
    ///
    /// ```
    /// use gamalta_types::{Packet, Response};
    ///
    /// let packet = Packet::decode(&[0xA5, 0x20, 0x11, 0x00]).unwrap();
    /// assert_eq!(Response::decode(&packet).unwrap(), Response::LoginAck);
    ///
    /// let packet = Packet::decode(&[0xA5, 0x21, 0x51, 0x00]).unwrap();
    /// assert_eq!(Response::decode(&packet).unwrap(), Response::GenericAck { command: 0x50 });
    /// ```
    pub fn decode(packet: &Packet) -> ParseResult<Self> {
        let payload = packet.payload.as_ref();
        let Some(request) = opcode::request_for(packet.command) else {
            return Ok(Response::Unknown {
                opcode: packet.command,
                raw: packet.encode().to_vec(),
            });
        };

        let response = match request {
            opcode::LOGIN => Response::LoginAck,
            opcode::TIME_SYNC => Response::TimeSyncAck,
            opcode::STATE_QUERY => Response::StateSnapshot {
                state: DeviceState::from_payload(payload)?,
            },
            opcode::TIMER_QUERY => Response::TimerStatus {
                slot: payload.first().copied(),
                raw: payload.to_vec(),
            },
            opcode::NAME_QUERY => Response::DeviceName {
                name: ascii(payload),
            },
            opcode::SERIAL_QUERY => Response::Serial {
                raw: payload.to_vec(),
            },
            opcode::SCENE_NAME_QUERY => Response::SceneName {
                name: ascii(payload),
            },
            opcode::SCENE_POINT_QUERY
            | opcode::SCENE_POINT_COUNT_QUERY
            | opcode::SCENE_METADATA_QUERY
            | opcode::SCENE_SCHEDULE_QUERY => Response::SceneInfo {
                query: request,
                raw: payload.to_vec(),
            },
            command => Response::GenericAck { command },
        };
        Ok(response)
    }

    /// Request opcode this response answers, if any.
    #[must_use]
    pub fn request_opcode(&self) -> Option<u8> {
        match self {
            Response::LoginAck => Some(opcode::LOGIN),
            Response::TimeSyncAck => Some(opcode::TIME_SYNC),
            Response::StateSnapshot { .. } => Some(opcode::STATE_QUERY),
            Response::TimerStatus { .. } => Some(opcode::TIMER_QUERY),
            Response::DeviceName { .. } => Some(opcode::NAME_QUERY),
            Response::Serial { .. } => Some(opcode::SERIAL_QUERY),
            Response::SceneName { .. } => Some(opcode::SCENE_NAME_QUERY),
            Response::SceneInfo { query, .. } => Some(*query),
            Response::GenericAck { command } => Some(*command),
            Response::Unknown { .. } => None,
        }
    }
}

/// Decode a NUL-padded ASCII string, replacing invalid bytes.
fn ascii(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}
