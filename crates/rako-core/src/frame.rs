//! Status-frame decoding and command-frame encoding
//!
//! Wire layouts (one frame per datagram, no framing beyond the datagram):
//! ```text
//! Status (controller -> us):
//!   ┌──────────────────────────────────────────────────────────┐
//!   │ Byte 0:   Marker 0x53 ('S')                              │
//!   │ Byte 1:   Declared length; payload length = byte1 - 5    │
//!   │ Byte 2-3: Room id (10 bits, big-endian; byte 2 is 0x00   │
//!   │           on every observed controller)                  │
//!   │ Byte 4:   Channel id                                     │
//!   │ Byte 5:   Opcode                                         │
//!   │ Byte 6..: Opcode-specific payload                        │
//!   └──────────────────────────────────────────────────────────┘
//! Command (us -> controller):
//!   ┌──────────────────────────────────────────────────────────┐
//!   │ Byte 0:   Marker 0x52 ('R')                              │
//!   │ Byte 1:   5 + payload length                             │
//!   │ Byte 2-3: Room id (10 bits, big-endian)                  │
//!   │ Byte 4:   Channel id                                     │
//!   │ Byte 5:   Opcode                                         │
//!   │ Byte 6..: Payload                                        │
//!   │ Last:     Checksum (two's complement of sum of bytes 1..)│
//!   └──────────────────────────────────────────────────────────┘
//! ```

use crate::types::{scene_brightness, Command, CommandType, FadeRate, StatusEvent};
use crate::{Error, Result, COMMAND_MARKER, STATUS_MARKER};
use bytes::{BufMut, Bytes, BytesMut};

/// Fixed prefix of a status frame: marker through opcode
pub const STATUS_HEADER_SIZE: usize = 6;

/// Two's-complement checksum over a command frame's bytes after the marker
///
/// A well-formed frame sums to 0 mod 256 over everything following the
/// marker, checksum byte included.
pub fn checksum(bytes: &[u8]) -> u8 {
    let total: u32 = bytes.iter().map(|&b| u32::from(b)).sum();
    ((256 - total % 256) % 256) as u8
}

/// Decode a status datagram into a [`StatusEvent`]
///
/// The declared length may overrun the datagram (observed on real
/// controllers); the payload is truncated at the frame end. Opcode bytes
/// outside the known set decode as BUTTON_PRESS and then go through the
/// normal button-press payload rules.
pub fn decode_status(frame: &[u8]) -> Result<StatusEvent> {
    if frame.len() < STATUS_HEADER_SIZE {
        return Err(Error::TruncatedFrame {
            needed: STATUS_HEADER_SIZE,
            have: frame.len(),
        });
    }
    if frame[0] != STATUS_MARKER {
        return Err(Error::InvalidMarker(frame[0]));
    }

    let data_len = (frame[1] as usize).saturating_sub(5);
    let room = u16::from(frame[2] & 0x03) << 8 | u16::from(frame[3]);
    let channel = frame[4];
    let command = CommandType::from_byte(frame[5]).unwrap_or(CommandType::ButtonPress);
    let data = &frame[STATUS_HEADER_SIZE..frame.len().min(STATUS_HEADER_SIZE + data_len)];

    match command {
        CommandType::ButtonPress => {
            let scene = data.last().copied().unwrap_or(0);
            let brightness = scene_brightness(scene).ok_or(Error::UnknownScene(scene))?;
            Ok(StatusEvent {
                room,
                channel,
                command,
                scene: Some(scene),
                brightness: Some(brightness),
            })
        }
        CommandType::LevelSetLegacy | CommandType::SetLevel => {
            if data.len() < 2 {
                return Err(Error::ShortPayload {
                    command,
                    have: data.len(),
                });
            }
            Ok(StatusEvent {
                room,
                channel,
                command,
                scene: None,
                brightness: Some(data[1]),
            })
        }
        CommandType::SetScene => {
            if data.len() < 2 {
                return Err(Error::ShortPayload {
                    command,
                    have: data.len(),
                });
            }
            let scene = data[1];
            let brightness = scene_brightness(scene).ok_or(Error::UnknownScene(scene))?;
            Ok(StatusEvent {
                room,
                channel,
                command,
                scene: Some(scene),
                brightness: Some(brightness),
            })
        }
        CommandType::FadeUp => Ok(StatusEvent {
            room,
            channel,
            command,
            scene: None,
            brightness: Some(255),
        }),
        CommandType::FadeDown => Ok(StatusEvent {
            room,
            channel,
            command,
            scene: None,
            brightness: Some(0),
        }),
        CommandType::Stop => Ok(StatusEvent {
            room,
            channel,
            command,
            scene: None,
            brightness: None,
        }),
        other => Err(Error::UnhandledCommand(other)),
    }
}

/// Encode a [`Command`] into a command frame, checksum appended
///
/// Opcode precedence: explicit command type, then scene (SET_SCENE), then
/// brightness (SET_LEVEL). The fade-rate byte defaults to MEDIUM when the
/// command carries none.
pub fn encode_command(command: &Command) -> Result<Bytes> {
    let fade = command.fade_rate.unwrap_or(FadeRate::Medium) as u8;

    let (opcode, data) = if let Some(explicit) = command.command {
        (explicit, vec![0x00])
    } else if let Some(scene) = command.scene {
        (CommandType::SetScene, vec![fade, scene])
    } else if let Some(brightness) = command.brightness {
        (CommandType::SetLevel, vec![fade, brightness])
    } else {
        return Err(Error::EmptyCommand);
    };

    let mut buf = BytesMut::with_capacity(STATUS_HEADER_SIZE + data.len() + 1);
    buf.put_u8(COMMAND_MARKER);
    buf.put_u8((5 + data.len()) as u8);
    buf.put_u8((command.room >> 8) as u8);
    buf.put_u8((command.room & 0xFF) as u8);
    buf.put_u8(command.channel);
    buf.put_u8(opcode as u8);
    buf.extend_from_slice(&data);

    let check = checksum(&buf[1..]);
    buf.put_u8(check);

    Ok(buf.freeze())
}
