//! Protocol types for the Rako controller

/// Protocol opcodes
///
/// The controller understands both the legacy opcode block (0x00-0x0F) and
/// the extended block (0x2D-0x34). Conversion from a raw byte is closed:
/// [`CommandType::from_byte`] returns `None` for codes outside this set and
/// the status decoder treats those as [`CommandType::ButtonPress`], the
/// controller's documented catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    Off = 0x00,
    FadeUp = 0x01,
    FadeDown = 0x02,
    Sc1Legacy = 0x03,
    Sc2Legacy = 0x04,
    Sc3Legacy = 0x05,
    Sc4Legacy = 0x06,
    Ident = 0x08,
    LevelSetLegacy = 0x0C,
    Store = 0x0D,
    Stop = 0x0F,
    Custom232 = 0x2D,
    Holiday = 0x2F,
    SetScene = 0x31,
    Fade = 0x32,
    ButtonPress = 0x33,
    SetLevel = 0x34,
}

impl CommandType {
    pub fn from_byte(val: u8) -> Option<Self> {
        match val {
            0x00 => Some(CommandType::Off),
            0x01 => Some(CommandType::FadeUp),
            0x02 => Some(CommandType::FadeDown),
            0x03 => Some(CommandType::Sc1Legacy),
            0x04 => Some(CommandType::Sc2Legacy),
            0x05 => Some(CommandType::Sc3Legacy),
            0x06 => Some(CommandType::Sc4Legacy),
            0x08 => Some(CommandType::Ident),
            0x0C => Some(CommandType::LevelSetLegacy),
            0x0D => Some(CommandType::Store),
            0x0F => Some(CommandType::Stop),
            0x2D => Some(CommandType::Custom232),
            0x2F => Some(CommandType::Holiday),
            0x31 => Some(CommandType::SetScene),
            0x32 => Some(CommandType::Fade),
            0x33 => Some(CommandType::ButtonPress),
            0x34 => Some(CommandType::SetLevel),
            _ => None,
        }
    }

    /// Scene number for the legacy scene-select opcodes
    ///
    /// OFF counts as scene 0; everything outside the SC1-SC4/OFF block has no
    /// scene number.
    pub fn legacy_scene(&self) -> Option<u8> {
        match self {
            CommandType::Off => Some(0),
            CommandType::Sc1Legacy => Some(1),
            CommandType::Sc2Legacy => Some(2),
            CommandType::Sc3Legacy => Some(3),
            CommandType::Sc4Legacy => Some(4),
            _ => None,
        }
    }
}

/// Controller-side fade durations, ordinal 0-5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum FadeRate {
    /// No fade
    Instant = 0,
    /// ~2 seconds
    Fast = 1,
    /// ~4 seconds
    #[default]
    Medium = 2,
    /// ~8 seconds
    Slow = 3,
    /// ~16 seconds
    VerySlow = 4,
    /// ~32 seconds
    ExtraSlow = 5,
}

impl FadeRate {
    /// Case-insensitive name lookup; unrecognized names map to MEDIUM
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "instant" => FadeRate::Instant,
            "fast" => FadeRate::Fast,
            "medium" => FadeRate::Medium,
            "slow" => FadeRate::Slow,
            "very_slow" => FadeRate::VerySlow,
            "extra_slow" => FadeRate::ExtraSlow,
            _ => FadeRate::Medium,
        }
    }

    /// Nearest rate for a requested transition duration in seconds
    pub fn from_transition(seconds: f64) -> Self {
        if seconds <= 0.0 {
            FadeRate::Instant
        } else if seconds <= 2.0 {
            FadeRate::Fast
        } else if seconds <= 4.0 {
            FadeRate::Medium
        } else if seconds <= 8.0 {
            FadeRate::Slow
        } else if seconds <= 16.0 {
            FadeRate::VerySlow
        } else {
            FadeRate::ExtraSlow
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FadeRate::Instant => "instant",
            FadeRate::Fast => "fast",
            FadeRate::Medium => "medium",
            FadeRate::Slow => "slow",
            FadeRate::VerySlow => "very_slow",
            FadeRate::ExtraSlow => "extra_slow",
        }
    }
}

/// Brightness for a legacy scene number
///
/// The table is fixed controller behavior: {0→0, 1→255, 2→192, 3→128, 4→64}.
/// Scenes outside 0-4 have no defined brightness.
pub fn scene_brightness(scene: u8) -> Option<u8> {
    match scene {
        0 => Some(0),
        1 => Some(255),
        2 => Some(192),
        3 => Some(128),
        4 => Some(64),
        _ => None,
    }
}

/// Nearest legacy scene for a brightness, used by room-level commands
pub fn scene_for_brightness(brightness: u8) -> u8 {
    if brightness == 0 {
        0
    } else if brightness >= 255 {
        1
    } else if brightness >= 192 {
        2
    } else if brightness >= 128 {
        3
    } else if brightness >= 64 {
        4
    } else {
        0
    }
}

/// A decoded controller status broadcast
///
/// Produced only by [`crate::frame::decode_status`]; construct by hand in
/// tests only. Which of `scene`/`brightness` is present depends on the
/// command type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// 10-bit room id
    pub room: u16,
    pub channel: u8,
    pub command: CommandType,
    pub scene: Option<u8>,
    pub brightness: Option<u8>,
}

/// An outbound controller command
///
/// Exactly one of `command`, `scene`, `brightness` drives the encoded opcode;
/// the encoder resolves overlaps by that precedence order and rejects a
/// command carrying none of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// 10-bit room id
    pub room: u16,
    /// Channel within the room; 0 addresses the whole room
    pub channel: u8,
    pub scene: Option<u8>,
    pub brightness: Option<u8>,
    pub command: Option<CommandType>,
    pub fade_rate: Option<FadeRate>,
}

impl Command {
    /// Level command: set a channel to an absolute brightness
    pub fn set_level(room: u16, channel: u8, brightness: u8) -> Self {
        Self {
            room,
            channel,
            scene: None,
            brightness: Some(brightness),
            command: None,
            fade_rate: None,
        }
    }

    /// Scene command: recall a preset scene
    pub fn set_scene(room: u16, channel: u8, scene: u8) -> Self {
        Self {
            room,
            channel,
            scene: Some(scene),
            brightness: None,
            command: None,
            fade_rate: None,
        }
    }

    /// Explicit opcode command (FADE_UP, STOP, IDENT, ...)
    pub fn explicit(room: u16, channel: u8, command: CommandType) -> Self {
        Self {
            room,
            channel,
            scene: None,
            brightness: None,
            command: Some(command),
            fade_rate: None,
        }
    }

    pub fn with_fade_rate(mut self, rate: FadeRate) -> Self {
        self.fade_rate = Some(rate);
        self
    }
}
