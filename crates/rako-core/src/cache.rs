//! Scene/level cache document parsing
//!
//! The controller's HTTP interface serves two hex-text documents describing
//! its current state: `/scenes.htm` (current scene per room) and
//! `/levels.htm` (stored brightness per channel and scene). Fetching lives in
//! `rako-transport`; the parsers here are pure.

/// Record marker for level-cache entries ('X')
const LEVEL_RECORD_MARKER: u8 = 0x58;

/// Record type byte for level-cache entries
const LEVEL_RECORD_TYPE: u8 = 0x04;

/// Bytes per level-cache record: marker, type, flags/room, room, channel, 16 levels
const LEVEL_RECORD_SIZE: usize = 21;

/// Current scene of one room, from `/scenes.htm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneCacheEntry {
    pub room: u16,
    pub scene: u8,
}

/// Stored levels of one channel, from `/levels.htm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCacheEntry {
    pub room: u16,
    pub channel: u8,
    /// Brightness per scene slot 1-16
    pub levels: [u8; 16],
    pub active: bool,
    pub deleted: bool,
}

/// Parse the scene-cache document
///
/// The document is a run of 4-hex-digit records: scene id in the top 4 bits,
/// room id in the low 10. A leading/embedded `0x` is stripped; chunks that do
/// not parse as hex are skipped.
pub fn parse_scene_cache(text: &str) -> Vec<SceneCacheEntry> {
    let cleaned = text.replace("0x", "");
    let chars: Vec<char> = cleaned.chars().collect();

    let mut entries = Vec::new();
    for chunk in chars.chunks(4) {
        if chunk.len() < 4 {
            break;
        }
        let chunk_str: String = chunk.iter().collect();
        if let Ok(value) = u16::from_str_radix(&chunk_str, 16) {
            entries.push(SceneCacheEntry {
                room: value & 0x03FF,
                scene: ((value >> 12) & 0x0F) as u8,
            });
        }
    }
    entries
}

/// Parse the level-cache document
///
/// Records start at a 0x58 ('X') marker with type byte 0x04 and span 21
/// bytes: flags (bit 7 active, bit 6 deleted, low 2 bits the room id's high
/// bits), room low byte, channel, then 16 scene levels. Non-record bytes are
/// skipped; a truncated trailing record is discarded.
pub fn parse_level_cache(text: &str) -> Vec<LevelCacheEntry> {
    let data = match hex_to_bytes(text) {
        Some(data) => data,
        None => return Vec::new(),
    };

    let mut entries = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if data[pos] != LEVEL_RECORD_MARKER {
            pos += 1;
            continue;
        }
        if pos + LEVEL_RECORD_SIZE > data.len() {
            break;
        }
        if data[pos + 1] != LEVEL_RECORD_TYPE {
            pos += 1;
            continue;
        }

        let flags = data[pos + 2];
        let mut levels = [0u8; 16];
        levels.copy_from_slice(&data[pos + 5..pos + LEVEL_RECORD_SIZE]);

        entries.push(LevelCacheEntry {
            room: u16::from(flags & 0x03) << 8 | u16::from(data[pos + 3]),
            channel: data[pos + 4],
            levels,
            active: flags & 0x80 != 0,
            deleted: flags & 0x40 != 0,
        });

        pos += LEVEL_RECORD_SIZE;
    }
    entries
}

/// Decode a hex string into bytes, ignoring ASCII whitespace
fn hex_to_bytes(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()?;
    if digits.len() % 2 != 0 {
        return None;
    }
    Some(digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect())
}
