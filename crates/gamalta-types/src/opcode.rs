//! Command opcodes of the Gamalta protocol.
//!
//! Every request opcode is answered (when the device answers at all) by a
//! notification carrying `request + 1`.

/// Power on/off.
/// Format: `[0x01 on / 0x02 off, 0x00, 0x00]`
pub const POWER: u8 = 0x01;

/// Query the full device state. Empty payload, answered by `STATE_RESPONSE`.
pub const STATE_QUERY: u8 = 0x03;

/// Device state notification.
/// Format: `[power, mode, brightness, R, G, B, Cool, Warm]`
pub const STATE_RESPONSE: u8 = 0x04;

/// Query the device serial number.
pub const SERIAL_QUERY: u8 = 0x09;

/// Authenticate the session.
/// Format: `[0x02, password ASCII...]`
pub const LOGIN: u8 = 0x10;

/// Set the device clock.
/// Format: `[year - 2000, month, day, weekday, hour, minute, second]`
pub const TIME_SYNC: u8 = 0x16;

/// Rename the device.
/// Format: `[name ASCII...]`
pub const NAME_SET: u8 = 0x40;

/// Query the device name. Empty payload, answered by `NAME_RESPONSE`.
pub const NAME_QUERY: u8 = 0x42;

/// Device name notification.
pub const NAME_RESPONSE: u8 = 0x43;

/// Set the five colour channels.
/// Format: `[R, G, B, Cool, Warm, apply]`
pub const COLOR: u8 = 0x50;

/// Set brightness.
/// Format: `[percent]`
pub const BRIGHTNESS: u8 = 0x52;

/// Program a timer slot.
/// Format: `[slot, raw, raw]`
pub const TIMER_SET: u8 = 0x54;

/// Query a timer slot.
/// Format: `[slot]`
pub const TIMER_QUERY: u8 = 0x56;

/// Write one point of a custom scene (or finalize with point `0xFF`).
/// Format: `[point, sH, sM, eH, eM, R, G, B, Cool, Warm, brightness]`
pub const SCENE_POINT: u8 = 0x60;

/// Query one stored scene point.
/// Format: `[scene, point]`
pub const SCENE_POINT_QUERY: u8 = 0x62;

/// Query the number of points stored for a scene.
/// Format: `[scene]`
pub const SCENE_POINT_COUNT_QUERY: u8 = 0x64;

/// Query the name of a scene.
/// Format: `[scene]`
pub const SCENE_NAME_QUERY: u8 = 0x68;

/// Select the active mode.
/// Format: `[mode]`
pub const MODE: u8 = 0x6A;

/// Write the metadata blob of the scene being edited.
pub const SCENE_METADATA: u8 = 0x6C;

/// Query the metadata blob of a scene.
/// Format: `[scene]`
pub const SCENE_METADATA_QUERY: u8 = 0x6E;

/// Query the schedule summary of a scene.
/// Format: `[scene]`
pub const SCENE_SCHEDULE_QUERY: u8 = 0x70;

/// Activate the selected scene.
/// Format: `[0x00]`
pub const SCENE_ACTIVATE: u8 = 0x72;

/// Begin editing a custom scene.
/// Format: `[scene]`
pub const SCENE_EDIT_START: u8 = 0x74;

/// Configure or preview the lightning effect.
/// Format: `[intensity, frequency, sH, sM, eH, eM, days]`
pub const LIGHTNING: u8 = 0x76;

/// Every request opcode the device is known to understand.
pub const KNOWN_REQUESTS: &[u8] = &[
    POWER,
    STATE_QUERY,
    SERIAL_QUERY,
    LOGIN,
    TIME_SYNC,
    NAME_SET,
    NAME_QUERY,
    COLOR,
    BRIGHTNESS,
    TIMER_SET,
    TIMER_QUERY,
    SCENE_POINT,
    SCENE_POINT_QUERY,
    SCENE_POINT_COUNT_QUERY,
    SCENE_NAME_QUERY,
    MODE,
    SCENE_METADATA,
    SCENE_METADATA_QUERY,
    SCENE_SCHEDULE_QUERY,
    SCENE_ACTIVATE,
    SCENE_EDIT_START,
    LIGHTNING,
];

/// Opcode of the notification answering `request`.
#[must_use]
pub const fn response_for(request: u8) -> u8 {
    request.wrapping_add(1)
}

/// Request opcode answered by `response`, if that request is a known one.
#[must_use]
pub fn request_for(response: u8) -> Option<u8> {
    let request = response.wrapping_sub(1);
    KNOWN_REQUESTS.contains(&request).then_some(request)
}

/// Human-readable name of a request opcode, for logging.
#[must_use]
pub fn name(opcode: u8) -> &'static str {
    match opcode {
        POWER => "power",
        STATE_QUERY => "state_query",
        SERIAL_QUERY => "serial_query",
        LOGIN => "login",
        TIME_SYNC => "time_sync",
        NAME_SET => "name_set",
        NAME_QUERY => "name_query",
        COLOR => "color",
        BRIGHTNESS => "brightness",
        TIMER_SET => "timer_set",
        TIMER_QUERY => "timer_query",
        SCENE_POINT => "scene_point",
        SCENE_POINT_QUERY => "scene_point_query",
        SCENE_POINT_COUNT_QUERY => "scene_point_count_query",
        SCENE_NAME_QUERY => "scene_name_query",
        MODE => "mode",
        SCENE_METADATA => "scene_metadata",
        SCENE_METADATA_QUERY => "scene_metadata_query",
        SCENE_SCHEDULE_QUERY => "scene_schedule_query",
        SCENE_ACTIVATE => "scene_activate",
        SCENE_EDIT_START => "scene_edit_start",
        LIGHTNING => "lightning",
        _ => "unknown",
    }
}
