//! FIT profile subset: global message numbers, field numbers, scales and the
//! manufacturer table.

/// Profile version written into generated headers (21.32)
pub const PROFILE_VERSION: u16 = 2132;

/// Protocol version 2.0
pub const PROTOCOL_VERSION: u8 = 0x20;

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z)
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

/// Custom heart-rate values at or above this are `bpm + 100`
pub const HEART_RATE_OFFSET: u32 = 100;

/// Custom power values at or above this are `watts + 1000`
pub const POWER_OFFSET: u32 = 1000;

/// Degrees to semicircles
pub const SEMICIRCLES_PER_DEGREE: f64 = 2_147_483_648.0 / 180.0;

pub mod mesg_num {
    pub const FILE_ID: u16 = 0;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const WORKOUT: u16 = 26;
    pub const WORKOUT_STEP: u16 = 27;
    pub const COURSE: u16 = 31;
    pub const COURSE_POINT: u16 = 32;
}

/// Field numbers shared by every message
pub mod common {
    pub const MESSAGE_INDEX: u8 = 254;
    pub const TIMESTAMP: u8 = 253;
}

pub mod file_id {
    pub const TYPE: u8 = 0;
    pub const MANUFACTURER: u8 = 1;
    pub const PRODUCT: u8 = 2;
    pub const SERIAL_NUMBER: u8 = 3;
    pub const TIME_CREATED: u8 = 4;
    pub const PRODUCT_NAME: u8 = 8;
}

pub mod workout {
    pub const SPORT: u8 = 4;
    pub const NUM_VALID_STEPS: u8 = 6;
    pub const WKT_NAME: u8 = 8;
    pub const SUB_SPORT: u8 = 11;
    /// uint16, scale 100, meters
    pub const POOL_LENGTH: u8 = 14;
    pub const POOL_LENGTH_UNIT: u8 = 15;
}

pub mod workout_step {
    pub const WKT_STEP_NAME: u8 = 0;
    pub const DURATION_TYPE: u8 = 1;
    pub const DURATION_VALUE: u8 = 2;
    pub const TARGET_TYPE: u8 = 3;
    pub const TARGET_VALUE: u8 = 4;
    pub const CUSTOM_TARGET_VALUE_LOW: u8 = 5;
    pub const CUSTOM_TARGET_VALUE_HIGH: u8 = 6;
    pub const INTENSITY: u8 = 7;
    pub const NOTES: u8 = 8;
    pub const EQUIPMENT: u8 = 9;
}

pub mod session {
    pub const START_TIME: u8 = 2;
    pub const SPORT: u8 = 5;
    pub const SUB_SPORT: u8 = 6;
    pub const TOTAL_ELAPSED_TIME: u8 = 7;
    pub const TOTAL_TIMER_TIME: u8 = 8;
    pub const TOTAL_DISTANCE: u8 = 9;
    pub const TOTAL_CALORIES: u8 = 11;
    pub const AVG_SPEED: u8 = 14;
    pub const MAX_SPEED: u8 = 15;
    pub const AVG_HEART_RATE: u8 = 16;
    pub const MAX_HEART_RATE: u8 = 17;
    pub const AVG_CADENCE: u8 = 18;
    pub const AVG_POWER: u8 = 20;
    pub const MAX_POWER: u8 = 21;
    pub const TOTAL_ASCENT: u8 = 22;
    pub const TOTAL_DESCENT: u8 = 23;
    pub const NUM_LAPS: u8 = 26;
    pub const ENHANCED_AVG_SPEED: u8 = 124;
    pub const ENHANCED_MAX_SPEED: u8 = 125;
}

pub mod lap {
    pub const START_TIME: u8 = 2;
    pub const TOTAL_ELAPSED_TIME: u8 = 7;
    pub const TOTAL_TIMER_TIME: u8 = 8;
    pub const TOTAL_DISTANCE: u8 = 9;
    pub const TOTAL_CALORIES: u8 = 11;
    pub const AVG_SPEED: u8 = 13;
    pub const MAX_SPEED: u8 = 14;
    pub const AVG_HEART_RATE: u8 = 15;
    pub const MAX_HEART_RATE: u8 = 16;
    pub const AVG_CADENCE: u8 = 17;
    pub const AVG_POWER: u8 = 19;
    pub const MAX_POWER: u8 = 20;
    pub const LAP_TRIGGER: u8 = 24;
    pub const SPORT: u8 = 25;
    pub const ENHANCED_AVG_SPEED: u8 = 110;
    pub const ENHANCED_MAX_SPEED: u8 = 111;
}

pub mod record {
    pub const POSITION_LAT: u8 = 0;
    pub const POSITION_LONG: u8 = 1;
    /// uint16, scale 5, offset 500, meters
    pub const ALTITUDE: u8 = 2;
    pub const HEART_RATE: u8 = 3;
    pub const CADENCE: u8 = 4;
    pub const DISTANCE: u8 = 5;
    pub const SPEED: u8 = 6;
    pub const POWER: u8 = 7;
    pub const TEMPERATURE: u8 = 13;
    /// Expanded from `speed` by decoders that apply components
    pub const ENHANCED_SPEED: u8 = 73;
    pub const ENHANCED_ALTITUDE: u8 = 78;
}

pub mod event {
    pub const EVENT: u8 = 0;
    pub const EVENT_TYPE: u8 = 1;
    pub const DATA: u8 = 3;
}

pub mod course {
    pub const SPORT: u8 = 4;
    pub const NAME: u8 = 5;
    pub const SUB_SPORT: u8 = 7;
}

pub mod course_point {
    pub const TIMESTAMP: u8 = 1;
    pub const POSITION_LAT: u8 = 2;
    pub const POSITION_LONG: u8 = 3;
    pub const DISTANCE: u8 = 4;
    pub const TYPE: u8 = 5;
    pub const NAME: u8 = 6;
}

/// Scale factors for scaled-integer fields
pub mod scale {
    /// Milliseconds
    pub const TIME: f64 = 1000.0;
    /// Centimeters
    pub const DISTANCE: f64 = 100.0;
    /// Millimeters per second
    pub const SPEED: f64 = 1000.0;
    /// Centimeters, for pool length
    pub const POOL_LENGTH: f64 = 100.0;
    pub const ALTITUDE: f64 = 5.0;
    pub const ALTITUDE_OFFSET: f64 = 500.0;
}

const MANUFACTURERS: &[(u16, &str)] = &[
    (1, "garmin"),
    (15, "dynastream"),
    (23, "suunto"),
    (32, "wahoo_fitness"),
    (69, "stages_cycling"),
    (89, "tacx"),
    (123, "polar_electro"),
    (255, "development"),
    (260, "zwift"),
    (265, "strava"),
    (289, "hammerhead"),
    (294, "coros"),
];

/// Manufacturer name for a FIT id; unknown ids render as their number.
pub fn manufacturer_name(id: u16) -> String {
    MANUFACTURERS
        .iter()
        .find(|(code, _)| *code == id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| id.to_string())
}

/// FIT id for a manufacturer name or numeric string.
pub fn manufacturer_id(name: &str) -> Option<u16> {
    MANUFACTURERS
        .iter()
        .find(|(_, known)| *known == name)
        .map(|(code, _)| *code)
        .or_else(|| name.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manufacturer_table() {
        assert_eq!(manufacturer_name(1), "garmin");
        assert_eq!(manufacturer_name(9999), "9999");
        assert_eq!(manufacturer_id("zwift"), Some(260));
        assert_eq!(manufacturer_id("9999"), Some(9999));
        assert_eq!(manufacturer_id("acme"), None);
    }
}
