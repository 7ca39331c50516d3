//! Typed FIT messages in adapter vocabulary.
//!
//! Enum-valued fields hold the camelCase wire names from the vocabulary
//! tables; codes with no table entry are kept as their decimal string so the
//! reader can decide what to do with them. Durations, distances and speeds are
//! in seconds, meters and meters per second. Custom workout target values keep
//! the FIT offsets (`+1000` for absolute watts, `+100` for absolute heart
//! rate, millimeters per second for speed).
//!
//! Decoded records arrive from `fitparser` with profile scales already
//! applied and enum values spelled out, so every reading helper accepts both
//! that form and the raw wire integers the encoder produces.

use chrono::{DateTime, TimeZone, Utc};
use fitparser::{profile::MesgNum, FitDataRecord, Value};

use super::codec::{FitValue, RawMessage};
use super::profile::{
    self, common, mesg_num, scale, FIT_EPOCH_OFFSET, HEART_RATE_OFFSET, POWER_OFFSET,
    SEMICIRCLES_PER_DEGREE,
};
use crate::error::{FitParsingError, KaiordError, Result};
use crate::schema::{
    CoursePointType, DurationType, Equipment, EventKind, EventType, FileType, Intensity,
    LapTrigger, Sport, SubSport, SwimStroke, TargetType, Vocabulary,
};

/// `poolLengthUnit` code for meters
pub const POOL_LENGTH_METRIC: u8 = 0;

fn date_time(value: DateTime<Utc>) -> FitValue {
    let seconds = (value.timestamp() - FIT_EPOCH_OFFSET).clamp(0, i64::from(u32::MAX - 1));
    FitValue::UInt32(seconds as u32)
}

fn read_date_time(message: &RawMessage, number: u8) -> Option<DateTime<Utc>> {
    let seconds = message.field(number)?.as_u32()?;
    Utc.timestamp_opt(i64::from(seconds) + FIT_EPOCH_OFFSET, 0)
        .single()
}

fn scaled(value: f64, factor: f64, max: f64) -> Option<f64> {
    let raw = (value * factor).round();
    (raw.is_finite() && raw >= 0.0).then_some(raw.min(max))
}

fn u32_scaled(value: Option<f64>, factor: f64) -> Option<u32> {
    value
        .and_then(|v| scaled(v, factor, f64::from(u32::MAX - 1)))
        .map(|raw| raw as u32)
}

fn u16_scaled(value: Option<f64>, factor: f64) -> Option<u16> {
    value
        .and_then(|v| scaled(v, factor, f64::from(u16::MAX - 1)))
        .map(|raw| raw as u16)
}

/// Whole-number view; decoded floats are rounded.
fn whole(value: &FitValue) -> Option<u32> {
    match value {
        FitValue::Float32(_) | FitValue::Float64(_) => value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0 && *v < f64::from(u32::MAX))
            .map(|v| v.round() as u32),
        _ => value.as_u32(),
    }
}

/// Engineering value of a scaled field. Floats already carry the profile
/// scale and offset; integers are still raw.
fn measure(value: &FitValue, factor: f64, offset: f64) -> Option<f64> {
    match value {
        FitValue::Float32(_) | FitValue::Float64(_) => value.as_f64(),
        _ => value.as_f64().map(|raw| raw / factor - offset),
    }
}

/// Raw wire units of a scaled field, whichever form it arrived in.
fn wire_units(value: &FitValue, factor: f64) -> Option<u32> {
    match value {
        FitValue::Float32(_) | FitValue::Float64(_) => u32_scaled(value.as_f64(), factor),
        _ => value.as_u32(),
    }
}

fn field_u32(message: &RawMessage, number: u8) -> Option<u32> {
    message.field(number).and_then(whole)
}

fn field_scaled(message: &RawMessage, number: u8, factor: f64) -> Option<f64> {
    message
        .field(number)
        .and_then(|value| measure(value, factor, 0.0))
}

/// Scaled field, falling back to its enhanced twin.
fn speed_field(message: &RawMessage, number: u8, enhanced: u8) -> Option<f64> {
    field_scaled(message, number, scale::SPEED)
        .or_else(|| field_scaled(message, enhanced, scale::SPEED))
}

fn field_string(message: &RawMessage, number: u8) -> Option<String> {
    message
        .field(number)
        .and_then(FitValue::as_str)
        .map(str::to_string)
}

/// `hr_less_than` to `hrLessThan`
fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Enum code of a field holding either the code or the profile name.
fn code_of<V: Vocabulary>(value: &FitValue) -> Option<u32> {
    match value {
        FitValue::String(name) => V::parse_wire(&camel_case(name)).map(|v| u32::from(v.code())),
        other => whole(other),
    }
}

fn semicircles(degrees: Option<f64>) -> Option<FitValue> {
    degrees
        .map(|d| (d * SEMICIRCLES_PER_DEGREE).round())
        .filter(|s| s.is_finite() && s.abs() < f64::from(i32::MAX))
        .map(|s| FitValue::SInt32(s as i32))
}

fn read_degrees(message: &RawMessage, number: u8) -> Option<f64> {
    message
        .field(number)
        .and_then(FitValue::as_i64)
        .map(|s| s as f64 / SEMICIRCLES_PER_DEGREE)
}

/// Wire name for an enum field; unknown codes become their decimal string
/// and unknown profile names their camelCase form.
fn wire_name<V: Vocabulary>(message: &RawMessage, number: u8) -> Option<String> {
    let name = match message.field(number)? {
        FitValue::String(name) => {
            let wire = camel_case(name);
            V::parse_wire(&wire)
                .map(|v| v.wire_name().to_string())
                .unwrap_or(wire)
        }
        other => {
            let code = whole(other)?;
            u8::try_from(code)
                .ok()
                .and_then(V::parse_code)
                .map(|v| v.wire_name().to_string())
                .unwrap_or_else(|| code.to_string())
        }
    };
    Some(name)
}

fn enum_code<V: Vocabulary>(name: &str) -> Result<u8> {
    V::parse_wire(name)
        .map(V::code)
        .or_else(|| name.parse().ok())
        .ok_or_else(|| KaiordError::FitEncoding(format!("unknown {} '{}'", V::NAME, name)))
}

fn enum_field<V: Vocabulary>(name: Option<&str>) -> Result<Option<FitValue>> {
    name.map(|n| enum_code::<V>(n).map(FitValue::Enum))
        .transpose()
}

fn missing(field: &str) -> FitParsingError {
    FitParsingError::InvalidField {
        field: field.to_string(),
        reason: "required field is missing".to_string(),
    }
}

/// FILE_ID: identifies what the file is for
#[derive(Debug, Clone, PartialEq)]
pub struct FileIdMesg {
    /// FIT `file` enum code: 4 activity, 5 workout, 6 course
    pub file_type: u8,
    pub manufacturer: Option<String>,
    pub product: Option<u16>,
    pub serial_number: Option<u32>,
    pub time_created: Option<DateTime<Utc>>,
    pub product_name: Option<String>,
}

impl FileIdMesg {
    pub fn new(file_type: u8) -> Self {
        Self {
            file_type,
            manufacturer: None,
            product: None,
            serial_number: None,
            time_created: None,
            product_name: None,
        }
    }

    fn to_raw(&self) -> Result<RawMessage> {
        let mut raw = RawMessage::new(mesg_num::FILE_ID);
        raw.push(profile::file_id::TYPE, Some(FitValue::Enum(self.file_type)));
        let manufacturer = match &self.manufacturer {
            Some(name) => Some(profile::manufacturer_id(name).ok_or_else(|| {
                KaiordError::FitEncoding(format!("unknown manufacturer '{}'", name))
            })?),
            None => None,
        };
        raw.push(
            profile::file_id::MANUFACTURER,
            manufacturer.map(FitValue::UInt16),
        );
        raw.push(profile::file_id::PRODUCT, self.product.map(FitValue::UInt16));
        raw.push(
            profile::file_id::SERIAL_NUMBER,
            self.serial_number.map(FitValue::UInt32z),
        );
        raw.push(
            profile::file_id::TIME_CREATED,
            self.time_created.map(date_time),
        );
        raw.push(
            profile::file_id::PRODUCT_NAME,
            self.product_name.clone().map(FitValue::String),
        );
        Ok(raw)
    }

    fn from_raw(raw: &RawMessage) -> std::result::Result<Self, FitParsingError> {
        let file_type = raw
            .field(profile::file_id::TYPE)
            .and_then(code_of::<FileType>)
            .and_then(|code| u8::try_from(code).ok())
            .ok_or_else(|| missing("file_id.type"))?;
        let manufacturer = match raw.field(profile::file_id::MANUFACTURER) {
            Some(FitValue::String(name)) => Some(name.clone()),
            Some(other) => whole(other)
                .and_then(|id| u16::try_from(id).ok())
                .map(profile::manufacturer_name),
            None => None,
        };
        Ok(Self {
            file_type,
            manufacturer,
            product: field_u32(raw, profile::file_id::PRODUCT).and_then(|v| u16::try_from(v).ok()),
            serial_number: field_u32(raw, profile::file_id::SERIAL_NUMBER),
            time_created: read_date_time(raw, profile::file_id::TIME_CREATED),
            product_name: field_string(raw, profile::file_id::PRODUCT_NAME),
        })
    }
}

/// WORKOUT header
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutMesg {
    pub wkt_name: Option<String>,
    pub sport: String,
    pub sub_sport: Option<String>,
    pub num_valid_steps: u16,
    /// Meters
    pub pool_length: Option<f64>,
    pub pool_length_unit: Option<u8>,
}

impl WorkoutMesg {
    fn to_raw(&self) -> Result<RawMessage> {
        let mut raw = RawMessage::new(mesg_num::WORKOUT);
        raw.push(
            profile::workout::WKT_NAME,
            self.wkt_name.clone().map(FitValue::String),
        );
        raw.push(
            profile::workout::SPORT,
            enum_field::<Sport>(Some(&self.sport))?,
        );
        raw.push(
            profile::workout::SUB_SPORT,
            enum_field::<SubSport>(self.sub_sport.as_deref())?,
        );
        raw.push(
            profile::workout::NUM_VALID_STEPS,
            Some(FitValue::UInt16(self.num_valid_steps)),
        );
        raw.push(
            profile::workout::POOL_LENGTH,
            u16_scaled(self.pool_length, scale::POOL_LENGTH).map(FitValue::UInt16),
        );
        raw.push(
            profile::workout::POOL_LENGTH_UNIT,
            self.pool_length_unit.map(FitValue::Enum),
        );
        Ok(raw)
    }

    fn from_raw(raw: &RawMessage) -> std::result::Result<Self, FitParsingError> {
        Ok(Self {
            wkt_name: field_string(raw, profile::workout::WKT_NAME),
            sport: wire_name::<Sport>(raw, profile::workout::SPORT)
                .unwrap_or_else(|| Sport::Generic.as_wire().to_string()),
            sub_sport: wire_name::<SubSport>(raw, profile::workout::SUB_SPORT),
            num_valid_steps: field_u32(raw, profile::workout::NUM_VALID_STEPS)
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or_default(),
            pool_length: field_scaled(raw, profile::workout::POOL_LENGTH, scale::POOL_LENGTH),
            pool_length_unit: match raw.field(profile::workout::POOL_LENGTH_UNIT) {
                Some(FitValue::String(unit)) => match unit.as_str() {
                    "metric" => Some(POOL_LENGTH_METRIC),
                    "statute" => Some(1),
                    _ => None,
                },
                Some(other) => whole(other).and_then(|v| u8::try_from(v).ok()),
                None => None,
            },
        })
    }
}

/// WORKOUT_STEP with its `duration_value`/`target_value` subfields resolved
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutStepMesg {
    pub message_index: u16,
    pub wkt_step_name: Option<String>,
    pub duration_type: String,
    /// Seconds; also the threshold of `repeatUntilTime`
    pub duration_time: Option<f64>,
    /// Meters; also the threshold of `repeatUntilDistance`
    pub duration_distance: Option<f64>,
    /// Beats per minute
    pub duration_hr: Option<u32>,
    /// Percent of max heart rate, for wire values below the `+100` offset
    pub duration_hr_percent: Option<u32>,
    pub duration_calories: Option<u32>,
    /// Watts
    pub duration_power: Option<u32>,
    /// Step a repeat loops back to
    pub duration_step: Option<u32>,
    /// Repetitions of a `repeatUntilStepsCmplt` step
    pub repeat_steps: Option<u32>,
    pub target_type: String,
    /// Zone number or swim stroke code
    pub target_value: Option<u32>,
    pub custom_target_value_low: Option<u32>,
    pub custom_target_value_high: Option<u32>,
    pub intensity: Option<String>,
    pub notes: Option<String>,
    pub equipment: Option<String>,
}

impl WorkoutStepMesg {
    pub fn new(message_index: u16, duration_type: &str, target_type: &str) -> Self {
        Self {
            message_index,
            wkt_step_name: None,
            duration_type: duration_type.to_string(),
            duration_time: None,
            duration_distance: None,
            duration_hr: None,
            duration_hr_percent: None,
            duration_calories: None,
            duration_power: None,
            duration_step: None,
            repeat_steps: None,
            target_type: target_type.to_string(),
            target_value: None,
            custom_target_value_low: None,
            custom_target_value_high: None,
            intensity: None,
            notes: None,
            equipment: None,
        }
    }

    fn duration_kind(&self) -> Option<DurationType> {
        DurationType::from_wire(&self.duration_type)
    }

    fn wire_duration_value(&self) -> Option<u32> {
        use DurationType::*;
        match self.duration_kind()? {
            Time => u32_scaled(self.duration_time, scale::TIME),
            Distance => u32_scaled(self.duration_distance, scale::DISTANCE),
            HeartRateLessThan | HeartRateGreaterThan => self.wire_hr(),
            Calories => self.duration_calories,
            PowerLessThan | PowerGreaterThan => self.duration_power.map(|w| w + POWER_OFFSET),
            Open => None,
            RepeatUntilStepsComplete
            | RepeatUntilTime
            | RepeatUntilDistance
            | RepeatUntilCalories
            | RepeatUntilHeartRateLessThan
            | RepeatUntilHeartRateGreaterThan
            | RepeatUntilPowerLessThan
            | RepeatUntilPowerGreaterThan => self.duration_step,
        }
    }

    fn wire_hr(&self) -> Option<u32> {
        self.duration_hr
            .map(|bpm| bpm + HEART_RATE_OFFSET)
            .or_else(|| self.duration_hr_percent.map(|p| p.min(HEART_RATE_OFFSET - 1)))
    }

    /// Repeat steps reuse `target_value` for their threshold.
    fn wire_target_value(&self) -> Option<u32> {
        use DurationType::*;
        match self.duration_kind() {
            Some(RepeatUntilStepsComplete) => self.repeat_steps,
            Some(RepeatUntilTime) => u32_scaled(self.duration_time, scale::TIME),
            Some(RepeatUntilDistance) => u32_scaled(self.duration_distance, scale::DISTANCE),
            Some(RepeatUntilCalories) => self.duration_calories,
            Some(RepeatUntilHeartRateLessThan | RepeatUntilHeartRateGreaterThan) => {
                self.wire_hr()
            }
            Some(RepeatUntilPowerLessThan | RepeatUntilPowerGreaterThan) => {
                self.duration_power.map(|w| w + POWER_OFFSET)
            }
            _ => self.target_value,
        }
    }

    fn to_raw(&self) -> Result<RawMessage> {
        use profile::workout_step as f;

        let mut raw = RawMessage::new(mesg_num::WORKOUT_STEP);
        raw.push(
            common::MESSAGE_INDEX,
            Some(FitValue::UInt16(self.message_index)),
        );
        raw.push(
            f::WKT_STEP_NAME,
            self.wkt_step_name.clone().map(FitValue::String),
        );
        raw.push(
            f::DURATION_TYPE,
            enum_field::<DurationType>(Some(&self.duration_type))?,
        );
        raw.push(
            f::DURATION_VALUE,
            self.wire_duration_value().map(FitValue::UInt32),
        );
        raw.push(
            f::TARGET_TYPE,
            enum_field::<TargetType>(Some(&self.target_type))?,
        );
        raw.push(
            f::TARGET_VALUE,
            self.wire_target_value().map(FitValue::UInt32),
        );
        raw.push(
            f::CUSTOM_TARGET_VALUE_LOW,
            self.custom_target_value_low.map(FitValue::UInt32),
        );
        raw.push(
            f::CUSTOM_TARGET_VALUE_HIGH,
            self.custom_target_value_high.map(FitValue::UInt32),
        );
        raw.push(
            f::INTENSITY,
            enum_field::<Intensity>(self.intensity.as_deref())?,
        );
        raw.push(f::NOTES, self.notes.clone().map(FitValue::String));
        raw.push(
            f::EQUIPMENT,
            enum_field::<Equipment>(self.equipment.as_deref())?,
        );
        Ok(raw)
    }

    fn from_raw(raw: &RawMessage) -> std::result::Result<Self, FitParsingError> {
        use profile::workout_step as f;
        use DurationType::*;

        let message_index = field_u32(raw, common::MESSAGE_INDEX)
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| missing("workout_step.message_index"))?;
        let duration_type = wire_name::<DurationType>(raw, f::DURATION_TYPE)
            .unwrap_or_else(|| Open.as_wire().to_string());
        let target_type = wire_name::<TargetType>(raw, f::TARGET_TYPE)
            .unwrap_or_else(|| TargetType::Open.as_wire().to_string());

        let mut step = Self::new(message_index, &duration_type, &target_type);
        step.wkt_step_name = field_string(raw, f::WKT_STEP_NAME);
        // speed bounds stay in mm/s whichever form they were decoded in
        let custom_factor = if TargetType::from_wire(&target_type) == Some(TargetType::Pace) {
            scale::SPEED
        } else {
            1.0
        };
        step.custom_target_value_low = raw
            .field(f::CUSTOM_TARGET_VALUE_LOW)
            .and_then(|v| wire_units(v, custom_factor));
        step.custom_target_value_high = raw
            .field(f::CUSTOM_TARGET_VALUE_HIGH)
            .and_then(|v| wire_units(v, custom_factor));
        step.intensity = wire_name::<Intensity>(raw, f::INTENSITY);
        step.notes = field_string(raw, f::NOTES);
        step.equipment = wire_name::<Equipment>(raw, f::EQUIPMENT);

        let duration_value = raw.field(f::DURATION_VALUE);
        let target_value = raw.field(f::TARGET_VALUE);
        let time = |v: Option<&FitValue>| v.and_then(|v| measure(v, scale::TIME, 0.0));
        let distance = |v: Option<&FitValue>| v.and_then(|v| measure(v, scale::DISTANCE, 0.0));
        let count = |v: Option<&FitValue>| v.and_then(whole);
        let power = |v: Option<&FitValue>| {
            count(v).map(|v| v.checked_sub(POWER_OFFSET).unwrap_or(v))
        };
        let read_hr = |step: &mut Self, v: Option<&FitValue>| match count(v) {
            Some(v) if v >= HEART_RATE_OFFSET => step.duration_hr = Some(v - HEART_RATE_OFFSET),
            percent => step.duration_hr_percent = percent,
        };

        match step.duration_kind() {
            Some(Time) => step.duration_time = time(duration_value),
            Some(Distance) => step.duration_distance = distance(duration_value),
            Some(HeartRateLessThan | HeartRateGreaterThan) => read_hr(&mut step, duration_value),
            Some(Calories) => step.duration_calories = count(duration_value),
            Some(PowerLessThan | PowerGreaterThan) => step.duration_power = power(duration_value),
            Some(Open) | None => {}
            Some(RepeatUntilStepsComplete) => {
                step.duration_step = count(duration_value);
                step.repeat_steps = count(target_value);
            }
            Some(RepeatUntilTime) => {
                step.duration_step = count(duration_value);
                step.duration_time = time(target_value);
            }
            Some(RepeatUntilDistance) => {
                step.duration_step = count(duration_value);
                step.duration_distance = distance(target_value);
            }
            Some(RepeatUntilCalories) => {
                step.duration_step = count(duration_value);
                step.duration_calories = count(target_value);
            }
            Some(RepeatUntilHeartRateLessThan | RepeatUntilHeartRateGreaterThan) => {
                step.duration_step = count(duration_value);
                read_hr(&mut step, target_value);
            }
            Some(RepeatUntilPowerLessThan | RepeatUntilPowerGreaterThan) => {
                step.duration_step = count(duration_value);
                step.duration_power = power(target_value);
            }
        }
        if !step.duration_type.starts_with("repeat") {
            step.target_value = target_value.and_then(code_of::<SwimStroke>);
        }

        Ok(step)
    }
}

/// SESSION summary
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMesg {
    pub timestamp: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
    pub total_elapsed_time: f64,
    pub total_timer_time: Option<f64>,
    pub total_distance: Option<f64>,
    pub sport: String,
    pub sub_sport: Option<String>,
    pub avg_heart_rate: Option<u8>,
    pub max_heart_rate: Option<u8>,
    pub avg_cadence: Option<u8>,
    pub avg_power: Option<u16>,
    pub max_power: Option<u16>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub total_calories: Option<u16>,
    pub total_ascent: Option<u16>,
    pub total_descent: Option<u16>,
    pub num_laps: Option<u16>,
}

impl SessionMesg {
    fn to_raw(&self) -> Result<RawMessage> {
        use profile::session as f;

        let mut raw = RawMessage::new(mesg_num::SESSION);
        raw.push(common::TIMESTAMP, self.timestamp.map(date_time));
        raw.push(f::START_TIME, Some(date_time(self.start_time)));
        raw.push(
            f::TOTAL_ELAPSED_TIME,
            u32_scaled(Some(self.total_elapsed_time), scale::TIME).map(FitValue::UInt32),
        );
        raw.push(
            f::TOTAL_TIMER_TIME,
            u32_scaled(self.total_timer_time, scale::TIME).map(FitValue::UInt32),
        );
        raw.push(
            f::TOTAL_DISTANCE,
            u32_scaled(self.total_distance, scale::DISTANCE).map(FitValue::UInt32),
        );
        raw.push(f::SPORT, enum_field::<Sport>(Some(&self.sport))?);
        raw.push(
            f::SUB_SPORT,
            enum_field::<SubSport>(self.sub_sport.as_deref())?,
        );
        raw.push(f::AVG_HEART_RATE, self.avg_heart_rate.map(FitValue::UInt8));
        raw.push(f::MAX_HEART_RATE, self.max_heart_rate.map(FitValue::UInt8));
        raw.push(f::AVG_CADENCE, self.avg_cadence.map(FitValue::UInt8));
        raw.push(f::AVG_POWER, self.avg_power.map(FitValue::UInt16));
        raw.push(f::MAX_POWER, self.max_power.map(FitValue::UInt16));
        raw.push(
            f::AVG_SPEED,
            u16_scaled(self.avg_speed, scale::SPEED).map(FitValue::UInt16),
        );
        raw.push(
            f::MAX_SPEED,
            u16_scaled(self.max_speed, scale::SPEED).map(FitValue::UInt16),
        );
        raw.push(f::TOTAL_CALORIES, self.total_calories.map(FitValue::UInt16));
        raw.push(f::TOTAL_ASCENT, self.total_ascent.map(FitValue::UInt16));
        raw.push(f::TOTAL_DESCENT, self.total_descent.map(FitValue::UInt16));
        raw.push(f::NUM_LAPS, self.num_laps.map(FitValue::UInt16));
        Ok(raw)
    }

    fn from_raw(raw: &RawMessage) -> std::result::Result<Self, FitParsingError> {
        use profile::session as f;

        let timestamp = read_date_time(raw, common::TIMESTAMP);
        Ok(Self {
            timestamp,
            start_time: read_date_time(raw, f::START_TIME)
                .or(timestamp)
                .ok_or_else(|| missing("session.start_time"))?,
            total_elapsed_time: field_scaled(raw, f::TOTAL_ELAPSED_TIME, scale::TIME)
                .ok_or_else(|| missing("session.total_elapsed_time"))?,
            total_timer_time: field_scaled(raw, f::TOTAL_TIMER_TIME, scale::TIME),
            total_distance: field_scaled(raw, f::TOTAL_DISTANCE, scale::DISTANCE),
            sport: wire_name::<Sport>(raw, f::SPORT)
                .unwrap_or_else(|| Sport::Generic.as_wire().to_string()),
            sub_sport: wire_name::<SubSport>(raw, f::SUB_SPORT),
            avg_heart_rate: small(raw, f::AVG_HEART_RATE),
            max_heart_rate: small(raw, f::MAX_HEART_RATE),
            avg_cadence: small(raw, f::AVG_CADENCE),
            avg_power: medium(raw, f::AVG_POWER),
            max_power: medium(raw, f::MAX_POWER),
            avg_speed: speed_field(raw, f::AVG_SPEED, f::ENHANCED_AVG_SPEED),
            max_speed: speed_field(raw, f::MAX_SPEED, f::ENHANCED_MAX_SPEED),
            total_calories: medium(raw, f::TOTAL_CALORIES),
            total_ascent: medium(raw, f::TOTAL_ASCENT),
            total_descent: medium(raw, f::TOTAL_DESCENT),
            num_laps: medium(raw, f::NUM_LAPS),
        })
    }
}

fn small(raw: &RawMessage, number: u8) -> Option<u8> {
    field_u32(raw, number).and_then(|v| u8::try_from(v).ok())
}

fn medium(raw: &RawMessage, number: u8) -> Option<u16> {
    field_u32(raw, number).and_then(|v| u16::try_from(v).ok())
}

/// LAP summary
#[derive(Debug, Clone, PartialEq)]
pub struct LapMesg {
    pub timestamp: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
    pub total_elapsed_time: f64,
    pub total_timer_time: Option<f64>,
    pub total_distance: Option<f64>,
    pub avg_heart_rate: Option<u8>,
    pub max_heart_rate: Option<u8>,
    pub avg_cadence: Option<u8>,
    pub avg_power: Option<u16>,
    pub max_power: Option<u16>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub total_calories: Option<u16>,
    pub lap_trigger: Option<String>,
    pub sport: Option<String>,
}

impl LapMesg {
    fn to_raw(&self) -> Result<RawMessage> {
        use profile::lap as f;

        let mut raw = RawMessage::new(mesg_num::LAP);
        raw.push(common::TIMESTAMP, self.timestamp.map(date_time));
        raw.push(f::START_TIME, Some(date_time(self.start_time)));
        raw.push(
            f::TOTAL_ELAPSED_TIME,
            u32_scaled(Some(self.total_elapsed_time), scale::TIME).map(FitValue::UInt32),
        );
        raw.push(
            f::TOTAL_TIMER_TIME,
            u32_scaled(self.total_timer_time, scale::TIME).map(FitValue::UInt32),
        );
        raw.push(
            f::TOTAL_DISTANCE,
            u32_scaled(self.total_distance, scale::DISTANCE).map(FitValue::UInt32),
        );
        raw.push(f::TOTAL_CALORIES, self.total_calories.map(FitValue::UInt16));
        raw.push(
            f::AVG_SPEED,
            u16_scaled(self.avg_speed, scale::SPEED).map(FitValue::UInt16),
        );
        raw.push(
            f::MAX_SPEED,
            u16_scaled(self.max_speed, scale::SPEED).map(FitValue::UInt16),
        );
        raw.push(f::AVG_HEART_RATE, self.avg_heart_rate.map(FitValue::UInt8));
        raw.push(f::MAX_HEART_RATE, self.max_heart_rate.map(FitValue::UInt8));
        raw.push(f::AVG_CADENCE, self.avg_cadence.map(FitValue::UInt8));
        raw.push(f::AVG_POWER, self.avg_power.map(FitValue::UInt16));
        raw.push(f::MAX_POWER, self.max_power.map(FitValue::UInt16));
        raw.push(
            f::LAP_TRIGGER,
            enum_field::<LapTrigger>(self.lap_trigger.as_deref())?,
        );
        raw.push(f::SPORT, enum_field::<Sport>(self.sport.as_deref())?);
        Ok(raw)
    }

    fn from_raw(raw: &RawMessage) -> std::result::Result<Self, FitParsingError> {
        use profile::lap as f;

        let timestamp = read_date_time(raw, common::TIMESTAMP);
        Ok(Self {
            timestamp,
            start_time: read_date_time(raw, f::START_TIME)
                .or(timestamp)
                .ok_or_else(|| missing("lap.start_time"))?,
            total_elapsed_time: field_scaled(raw, f::TOTAL_ELAPSED_TIME, scale::TIME)
                .ok_or_else(|| missing("lap.total_elapsed_time"))?,
            total_timer_time: field_scaled(raw, f::TOTAL_TIMER_TIME, scale::TIME),
            total_distance: field_scaled(raw, f::TOTAL_DISTANCE, scale::DISTANCE),
            avg_heart_rate: small(raw, f::AVG_HEART_RATE),
            max_heart_rate: small(raw, f::MAX_HEART_RATE),
            avg_cadence: small(raw, f::AVG_CADENCE),
            avg_power: medium(raw, f::AVG_POWER),
            max_power: medium(raw, f::MAX_POWER),
            avg_speed: speed_field(raw, f::AVG_SPEED, f::ENHANCED_AVG_SPEED),
            max_speed: speed_field(raw, f::MAX_SPEED, f::ENHANCED_MAX_SPEED),
            total_calories: medium(raw, f::TOTAL_CALORIES),
            lap_trigger: wire_name::<LapTrigger>(raw, f::LAP_TRIGGER),
            sport: wire_name::<Sport>(raw, f::SPORT),
        })
    }
}

/// RECORD sample
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMesg {
    pub timestamp: DateTime<Utc>,
    /// Degrees
    pub position_lat: Option<f64>,
    pub position_long: Option<f64>,
    /// Meters
    pub altitude: Option<f64>,
    pub heart_rate: Option<u8>,
    pub cadence: Option<u8>,
    pub distance: Option<f64>,
    pub speed: Option<f64>,
    pub power: Option<u16>,
    pub temperature: Option<i8>,
}

impl RecordMesg {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            position_lat: None,
            position_long: None,
            altitude: None,
            heart_rate: None,
            cadence: None,
            distance: None,
            speed: None,
            power: None,
            temperature: None,
        }
    }

    fn to_raw(&self) -> RawMessage {
        use profile::record as f;

        let mut raw = RawMessage::new(mesg_num::RECORD);
        raw.push(common::TIMESTAMP, Some(date_time(self.timestamp)));
        raw.push(f::POSITION_LAT, semicircles(self.position_lat));
        raw.push(f::POSITION_LONG, semicircles(self.position_long));
        raw.push(
            f::ALTITUDE,
            u16_scaled(
                self.altitude.map(|a| a + scale::ALTITUDE_OFFSET),
                scale::ALTITUDE,
            )
            .map(FitValue::UInt16),
        );
        raw.push(f::HEART_RATE, self.heart_rate.map(FitValue::UInt8));
        raw.push(f::CADENCE, self.cadence.map(FitValue::UInt8));
        raw.push(
            f::DISTANCE,
            u32_scaled(self.distance, scale::DISTANCE).map(FitValue::UInt32),
        );
        raw.push(
            f::SPEED,
            u16_scaled(self.speed, scale::SPEED).map(FitValue::UInt16),
        );
        raw.push(f::POWER, self.power.map(FitValue::UInt16));
        raw.push(f::TEMPERATURE, self.temperature.map(FitValue::SInt8));
        raw
    }

    fn from_raw(raw: &RawMessage) -> std::result::Result<Self, FitParsingError> {
        use profile::record as f;

        Ok(Self {
            timestamp: read_date_time(raw, common::TIMESTAMP)
                .ok_or_else(|| missing("record.timestamp"))?,
            position_lat: read_degrees(raw, f::POSITION_LAT),
            position_long: read_degrees(raw, f::POSITION_LONG),
            altitude: raw
                .field(f::ALTITUDE)
                .or_else(|| raw.field(f::ENHANCED_ALTITUDE))
                .and_then(|v| measure(v, scale::ALTITUDE, scale::ALTITUDE_OFFSET)),
            heart_rate: small(raw, f::HEART_RATE),
            cadence: small(raw, f::CADENCE),
            distance: field_scaled(raw, f::DISTANCE, scale::DISTANCE),
            speed: speed_field(raw, f::SPEED, f::ENHANCED_SPEED),
            power: medium(raw, f::POWER),
            temperature: raw
                .field(f::TEMPERATURE)
                .and_then(FitValue::as_i64)
                .and_then(|t| i8::try_from(t).ok()),
        })
    }
}

/// EVENT
#[derive(Debug, Clone, PartialEq)]
pub struct EventMesg {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub event_type: String,
    pub data: Option<u32>,
}

impl EventMesg {
    fn to_raw(&self) -> Result<RawMessage> {
        use profile::event as f;

        let mut raw = RawMessage::new(mesg_num::EVENT);
        raw.push(common::TIMESTAMP, Some(date_time(self.timestamp)));
        raw.push(f::EVENT, enum_field::<EventKind>(Some(&self.event))?);
        raw.push(
            f::EVENT_TYPE,
            enum_field::<EventType>(Some(&self.event_type))?,
        );
        raw.push(f::DATA, self.data.map(FitValue::UInt32));
        Ok(raw)
    }

    fn from_raw(raw: &RawMessage) -> std::result::Result<Self, FitParsingError> {
        use profile::event as f;

        Ok(Self {
            timestamp: read_date_time(raw, common::TIMESTAMP)
                .ok_or_else(|| missing("event.timestamp"))?,
            event: wire_name::<EventKind>(raw, f::EVENT).ok_or_else(|| missing("event.event"))?,
            event_type: wire_name::<EventType>(raw, f::EVENT_TYPE)
                .ok_or_else(|| missing("event.event_type"))?,
            data: field_u32(raw, f::DATA),
        })
    }
}

/// COURSE header
#[derive(Debug, Clone, PartialEq)]
pub struct CourseMesg {
    pub name: Option<String>,
    pub sport: Option<String>,
    pub sub_sport: Option<String>,
}

impl CourseMesg {
    fn to_raw(&self) -> Result<RawMessage> {
        use profile::course as f;

        let mut raw = RawMessage::new(mesg_num::COURSE);
        raw.push(f::SPORT, enum_field::<Sport>(self.sport.as_deref())?);
        raw.push(f::NAME, self.name.clone().map(FitValue::String));
        raw.push(
            f::SUB_SPORT,
            enum_field::<SubSport>(self.sub_sport.as_deref())?,
        );
        Ok(raw)
    }

    fn from_raw(raw: &RawMessage) -> Self {
        use profile::course as f;

        Self {
            name: field_string(raw, f::NAME),
            sport: wire_name::<Sport>(raw, f::SPORT),
            sub_sport: wire_name::<SubSport>(raw, f::SUB_SPORT),
        }
    }
}

/// COURSE_POINT
#[derive(Debug, Clone, PartialEq)]
pub struct CoursePointMesg {
    pub message_index: u16,
    pub timestamp: Option<DateTime<Utc>>,
    pub position_lat: Option<f64>,
    pub position_long: Option<f64>,
    pub distance: Option<f64>,
    pub point_type: String,
    pub name: Option<String>,
}

impl CoursePointMesg {
    fn to_raw(&self) -> Result<RawMessage> {
        use profile::course_point as f;

        let mut raw = RawMessage::new(mesg_num::COURSE_POINT);
        raw.push(
            common::MESSAGE_INDEX,
            Some(FitValue::UInt16(self.message_index)),
        );
        raw.push(f::TIMESTAMP, self.timestamp.map(date_time));
        raw.push(f::POSITION_LAT, semicircles(self.position_lat));
        raw.push(f::POSITION_LONG, semicircles(self.position_long));
        raw.push(
            f::DISTANCE,
            u32_scaled(self.distance, scale::DISTANCE).map(FitValue::UInt32),
        );
        raw.push(
            f::TYPE,
            enum_field::<CoursePointType>(Some(&self.point_type))?,
        );
        raw.push(f::NAME, self.name.clone().map(FitValue::String));
        Ok(raw)
    }

    fn from_raw(raw: &RawMessage) -> Self {
        use profile::course_point as f;

        Self {
            message_index: medium(raw, common::MESSAGE_INDEX).unwrap_or_default(),
            timestamp: read_date_time(raw, f::TIMESTAMP),
            position_lat: read_degrees(raw, f::POSITION_LAT),
            position_long: read_degrees(raw, f::POSITION_LONG),
            distance: field_scaled(raw, f::DISTANCE, scale::DISTANCE),
            point_type: wire_name::<CoursePointType>(raw, f::TYPE)
                .unwrap_or_else(|| CoursePointType::Generic.as_wire().to_string()),
            name: field_string(raw, f::NAME),
        }
    }
}

/// The message set of one FIT file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitMessages {
    pub file_id_mesgs: Vec<FileIdMesg>,
    pub workout_mesgs: Vec<WorkoutMesg>,
    pub workout_step_mesgs: Vec<WorkoutStepMesg>,
    pub course_mesgs: Vec<CourseMesg>,
    pub course_point_mesgs: Vec<CoursePointMesg>,
    pub event_mesgs: Vec<EventMesg>,
    pub record_mesgs: Vec<RecordMesg>,
    pub lap_mesgs: Vec<LapMesg>,
    pub session_mesgs: Vec<SessionMesg>,
}

impl FitMessages {
    /// Raw messages in file order: identity, definitions, then activity data.
    pub fn to_raw(&self) -> Result<Vec<RawMessage>> {
        let mut raw = Vec::new();
        for m in &self.file_id_mesgs {
            raw.push(m.to_raw()?);
        }
        for m in &self.workout_mesgs {
            raw.push(m.to_raw()?);
        }
        for m in &self.workout_step_mesgs {
            raw.push(m.to_raw()?);
        }
        for m in &self.course_mesgs {
            raw.push(m.to_raw()?);
        }
        for m in &self.course_point_mesgs {
            raw.push(m.to_raw()?);
        }
        for m in &self.event_mesgs {
            raw.push(m.to_raw()?);
        }
        raw.extend(self.record_mesgs.iter().map(RecordMesg::to_raw));
        for m in &self.lap_mesgs {
            raw.push(m.to_raw()?);
        }
        for m in &self.session_mesgs {
            raw.push(m.to_raw()?);
        }
        Ok(raw)
    }

    /// Group the records `fitparser` decoded by message type.
    pub fn from_records(records: &[FitDataRecord]) -> std::result::Result<Self, FitParsingError> {
        let raw: Vec<RawMessage> = records.iter().filter_map(raw_message).collect();
        Self::from_raw(&raw)
    }

    /// Group numbered messages by type; unknown global numbers are ignored.
    pub fn from_raw(raw: &[RawMessage]) -> std::result::Result<Self, FitParsingError> {
        let mut messages = FitMessages::default();
        for message in raw {
            match message.global {
                mesg_num::FILE_ID => messages.file_id_mesgs.push(FileIdMesg::from_raw(message)?),
                mesg_num::WORKOUT => messages.workout_mesgs.push(WorkoutMesg::from_raw(message)?),
                mesg_num::WORKOUT_STEP => messages
                    .workout_step_mesgs
                    .push(WorkoutStepMesg::from_raw(message)?),
                mesg_num::COURSE => messages.course_mesgs.push(CourseMesg::from_raw(message)),
                mesg_num::COURSE_POINT => messages
                    .course_point_mesgs
                    .push(CoursePointMesg::from_raw(message)),
                mesg_num::EVENT => messages.event_mesgs.push(EventMesg::from_raw(message)?),
                mesg_num::RECORD => messages.record_mesgs.push(RecordMesg::from_raw(message)?),
                mesg_num::LAP => messages.lap_mesgs.push(LapMesg::from_raw(message)?),
                mesg_num::SESSION => messages.session_mesgs.push(SessionMesg::from_raw(message)?),
                _ => {}
            }
        }
        Ok(messages)
    }
}

fn raw_message(record: &FitDataRecord) -> Option<RawMessage> {
    let global = match record.kind() {
        MesgNum::FileId => mesg_num::FILE_ID,
        MesgNum::Workout => mesg_num::WORKOUT,
        MesgNum::WorkoutStep => mesg_num::WORKOUT_STEP,
        MesgNum::Course => mesg_num::COURSE,
        MesgNum::CoursePoint => mesg_num::COURSE_POINT,
        MesgNum::Event => mesg_num::EVENT,
        MesgNum::Record => mesg_num::RECORD,
        MesgNum::Lap => mesg_num::LAP,
        MesgNum::Session => mesg_num::SESSION,
        _ => return None,
    };

    let mut message = RawMessage::new(global);
    for field in record.fields() {
        // first occurrence wins over expanded components
        if message.field(field.number()).is_none() {
            message.push(field.number(), raw_value(field.value()));
        }
    }
    Some(message)
}

fn raw_value(value: &Value) -> Option<FitValue> {
    let converted = match value {
        Value::Timestamp(ts) => {
            FitValue::UInt32(u32::try_from(ts.timestamp() - FIT_EPOCH_OFFSET).ok()?)
        }
        Value::Enum(v) => FitValue::Enum(*v),
        Value::Byte(v) | Value::UInt8(v) | Value::UInt8z(v) => FitValue::UInt8(*v),
        Value::UInt16(v) | Value::UInt16z(v) => FitValue::UInt16(*v),
        Value::UInt32(v) => FitValue::UInt32(*v),
        Value::UInt32z(v) => FitValue::UInt32z(*v),
        Value::UInt64(v) | Value::UInt64z(v) => FitValue::UInt64(*v),
        Value::SInt8(v) => FitValue::SInt8(*v),
        Value::SInt16(v) => FitValue::SInt16(*v),
        Value::SInt32(v) => FitValue::SInt32(*v),
        Value::SInt64(v) => FitValue::SInt64(*v),
        Value::Float32(v) => FitValue::Float32(*v),
        Value::Float64(v) => FitValue::Float64(*v),
        Value::String(text) => FitValue::String(text.clone()),
        Value::Array(values) => return values.iter().find_map(raw_value),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_duration_offset() {
        let mut step = WorkoutStepMesg::new(0, "powerGreaterThan", "open");
        step.duration_power = Some(250);
        let raw = step.to_raw().unwrap();
        assert_eq!(
            raw.field(profile::workout_step::DURATION_VALUE),
            Some(&FitValue::UInt32(1250))
        );
        assert_eq!(WorkoutStepMesg::from_raw(&raw).unwrap(), step);
    }

    #[test]
    fn test_conditional_repeat_uses_target_value_for_threshold() {
        let mut step = WorkoutStepMesg::new(3, "repeatUntilPowerGreaterThan", "open");
        step.duration_step = Some(1);
        step.duration_power = Some(300);
        let raw = step.to_raw().unwrap();

        assert_eq!(
            raw.field(profile::workout_step::DURATION_VALUE),
            Some(&FitValue::UInt32(1))
        );
        assert_eq!(
            raw.field(profile::workout_step::TARGET_VALUE),
            Some(&FitValue::UInt32(1300))
        );
        assert_eq!(WorkoutStepMesg::from_raw(&raw).unwrap(), step);
    }

    #[test]
    fn test_open_duration_omits_value() {
        let step = WorkoutStepMesg::new(0, "open", "open");
        let raw = step.to_raw().unwrap();
        assert!(raw.field(profile::workout_step::DURATION_VALUE).is_none());
        assert!(raw.field(profile::workout_step::NOTES).is_none());
    }

    #[test]
    fn test_unknown_wire_name_fails_encoding() {
        let step = WorkoutStepMesg::new(0, "hr_less_than", "open");
        assert!(matches!(step.to_raw(), Err(KaiordError::FitEncoding(_))));
    }

    #[test]
    fn test_unknown_code_kept_as_number() {
        let mut raw = RawMessage::new(mesg_num::WORKOUT);
        raw.push(profile::workout::SPORT, Some(FitValue::Enum(37)));
        let workout = WorkoutMesg::from_raw(&raw).unwrap();
        assert_eq!(workout.sport, "37");
    }

    #[test]
    fn test_heart_rate_duration_keeps_percent_apart() {
        let mut raw = RawMessage::new(mesg_num::WORKOUT_STEP);
        raw.push(common::MESSAGE_INDEX, Some(FitValue::UInt16(0)));
        raw.push(profile::workout_step::DURATION_TYPE, Some(FitValue::Enum(2)));
        raw.push(profile::workout_step::DURATION_VALUE, Some(FitValue::UInt32(85)));
        let step = WorkoutStepMesg::from_raw(&raw).unwrap();

        assert_eq!(step.duration_hr, None);
        assert_eq!(step.duration_hr_percent, Some(85));
        assert_eq!(
            step.to_raw().unwrap().field(profile::workout_step::DURATION_VALUE),
            Some(&FitValue::UInt32(85))
        );
    }

    #[test]
    fn test_decoded_names_and_scaled_values() {
        // the shape fitparser hands back: profile names, scales applied
        let mut raw = RawMessage::new(mesg_num::WORKOUT_STEP);
        raw.push(common::MESSAGE_INDEX, Some(FitValue::UInt16(4)));
        raw.push(
            profile::workout_step::DURATION_TYPE,
            Some(FitValue::String("repeat_until_hr_greater_than".to_string())),
        );
        raw.push(profile::workout_step::DURATION_VALUE, Some(FitValue::UInt32(1)));
        raw.push(
            profile::workout_step::TARGET_TYPE,
            Some(FitValue::String("heart_rate".to_string())),
        );
        raw.push(profile::workout_step::TARGET_VALUE, Some(FitValue::UInt32(265)));
        let step = WorkoutStepMesg::from_raw(&raw).unwrap();
        assert_eq!(step.duration_type, "repeatUntilHrGreaterThan");
        assert_eq!(step.target_type, "heartRate");
        assert_eq!(step.duration_step, Some(1));
        assert_eq!(step.duration_hr, Some(165));

        let mut raw = RawMessage::new(mesg_num::WORKOUT_STEP);
        raw.push(common::MESSAGE_INDEX, Some(FitValue::UInt16(0)));
        raw.push(
            profile::workout_step::DURATION_TYPE,
            Some(FitValue::String("time".to_string())),
        );
        raw.push(profile::workout_step::DURATION_VALUE, Some(FitValue::Float64(300.0)));
        raw.push(
            profile::workout_step::TARGET_TYPE,
            Some(FitValue::String("speed".to_string())),
        );
        raw.push(
            profile::workout_step::CUSTOM_TARGET_VALUE_LOW,
            Some(FitValue::Float64(3.25)),
        );
        let step = WorkoutStepMesg::from_raw(&raw).unwrap();
        assert_eq!(step.duration_time, Some(300.0));
        assert_eq!(step.custom_target_value_low, Some(3250));
    }

    #[test]
    fn test_decoded_file_id() {
        let mut raw = RawMessage::new(mesg_num::FILE_ID);
        raw.push(
            profile::file_id::TYPE,
            Some(FitValue::String("workout".to_string())),
        );
        raw.push(
            profile::file_id::MANUFACTURER,
            Some(FitValue::String("wahoo_fitness".to_string())),
        );
        let file_id = FileIdMesg::from_raw(&raw).unwrap();
        assert_eq!(file_id.file_type, 5);
        assert_eq!(file_id.manufacturer.as_deref(), Some("wahoo_fitness"));
    }

    #[test]
    fn test_timestamp_values_land_on_fit_epoch() {
        let when = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let value = raw_value(&Value::Timestamp(when.with_timezone(&chrono::Local)));
        let mut raw = RawMessage::new(mesg_num::RECORD);
        raw.push(common::TIMESTAMP, value);
        assert_eq!(read_date_time(&raw, common::TIMESTAMP), Some(when));

        let first = raw_value(&Value::Array(vec![Value::UInt16(7), Value::UInt16(9)]));
        assert_eq!(first, Some(FitValue::UInt16(7)));
    }

    #[test]
    fn test_decoded_altitude_is_already_meters() {
        let mut raw = RawMessage::new(mesg_num::RECORD);
        raw.push(common::TIMESTAMP, Some(FitValue::UInt32(1_000_000_000)));
        raw.push(profile::record::ENHANCED_ALTITUDE, Some(FitValue::Float64(42.4)));
        raw.push(profile::record::ENHANCED_SPEED, Some(FitValue::Float64(7.5)));
        let record = RecordMesg::from_raw(&raw).unwrap();
        assert_eq!(record.altitude, Some(42.4));
        assert_eq!(record.speed, Some(7.5));
    }

    #[test]
    fn test_record_scaling() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let mut record = RecordMesg::at(timestamp);
        record.altitude = Some(123.4);
        record.position_lat = Some(52.5);
        record.speed = Some(8.333);
        let back = RecordMesg::from_raw(&record.to_raw()).unwrap();

        assert_eq!(back.timestamp, timestamp);
        assert!((back.altitude.unwrap() - 123.4).abs() <= 0.2);
        assert!((back.position_lat.unwrap() - 52.5).abs() < 1e-6);
        assert!((back.speed.unwrap() - 8.333).abs() < 1e-9);
    }
}
