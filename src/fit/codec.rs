//! Binary FIT encoder.
//!
//! The only part of the writer that touches bytes. Messages are sequences of
//! numbered fields; names, scales and meaning live in `messages`. Files are
//! always written with a 14-byte header, little-endian records and both CRCs.
//! Decoding goes through `fitparser` in the reader.

use super::profile::PROTOCOL_VERSION;

const HEADER_SIZE: u8 = 14;
const LOCAL_TYPES: usize = 16;
/// A string field holds at most 254 bytes plus its terminator
pub const MAX_STRING_BYTES: usize = 254;

const DEFINITION_HEADER: u8 = 0x40;

/// Accumulate a slice of bytes into a cyclic redundancy check value.
pub fn compute_crc(init: u16, bytes: &[u8]) -> u16 {
    bytes.iter().fold(init, |acc, b| crc_byte(acc, *b))
}

fn crc_byte(mut crc: u16, b: u8) -> u16 {
    const CRC_TABLE: [u16; 16] = [
        0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
        0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
    ];

    let tmp = CRC_TABLE[(crc & 0xF) as usize];
    crc = (crc >> 4) & 0x0FFF;
    crc = crc ^ tmp ^ CRC_TABLE[(b & 0xF) as usize];

    let tmp = CRC_TABLE[(crc & 0xF) as usize];
    crc = (crc >> 4) & 0x0FFF;
    crc ^ tmp ^ CRC_TABLE[((b >> 4) & 0xF) as usize]
}

/// FIT base types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Enum,
    SInt8,
    UInt8,
    SInt16,
    UInt16,
    SInt32,
    UInt32,
    String,
    Float32,
    Float64,
    UInt32z,
    SInt64,
    UInt64,
}

impl BaseType {
    pub fn byte(self) -> u8 {
        match self {
            BaseType::Enum => 0x00,
            BaseType::SInt8 => 0x01,
            BaseType::UInt8 => 0x02,
            BaseType::SInt16 => 0x83,
            BaseType::UInt16 => 0x84,
            BaseType::SInt32 => 0x85,
            BaseType::UInt32 => 0x86,
            BaseType::String => 0x07,
            BaseType::Float32 => 0x88,
            BaseType::Float64 => 0x89,
            BaseType::UInt32z => 0x8C,
            BaseType::SInt64 => 0x8E,
            BaseType::UInt64 => 0x8F,
        }
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            BaseType::Enum | BaseType::SInt8 | BaseType::UInt8 | BaseType::String => 1,
            BaseType::SInt16 | BaseType::UInt16 => 2,
            BaseType::SInt32 | BaseType::UInt32 | BaseType::Float32 | BaseType::UInt32z => 4,
            BaseType::Float64 | BaseType::SInt64 | BaseType::UInt64 => 8,
        }
    }
}

/// A field value, either to be encoded or taken from a decoded record
#[derive(Debug, Clone, PartialEq)]
pub enum FitValue {
    Enum(u8),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt32z(u32),
    UInt64(u64),
    SInt8(i8),
    SInt16(i16),
    SInt32(i32),
    SInt64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
}

impl FitValue {
    fn base_type(&self) -> BaseType {
        match self {
            FitValue::Enum(_) => BaseType::Enum,
            FitValue::UInt8(_) => BaseType::UInt8,
            FitValue::UInt16(_) => BaseType::UInt16,
            FitValue::UInt32(_) => BaseType::UInt32,
            FitValue::UInt32z(_) => BaseType::UInt32z,
            FitValue::UInt64(_) => BaseType::UInt64,
            FitValue::SInt8(_) => BaseType::SInt8,
            FitValue::SInt16(_) => BaseType::SInt16,
            FitValue::SInt32(_) => BaseType::SInt32,
            FitValue::SInt64(_) => BaseType::SInt64,
            FitValue::Float32(_) => BaseType::Float32,
            FitValue::Float64(_) => BaseType::Float64,
            FitValue::String(_) => BaseType::String,
        }
    }

    /// Unsigned view of integer values.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            FitValue::Enum(v) | FitValue::UInt8(v) => Some(u32::from(v)),
            FitValue::UInt16(v) => Some(u32::from(v)),
            FitValue::UInt32(v) | FitValue::UInt32z(v) => Some(v),
            FitValue::UInt64(v) => u32::try_from(v).ok(),
            FitValue::SInt8(v) => u32::try_from(v).ok(),
            FitValue::SInt16(v) => u32::try_from(v).ok(),
            FitValue::SInt32(v) => u32::try_from(v).ok(),
            FitValue::SInt64(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }

    /// Signed view of integer values.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FitValue::SInt8(v) => Some(i64::from(v)),
            FitValue::SInt16(v) => Some(i64::from(v)),
            FitValue::SInt32(v) => Some(i64::from(v)),
            FitValue::SInt64(v) => Some(v),
            FitValue::UInt64(v) => i64::try_from(v).ok(),
            _ => self.as_u32().map(i64::from),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FitValue::Float32(v) => Some(f64::from(v)),
            FitValue::Float64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FitValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn encoded_size(&self) -> usize {
        match self {
            FitValue::String(s) => clip_string(s).len() + 1,
            other => other.base_type().size(),
        }
    }

    fn write_le(&self, out: &mut Vec<u8>) {
        match self {
            FitValue::Enum(v) | FitValue::UInt8(v) => out.push(*v),
            FitValue::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::UInt32(v) | FitValue::UInt32z(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::UInt64(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::SInt8(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::SInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::SInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::SInt64(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::Float32(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::Float64(v) => out.extend_from_slice(&v.to_le_bytes()),
            FitValue::String(s) => {
                out.extend_from_slice(clip_string(s).as_bytes());
                out.push(0);
            }
        }
    }
}

/// Clip to the string field limit on a UTF-8 boundary.
fn clip_string(s: &str) -> &str {
    if s.len() <= MAX_STRING_BYTES {
        return s;
    }
    let mut end = MAX_STRING_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub number: u8,
    pub value: FitValue,
}

/// A message as numbered fields
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub global: u16,
    pub fields: Vec<RawField>,
}

impl RawMessage {
    pub fn new(global: u16) -> Self {
        Self {
            global,
            fields: Vec::new(),
        }
    }

    /// Append a field when the value is present.
    pub fn push(&mut self, number: u8, value: Option<FitValue>) {
        if let Some(value) = value {
            self.fields.push(RawField { number, value });
        }
    }

    pub fn field(&self, number: u8) -> Option<&FitValue> {
        self.fields
            .iter()
            .find(|f| f.number == number)
            .map(|f| &f.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DefinitionKey {
    global: u16,
    fields: Vec<(u8, u8, u8)>,
}

impl DefinitionKey {
    fn of(message: &RawMessage) -> Self {
        Self {
            global: message.global,
            fields: message
                .fields
                .iter()
                .map(|f| {
                    (
                        f.number,
                        f.value.encoded_size() as u8,
                        f.value.base_type().byte(),
                    )
                })
                .collect(),
        }
    }
}

/// Encode messages into a complete FIT file.
pub fn encode(messages: &[RawMessage], profile_version: u16) -> Vec<u8> {
    let mut data = Vec::new();
    let mut locals: Vec<Option<DefinitionKey>> = vec![None; LOCAL_TYPES];
    let mut next_local = 0usize;

    for message in messages {
        let key = DefinitionKey::of(message);
        let local = match locals.iter().position(|slot| slot.as_ref() == Some(&key)) {
            Some(local) => local,
            None => {
                let local = next_local;
                next_local = (next_local + 1) % LOCAL_TYPES;

                data.push(DEFINITION_HEADER | local as u8);
                data.push(0); // reserved
                data.push(0); // little-endian
                data.extend_from_slice(&key.global.to_le_bytes());
                data.push(key.fields.len() as u8);
                for (number, size, base) in &key.fields {
                    data.extend_from_slice(&[*number, *size, *base]);
                }
                locals[local] = Some(key);
                local
            }
        };

        data.push(local as u8);
        for field in &message.fields {
            field.value.write_le(&mut data);
        }
    }

    let mut file = Vec::with_capacity(data.len() + HEADER_SIZE as usize + 2);
    file.push(HEADER_SIZE);
    file.push(PROTOCOL_VERSION);
    file.extend_from_slice(&profile_version.to_le_bytes());
    file.extend_from_slice(&(data.len() as u32).to_le_bytes());
    file.extend_from_slice(b".FIT");
    let header_crc = compute_crc(0, &file);
    file.extend_from_slice(&header_crc.to_le_bytes());
    file.extend_from_slice(&data);
    let crc = compute_crc(0, &file);
    file.extend_from_slice(&crc.to_le_bytes());
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitparser::profile::MesgNum;
    use fitparser::Value;
    use proptest::prelude::*;

    fn sample() -> Vec<RawMessage> {
        let mut file_id = RawMessage::new(0);
        file_id.push(0, Some(FitValue::Enum(5)));
        file_id.push(1, Some(FitValue::UInt16(1)));
        file_id.push(3, Some(FitValue::UInt32z(123_456)));

        let mut step = RawMessage::new(27);
        step.push(254, Some(FitValue::UInt16(0)));
        step.push(0, Some(FitValue::String("Warm up".to_string())));
        step.push(2, Some(FitValue::UInt32(600_000)));

        vec![file_id, step.clone(), step]
    }

    fn field<'a>(record: &'a fitparser::FitDataRecord, number: u8) -> Option<&'a Value> {
        record
            .fields()
            .iter()
            .find(|f| f.number() == number)
            .map(|f| f.value())
    }

    #[test]
    fn test_header_and_crc() {
        let bytes = encode(&sample(), 2132);
        assert_eq!(bytes[0], 14);
        assert_eq!(&bytes[8..12], b".FIT");
        assert_eq!(compute_crc(0, &bytes), 0, "CRC over a file with its CRC is zero");
    }

    #[test]
    fn test_output_parses_with_fitparser() {
        let bytes = encode(&sample(), 2132);
        // two distinct shapes means two definition records
        let definitions = bytes[14..]
            .iter()
            .filter(|b| **b & DEFINITION_HEADER != 0 && **b & 0x0F < 2)
            .count();
        assert!(definitions >= 2);

        let records = fitparser::de::from_bytes(&bytes).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind(), MesgNum::FileId);
        assert_eq!(records[2].kind(), MesgNum::WorkoutStep);
        assert_eq!(
            field(&records[1], 0),
            Some(&Value::String("Warm up".to_string()))
        );
    }

    #[test]
    fn test_corrupted_payload_is_rejected() {
        let mut bytes = encode(&sample(), 2132);
        let last_data = bytes.len() - 3;
        bytes[last_data] ^= 0xFF;
        assert!(fitparser::de::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_string_clipped_on_char_boundary() {
        let mut message = RawMessage::new(27);
        message.push(254, Some(FitValue::UInt16(0)));
        message.push(8, Some(FitValue::String("é".repeat(200))));
        let records = fitparser::de::from_bytes(&encode(&[message], 2132)).unwrap();

        match field(&records[0], 8) {
            Some(Value::String(text)) => {
                assert_eq!(text.len(), 254);
                assert_eq!(text.chars().count(), 127);
            }
            other => panic!("expected notes text, got {:?}", other),
        }
    }

    #[test]
    fn test_definitions_wrap_after_sixteen_shapes() {
        let messages: Vec<RawMessage> = (0..20u8)
            .map(|n| {
                let mut message = RawMessage::new(20);
                message.push(253, Some(FitValue::UInt32(1_000_000_000 + u32::from(n))));
                for extra in 0..n % 17 {
                    message.push(100 + extra, Some(FitValue::UInt8(extra)));
                }
                message
            })
            .collect();
        let records = fitparser::de::from_bytes(&encode(&messages, 2132)).unwrap();
        assert_eq!(records.len(), 20);
    }

    proptest! {
        #[test]
        fn prop_checksum_closes_over_any_payload(power in proptest::collection::vec(0u16..2000, 1..40)) {
            let messages: Vec<RawMessage> = power
                .iter()
                .map(|watts| {
                    let mut record = RawMessage::new(20);
                    record.push(7, Some(FitValue::UInt16(*watts)));
                    record
                })
                .collect();
            let bytes = encode(&messages, 2132);
            prop_assert_eq!(compute_crc(0, &bytes), 0);
            prop_assert_eq!(bytes.len(), 14 + 6 + 3 + power.len() * 3 + 2);
        }
    }
}
