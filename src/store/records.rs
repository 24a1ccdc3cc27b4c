//! Strict parsers for the text records kept in the store. A record that does
//! not parse is reported as corrupt rather than sliced on a best-effort
//! basis; callers decide whether that degrades the reply or fails it.

use std::str::FromStr;

/// Marker for a record whose stored text does not match its schema.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Stored record is corrupt.")]
pub struct CorruptRecord;

/// `manufacturers` record: `<company-id> <lmp version> <lmp subversion>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturerRecord {
    pub company: u16,
    pub version: u8,
    pub subversion: u16,
}

impl FromStr for ManufacturerRecord {
    type Err = CorruptRecord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();

        let company = fields.next().ok_or(CorruptRecord)?;
        let version = fields.next().ok_or(CorruptRecord)?;
        let subversion = fields.next().ok_or(CorruptRecord)?;

        if fields.next().is_some() {
            return Err(CorruptRecord);
        }

        Ok(ManufacturerRecord {
            company: company.parse().map_err(|_| CorruptRecord)?,
            version: version.parse().map_err(|_| CorruptRecord)?,
            subversion: subversion.parse().map_err(|_| CorruptRecord)?,
        })
    }
}

/// `features` record: the remote feature page as 16 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturesRecord {
    pub bytes: [u8; 8],
}

// Byte 3 of the feature page carries the EDR ACL rate bits.
const EDR_ACL_2M: u8 = 0x02;
const EDR_ACL_3M: u8 = 0x04;

impl FeaturesRecord {
    pub fn supports_edr(&self) -> bool {
        self.bytes[3] & (EDR_ACL_2M | EDR_ACL_3M) != 0
    }
}

impl FromStr for FeaturesRecord {
    type Err = CorruptRecord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 || !s.is_ascii() {
            return Err(CorruptRecord);
        }

        let mut bytes = [0u8; 8];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| CorruptRecord)?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| CorruptRecord)?;
        }

        Ok(FeaturesRecord { bytes })
    }
}

/// `linkkeys` record: `<key as 32 hex chars> <key type> <pin length>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkKeyRecord {
    pub key: [u8; 16],
    pub key_type: u8,
    pub pin_length: u8,
}

impl LinkKeyRecord {
    pub fn to_record(&self) -> String {
        let mut text = String::with_capacity(40);
        for byte in &self.key {
            text.push_str(&format!("{:02X}", byte));
        }
        format!("{} {} {}", text, self.key_type, self.pin_length)
    }
}

impl FromStr for LinkKeyRecord {
    type Err = CorruptRecord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();

        let hex = fields.next().ok_or(CorruptRecord)?;
        let key_type = fields.next().ok_or(CorruptRecord)?;
        let pin_length = fields.next().ok_or(CorruptRecord)?;

        if fields.next().is_some() || hex.len() != 32 {
            return Err(CorruptRecord);
        }

        let mut key = [0u8; 16];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| CorruptRecord)?;
            key[i] = u8::from_str_radix(pair, 16).map_err(|_| CorruptRecord)?;
        }

        Ok(LinkKeyRecord {
            key,
            key_type: key_type.parse().map_err(|_| CorruptRecord)?,
            pin_length: pin_length.parse().map_err(|_| CorruptRecord)?,
        })
    }
}

/// Remote class-of-device records are stored as `0x`-prefixed hex.
pub fn parse_class_record(s: &str) -> Result<u32, CorruptRecord> {
    let hex = s.strip_prefix("0x").ok_or(CorruptRecord)?;
    u32::from_str_radix(hex, 16).map_err(|_| CorruptRecord)
}

pub fn format_class_record(class: u32) -> String {
    format!("0x{:06X}", class)
}
