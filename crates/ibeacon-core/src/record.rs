//! iBeacon advertisement record encoding and decoding
//!
//! The record is the manufacturer-specific payload only; the BLE stack adds
//! the AD length/type header and the company identifier itself.

use core::fmt;

use uuid::Uuid;

use crate::errors::{DecodeError, EncodeError};
use crate::types::{
    AdvertisingTuning, BeaconIdentity, APPLE_COMPANY_ID, IBEACON_DATA_LENGTH, IBEACON_TYPE,
    RECORD_LEN,
};

const UUID_OFFSET: usize = 2;
const MAJOR_OFFSET: usize = 18;
const MINOR_OFFSET: usize = 20;
const TX_POWER_OFFSET: usize = 22;

// ----------------------------------------------------------------------------
// Advertisement Record
// ----------------------------------------------------------------------------

/// Fixed 23-byte iBeacon payload
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvertisementRecord([u8; RECORD_LEN]);

impl AdvertisementRecord {
    /// Build the record for an identity and tuning
    pub fn new(identity: &BeaconIdentity, tuning: &AdvertisingTuning) -> Self {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0] = IBEACON_TYPE;
        bytes[1] = IBEACON_DATA_LENGTH;
        bytes[UUID_OFFSET..MAJOR_OFFSET].copy_from_slice(identity.uuid.as_bytes());
        bytes[MAJOR_OFFSET..MINOR_OFFSET].copy_from_slice(&identity.major.to_be_bytes());
        bytes[MINOR_OFFSET..TX_POWER_OFFSET].copy_from_slice(&identity.minor.to_be_bytes());
        bytes[TX_POWER_OFFSET] = tuning.calibrated_tx_power.to_be_bytes()[0];
        Self(bytes)
    }

    /// Decode a received manufacturer payload
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; RECORD_LEN] =
            bytes
                .try_into()
                .map_err(|_| DecodeError::InvalidLength {
                    expected: RECORD_LEN,
                    actual: bytes.len(),
                })?;

        if bytes[0] != IBEACON_TYPE || bytes[1] != IBEACON_DATA_LENGTH {
            return Err(DecodeError::NotIBeacon {
                prefix: [bytes[0], bytes[1]],
            });
        }

        Ok(Self(bytes))
    }

    /// Decode a hex string such as the output of `Display`
    pub fn from_hex(input: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(input.trim())?;
        Self::parse(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn identity(&self) -> BeaconIdentity {
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&self.0[UUID_OFFSET..MAJOR_OFFSET]);
        BeaconIdentity {
            uuid: Uuid::from_bytes(uuid),
            major: u16::from_be_bytes([self.0[MAJOR_OFFSET], self.0[MAJOR_OFFSET + 1]]),
            minor: u16::from_be_bytes([self.0[MINOR_OFFSET], self.0[MINOR_OFFSET + 1]]),
        }
    }

    pub fn tuning(&self) -> AdvertisingTuning {
        AdvertisingTuning::new(i8::from_be_bytes([self.0[TX_POWER_OFFSET]]))
    }

    /// Company identifier and payload, ready for a manufacturer data map
    pub fn manufacturer_data(&self) -> (u16, Vec<u8>) {
        (APPLE_COMPANY_ID, self.to_vec())
    }
}

impl AsRef<[u8]> for AdvertisementRecord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for AdvertisementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for AdvertisementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AdvertisementRecord")
            .field(&hex::encode(self.0))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Encoder Entry Points
// ----------------------------------------------------------------------------

/// Encode a typed identity and tuning
pub fn encode(identity: &BeaconIdentity, tuning: &AdvertisingTuning) -> AdvertisementRecord {
    AdvertisementRecord::new(identity, tuning)
}

/// Encode loosely-typed input, validating every field first
pub fn encode_raw(
    uuid: &str,
    major: i64,
    minor: i64,
    tx_power: i64,
) -> Result<AdvertisementRecord, EncodeError> {
    let identity = BeaconIdentity::parse(uuid, major, minor)?;
    let tuning = AdvertisingTuning::parse(tx_power)?;
    Ok(encode(&identity, &tuning))
}

/// Decode one manufacturer data entry
///
/// Returns `Ok(None)` for entries from other manufacturers.
pub fn parse_manufacturer_data(
    company_id: u16,
    data: &[u8],
) -> Result<Option<AdvertisementRecord>, DecodeError> {
    if company_id != APPLE_COMPANY_ID {
        return Ok(None);
    }
    AdvertisementRecord::parse(data).map(Some)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_UUID;

    const GOLDEN: &str = "0215fda50693a4e24fb1afcfc6eb0764782500640001c5";

    #[test]
    fn test_golden_vector() {
        let record = encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", 100, 1, -59).unwrap();
        assert_eq!(record.to_string(), GOLDEN);
        assert_eq!(
            record.as_bytes(),
            &[
                0x02, 0x15, 0xfd, 0xa5, 0x06, 0x93, 0xa4, 0xe2, 0x4f, 0xb1, 0xaf, 0xcf, 0xc6, 0xeb,
                0x07, 0x64, 0x78, 0x25, 0x00, 0x64, 0x00, 0x01, 0xc5,
            ]
        );
    }

    #[test]
    fn test_big_endian_fields() {
        let record = encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", 1, 0x0100, -59).unwrap();
        let bytes = record.as_bytes();
        assert_eq!(&bytes[18..20], &[0x00, 0x01]);
        assert_eq!(&bytes[20..22], &[0x01, 0x00]);
        assert_eq!(bytes[22], 0xC5);
    }

    #[test]
    fn test_uuid_byte_order() {
        let uuid = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let record = encode(&BeaconIdentity::new(uuid, 0, 0), &AdvertisingTuning::new(0));
        let expected: Vec<u8> = (0u8..16).map(|i| i * 0x11).collect();
        assert_eq!(&record.as_bytes()[2..18], expected.as_slice());
    }

    #[test]
    fn test_tx_power_extremes() {
        let identity = BeaconIdentity::default();
        assert_eq!(encode(&identity, &AdvertisingTuning::new(-128)).as_bytes()[22], 0x80);
        assert_eq!(encode(&identity, &AdvertisingTuning::new(127)).as_bytes()[22], 0x7f);
        assert_eq!(encode(&identity, &AdvertisingTuning::new(-1)).as_bytes()[22], 0xff);
    }

    #[test]
    fn test_encode_raw_errors() {
        assert!(matches!(
            encode_raw("not-a-uuid", 1, 1, -59),
            Err(EncodeError::InvalidUuid { .. })
        ));
        assert!(matches!(
            encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", 65536, 1, -59),
            Err(EncodeError::OutOfRange { field: "major", .. })
        ));
        assert!(matches!(
            encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", 1, 70000, -59),
            Err(EncodeError::OutOfRange { field: "minor", .. })
        ));
        assert!(matches!(
            encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", 1, 1, -200),
            Err(EncodeError::OutOfRange { field: "txPower", .. })
        ));
    }

    #[test]
    fn test_parse_back() {
        let record = AdvertisementRecord::from_hex(GOLDEN).unwrap();
        assert_eq!(record.identity(), BeaconIdentity::new(DEFAULT_UUID, 100, 1));
        assert_eq!(record.tuning().calibrated_tx_power, -59);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            AdvertisementRecord::parse(&[0x02, 0x15, 0x00]),
            Err(DecodeError::InvalidLength {
                expected: 23,
                actual: 3
            })
        );

        let mut bytes = [0u8; 23];
        bytes[0] = 0x01;
        assert_eq!(
            AdvertisementRecord::parse(&bytes),
            Err(DecodeError::NotIBeacon {
                prefix: [0x01, 0x00]
            })
        );

        assert!(matches!(
            AdvertisementRecord::from_hex("zz"),
            Err(DecodeError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_manufacturer_data() {
        let record = encode(&BeaconIdentity::default(), &AdvertisingTuning::default());
        let (company, payload) = record.manufacturer_data();
        assert_eq!(company, 0x004C);
        assert_eq!(payload.len(), 23);

        assert_eq!(parse_manufacturer_data(0x0059, &payload), Ok(None));
        assert_eq!(parse_manufacturer_data(0x004C, &payload), Ok(Some(record)));
    }
}
