//! Property tests for the iBeacon record encoder
//!
//! Every valid input must yield a 23-byte record whose fields decode back to
//! the original values, and every out-of-range input must be rejected.

use ibeacon_core::{encode_raw, AdvertisementRecord, EncodeError, RECORD_LEN};
use proptest::prelude::*;
use uuid::Uuid;

fn canonical_uuid() -> impl Strategy<Value = String> {
    any::<u128>().prop_map(|bits| Uuid::from_u128(bits).hyphenated().to_string())
}

proptest! {
    #[test]
    fn encoded_record_has_fixed_shape(
        uuid in canonical_uuid(),
        major in 0i64..=65535,
        minor in 0i64..=65535,
        tx_power in -128i64..=127,
    ) {
        let record = encode_raw(&uuid, major, minor, tx_power).unwrap();
        let bytes = record.as_bytes();
        prop_assert_eq!(bytes.len(), RECORD_LEN);
        prop_assert_eq!(bytes[0], 0x02);
        prop_assert_eq!(bytes[1], 0x15);
        prop_assert_eq!(bytes[22], tx_power as i8 as u8);
    }

    #[test]
    fn uuid_bytes_reassemble_to_input(uuid in canonical_uuid(), major in 0i64..=65535) {
        let record = encode_raw(&uuid, major, 0, -59).unwrap();
        let mut high = [0u8; 8];
        let mut low = [0u8; 8];
        high.copy_from_slice(&record.as_bytes()[2..10]);
        low.copy_from_slice(&record.as_bytes()[10..18]);
        let value = (u128::from(u64::from_be_bytes(high)) << 64) | u128::from(u64::from_be_bytes(low));
        prop_assert_eq!(Uuid::from_u128(value).hyphenated().to_string(), uuid);
    }

    #[test]
    fn decoded_fields_match_input(
        uuid in canonical_uuid(),
        major in 0i64..=65535,
        minor in 0i64..=65535,
        tx_power in -128i64..=127,
    ) {
        let record = encode_raw(&uuid, major, minor, tx_power).unwrap();
        let decoded = AdvertisementRecord::parse(record.as_bytes()).unwrap();
        let identity = decoded.identity();
        prop_assert_eq!(identity.uuid.to_string(), uuid);
        prop_assert_eq!(i64::from(identity.major), major);
        prop_assert_eq!(i64::from(identity.minor), minor);
        prop_assert_eq!(i64::from(decoded.tuning().calibrated_tx_power), tx_power);
    }

    #[test]
    fn out_of_range_major_is_rejected(major in prop_oneof![i64::MIN..0i64, 65536i64..i64::MAX]) {
        let result = encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", major, 1, -59);
        let is_major_out_of_range =
            matches!(result, Err(EncodeError::OutOfRange { field: "major", .. }));
        prop_assert!(is_major_out_of_range);
    }

    #[test]
    fn out_of_range_tx_power_is_rejected(tx_power in prop_oneof![i64::MIN..-128i64, 128i64..i64::MAX]) {
        let result = encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", 1, 1, tx_power);
        let is_tx_out_of_range =
            matches!(result, Err(EncodeError::OutOfRange { field: "txPower", .. }));
        prop_assert!(is_tx_out_of_range);
    }
}

#[test]
fn test_golden_vector_for_vehicle_identity() {
    let record = encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", 100, 1, -59).unwrap();
    assert_eq!(
        record.to_string(),
        "0215fda50693a4e24fb1afcfc6eb0764782500640001c5"
    );
}

#[test]
fn test_malformed_uuid_is_rejected() {
    assert!(matches!(
        encode_raw("not-a-uuid", 100, 1, -59),
        Err(EncodeError::InvalidUuid { .. })
    ));
}
