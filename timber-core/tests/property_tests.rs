//! Property tests for decoding, wildcard matching and aligned retrieval.

use proptest::prelude::*;
use serde_json::{json, Value};
use timber_core::archive::{like_match, MemoryArchive};
use timber_core::{
    decode_dataset, AlignmentEngine, ArchiveStamp, Dataset, DecodedValue, MasterAxis, RawSample,
    VariableKind,
};

fn bits(values: &[DecodedValue]) -> Vec<Vec<u64>> {
    values
        .iter()
        .map(|v| match v {
            DecodedValue::Scalar(x) => vec![x.to_bits()],
            DecodedValue::Vector(xs) => xs.iter().map(|x| x.to_bits()).collect(),
            DecodedValue::Matrix(m) => m.data.iter().map(|x| x.to_bits()).collect(),
            DecodedValue::Event => vec![1],
            DecodedValue::Missing => vec![],
            DecodedValue::Raw(_) => vec![u64::MAX],
        })
        .collect()
}

fn arb_payload() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => (-1e12f64..1e12).prop_map(|x| json!(x)),
        1 => Just(Value::Null),
    ]
}

fn arb_vector_payload() -> impl Strategy<Value = Value> {
    prop::collection::vec(-1e6f64..1e6, 0..16).prop_map(|v| json!(v))
}

fn stamps(n: usize) -> Vec<ArchiveStamp> {
    (0..n as i64).map(|i| ArchiveStamp::new(1_500_000_000 + i, (i as u32 % 10) * 100_000_000)).collect()
}

proptest! {
    #[test]
    fn scalar_decoding_is_bit_identical_across_runs(payloads in prop::collection::vec(arb_payload(), 0..64)) {
        let ds = Dataset {
            variable: "A".into(),
            kind: VariableKind::Numeric,
            samples: stamps(payloads.len()).into_iter().zip(payloads).map(|(s, p)| RawSample::new(s, p)).collect(),
        };
        let first = decode_dataset(&ds, true).unwrap();
        let second = decode_dataset(&ds, true).unwrap();
        prop_assert_eq!(bits(&first.values), bits(&second.values));
        prop_assert_eq!(&first.timestamps, &second.timestamps);
        prop_assert_eq!(first.len(), ds.len());
    }

    #[test]
    fn vector_decoding_is_bit_identical_across_runs(payloads in prop::collection::vec(arb_vector_payload(), 0..32)) {
        let ds = Dataset {
            variable: "V".into(),
            kind: VariableKind::VectorNumeric,
            samples: stamps(payloads.len()).into_iter().zip(payloads).map(|(s, p)| RawSample::new(s, p)).collect(),
        };
        let first = decode_dataset(&ds, false).unwrap();
        let second = decode_dataset(&ds, false).unwrap();
        prop_assert_eq!(bits(&first.values), bits(&second.values));
    }

    #[test]
    fn decoded_timestamps_are_non_decreasing(n in 0usize..64) {
        let ds = Dataset {
            variable: "A".into(),
            kind: VariableKind::Numeric,
            samples: stamps(n).into_iter().map(|s| RawSample::new(s, json!(0.0))).collect(),
        };
        let series = decode_dataset(&ds, true).unwrap();
        let ts = series.timestamps.unwrap();
        prop_assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn percent_matches_everything(name in "[A-Za-z0-9._:]{0,24}") {
        prop_assert!(like_match("%", &name));
        let pattern = format!("%{name}%");
        prop_assert!(like_match(&pattern, &name));
    }

    #[test]
    fn literal_pattern_matches_only_itself(a in "[A-Z.:]{1,12}", b in "[A-Z.:]{1,12}") {
        prop_assert!(like_match(&a, &a));
        prop_assert_eq!(like_match(&a, &b), a == b);
    }

    #[test]
    fn aligned_peer_has_master_length_and_stamps(
        master_offsets in prop::collection::btree_set(0i64..500, 0..40),
        peer_offsets in prop::collection::btree_set(0i64..500, 0..40),
    ) {
        let master: Vec<RawSample> = master_offsets.iter().map(|&o| RawSample::new(ArchiveStamp::new(o, 0), json!(o))).collect();
        let peer: Vec<RawSample> = peer_offsets.iter().map(|&o| RawSample::new(ArchiveStamp::new(o, 0), json!(o * 2))).collect();
        let archive = MemoryArchive::new()
            .with_variable("M", VariableKind::Numeric, master.clone())
            .with_variable("P", VariableKind::Numeric, peer);
        let axis = MasterAxis::from_dataset(&Dataset { variable: "M".into(), kind: VariableKind::Numeric, samples: master });
        let aligned = AlignmentEngine::new(&archive, &axis).fetch_aligned(&"P".into()).unwrap();
        prop_assert_eq!(aligned.len(), axis.len());
        prop_assert_eq!(aligned.stamps(), axis.stamps.clone());
    }
}
