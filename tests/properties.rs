//! Property tests: arbitrary input never panics, the cursor only moves forward, headers
//! round-trip, and tree and counts decoding agree.

use collectd_dissect::dump::render_tree;
use collectd_dissect::frame::decode_tree;
use collectd_dissect::{
    decode_part_header, encode_part_header, walk_packet, ByteCursor, CdTime, DecoderConfig, PacketBuilder,
    PartType, Value,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum CursorOp {
    U8,
    U16,
    U64,
    Bytes(usize),
    Skip(usize),
}

fn cursor_op() -> impl Strategy<Value = CursorOp> {
    prop_oneof![
        Just(CursorOp::U8),
        Just(CursorOp::U16),
        Just(CursorOp::U64),
        (0usize..40).prop_map(CursorOp::Bytes),
        (0usize..40).prop_map(CursorOp::Skip),
    ]
}

#[derive(Debug, Clone)]
enum PartSpec {
    Host(String),
    Plugin(String),
    Type(String),
    Message(String),
    TimeHr(u64),
    Values(Vec<u64>, Option<u16>),
    Raw(u16, Vec<u8>),
    Junk(Vec<u8>),
}

fn part_spec() -> impl Strategy<Value = PartSpec> {
    prop_oneof![
        "[a-z]{0,8}".prop_map(PartSpec::Host),
        "[a-z]{1,8}".prop_map(PartSpec::Plugin),
        "[a-z]{1,8}".prop_map(PartSpec::Type),
        "[ -~]{0,16}".prop_map(PartSpec::Message),
        any::<u64>().prop_map(PartSpec::TimeHr),
        (prop::collection::vec(any::<u64>(), 0..6), prop::option::of(0u16..8))
            .prop_map(|(v, c)| PartSpec::Values(v, c)),
        (0u16..0x220, prop::collection::vec(any::<u8>(), 0..48)).prop_map(|(t, b)| PartSpec::Raw(t, b)),
        prop::collection::vec(any::<u8>(), 1..6).prop_map(PartSpec::Junk),
    ]
}

fn build(parts: &[PartSpec]) -> Vec<u8> {
    let mut b = PacketBuilder::new();
    for p in parts {
        b = match p {
            PartSpec::Host(s) => b.host(s),
            PartSpec::Plugin(s) => b.plugin(s),
            PartSpec::Type(s) => b.type_name(s),
            PartSpec::Message(s) => b.message(s),
            PartSpec::TimeHr(t) => b.time_hr(*t),
            PartSpec::Values(raw, count) => {
                let values: Vec<Value> = raw
                    .iter()
                    .map(|&r| match r % 4 {
                        0 => Value::Counter(r),
                        1 => Value::Gauge(r as f64),
                        2 => Value::Derive(r as i64),
                        _ => Value::Absolute(r),
                    })
                    .collect();
                match count {
                    Some(c) => b.values_with_count(*c, &values),
                    None => b.values(&values),
                }
            }
            PartSpec::Raw(t, body) => b.raw_part(PartType::from_u16(*t), body),
            PartSpec::Junk(bytes) => b.raw_bytes(bytes),
        };
    }
    b.build()
}

fn assert_modes_agree(bytes: &[u8], config: &DecoderConfig) -> Result<(), TestCaseError> {
    let t = decode_tree(bytes, config);
    let c = walk_packet(bytes, config);
    prop_assert_eq!(&t.counts, &c.counts);
    prop_assert_eq!(&t.summary, &c.summary);
    prop_assert_eq!(&t.stats, &c.stats);
    prop_assert_eq!(&t.warnings, &c.warnings);
    prop_assert_eq!(&t.error, &c.error);
    prop_assert_eq!(t.counts.records_emitted, t.records.len() as u64);
    Ok(())
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let config = DecoderConfig::default();
        let t = decode_tree(&bytes, &config);
        let _ = walk_packet(&bytes, &config);
        let _ = render_tree(&t);
        prop_assert!(t.counts.parts_error <= 1);
    }

    #[test]
    fn cursor_moves_forward_only(
        data in prop::collection::vec(any::<u8>(), 0..64),
        ops in prop::collection::vec(cursor_op(), 0..32),
    ) {
        let mut c = ByteCursor::new(&data);
        for op in ops {
            let before = c.position();
            let ok = match op {
                CursorOp::U8 => c.read_u8().is_ok(),
                CursorOp::U16 => c.read_u16().is_ok(),
                CursorOp::U64 => c.read_u64().is_ok(),
                CursorOp::Bytes(n) => c.read_bytes(n).is_ok(),
                CursorOp::Skip(n) => c.skip(n).is_ok(),
            };
            prop_assert!(c.position() >= before);
            prop_assert!(c.position() <= data.len());
            if !ok {
                prop_assert_eq!(c.position(), before);
            }
        }
    }

    #[test]
    fn header_round_trips(
        raw_type in any::<u16>(),
        body in prop::collection::vec(any::<u8>(), 0..256),
        trailing in prop::collection::vec(any::<u8>(), 0..8),
    ) {
        let len = (body.len() + 4) as u16;
        let mut bytes = encode_part_header(PartType::from_u16(raw_type), len).to_vec();
        bytes.extend_from_slice(&body);
        bytes.extend_from_slice(&trailing);
        let mut c = ByteCursor::new(&bytes);
        let h = decode_part_header(&mut c).expect("valid header");
        prop_assert_eq!(h.raw_type(), raw_type);
        prop_assert_eq!(h.declared_length, len);
        prop_assert_eq!(c.position(), 4);
        prop_assert_eq!(c.read_bytes(h.body_length()).expect("body fits"), &body[..]);
        prop_assert_eq!(c.remaining(), trailing.len());
    }

    #[test]
    fn value_count_comes_from_length(n in 1usize..20, declared in any::<u16>()) {
        let values: Vec<Value> = (0..n as u64).map(Value::Counter).collect();
        let bytes = PacketBuilder::new().values_with_count(declared, &values).build();
        let res = decode_tree(&bytes, &DecoderConfig::default());
        prop_assert!(res.is_complete());
        prop_assert_eq!(res.parts[0].values().map(<[Value]>::len), Some(n));
        prop_assert_eq!(res.warnings.len(), usize::from(declared as usize != n));
    }

    #[test]
    fn high_resolution_time_is_normalised(raw in any::<u64>()) {
        let t = CdTime::from_raw(raw);
        prop_assert_eq!(t.secs, raw >> 30);
        prop_assert!(t.nanos < 1_000_000_000);
    }

    #[test]
    fn modes_agree_on_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        assert_modes_agree(&bytes, &DecoderConfig::default())?;
    }

    #[test]
    fn modes_agree_on_built_packets(parts in prop::collection::vec(part_spec(), 0..12), strict in any::<bool>()) {
        let bytes = build(&parts);
        let config = DecoderConfig::default().with_strict_value_count(strict);
        assert_modes_agree(&bytes, &config)?;
    }
}
