//! Integration tests: pack whole midicsv logs, unpack them, and check the
//! failure modes of the stream format at its field boundaries.
use midcsv_core::bitio::BitWriter;
use midcsv_core::format::{StreamHeader, MAX_LITERAL_LEN, MAX_RECORDS, MAX_TRACK};
use midcsv_core::record::pack_triple;
use midcsv_core::{
    decode, encode, read_records, write_records, Command, DecodingError, EncodingError, Error,
    HuffmanModel, Reader, Record, Writer,
};

const SONATA: &str = "\
0, 0, Header, 1, 3, 480
1, 0, Start_track
1, 0, Title_t, \"Sonata No. 1\"
1, 0, Time_signature, 2, 1, 24, 8
1, 0, Key_signature, -4, \"minor\"
1, 0, Tempo, 500000
1, 0, End_track
2, 0, Start_track
2, 0, Text_t, \"Allegro\"
2, 0, Control_c, 0, 7, 100
2, 0, Note_on_c, 0, 60, 100
2, 240, Note_off_c, 0, 60, 0
2, 240, Note_on_c, 0, 65, 90
2, 480, Note_on_c, 0, 65, 0
2, 480, End_track
3, 0, Start_track
3, 0, Note_on_c, 1, 48, 80
3, 480, Note_off_c, 1, 48, 0
3, 960, End_track
0, 0, End_of_file
";

// ── helpers ───────────────────────────────────────────────────────────────

fn parse(lines: &str) -> Vec<Record> {
    read_records(lines.as_bytes()).unwrap()
}

fn pack(records: &[Record]) -> Vec<u8> {
    let mut out = Vec::new();
    encode(records, &mut out).unwrap();
    out
}

fn to_text(records: &[Record]) -> String {
    let mut out = Vec::new();
    write_records(&mut out, records).unwrap();
    String::from_utf8(out).unwrap()
}

fn note_on(time: u32, params: [u8; 3]) -> Record {
    Record::triple(0, time, Command::NoteOnC, params).unwrap()
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_two_record_scenario() {
    let input = "0, 0, Header, 1, 1, 480\n0, 0, Note_on_c, 0, 60, 100\n";
    let records = parse(input);
    assert_eq!(records[1], note_on(0, [0, 60, 100]));

    let decoded = decode(pack(&records).as_slice()).unwrap();
    assert_eq!(decoded, records);
    assert_eq!(to_text(&decoded), input);
}

#[test]
fn test_multi_track_roundtrip() {
    let records = parse(SONATA);
    let packed = pack(&records);
    assert!(packed.len() < SONATA.len(), "packed {} bytes vs {} text bytes", packed.len(), SONATA.len());

    let decoded = decode(packed.as_slice()).unwrap();
    assert_eq!(decoded, records);
    assert_eq!(to_text(&decoded), SONATA);
}

#[test]
fn test_concatenated_sequences_roundtrip() {
    let twice = format!("{SONATA}{SONATA}");
    let records = parse(&twice);
    let decoded = decode(pack(&records).as_slice()).unwrap();
    assert_eq!(to_text(&decoded), twice);
}

#[test]
fn test_empty_stream_roundtrip() {
    let packed = pack(&[]);
    assert!(decode(packed.as_slice()).unwrap().is_empty());
}

#[test]
fn test_writer_matches_encode() {
    let records = parse(SONATA);
    let mut via_writer = Vec::new();
    let mut writer = Writer::new(&mut via_writer);
    for record in records.iter().take(5).cloned() {
        writer.write(record);
    }
    writer.extend(records.iter().skip(5).cloned());
    assert_eq!(writer.len(), records.len());
    let bits = writer.finish().unwrap();

    assert_eq!(via_writer, pack(&records));
    assert_eq!(via_writer.len() as u64, (bits + 7) / 8);
}

#[test]
fn test_record_count_boundary() {
    let max = vec![note_on(0, [0, 60, 100]); MAX_RECORDS];
    let decoded = decode(pack(&max).as_slice()).unwrap();
    assert_eq!(decoded.len(), 4095);

    let over = vec![note_on(0, [0, 60, 100]); MAX_RECORDS + 1];
    let err = encode(&over, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Encoding(EncodingError::FieldOverflow { field: "record count", value: 4096, width: 12 })
    ));
}

#[test]
fn test_literal_length_boundary() {
    // "Text_t, " is 8 characters
    let fits = format!("Text_t, {}", "a".repeat(55));
    assert_eq!(fits.len(), MAX_LITERAL_LEN);
    let records = vec![Record::literal(1, 0, fits).unwrap()];
    assert_eq!(decode(pack(&records).as_slice()).unwrap(), records);

    let too_long = format!("Text_t, {}", "a".repeat(56));
    let records = vec![Record::literal(1, 0, too_long).unwrap()];
    let err = encode(&records, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Encoding(EncodingError::FieldOverflow { field: "literal length", value: 64, width: 6 })
    ));
}

#[test]
fn test_track_wider_than_two_bits_fails() {
    let records = vec![Record::literal(MAX_TRACK, 0, "Start_track").unwrap()];
    assert_eq!(decode(pack(&records).as_slice()).unwrap(), records);

    let records = vec![Record::literal(MAX_TRACK + 1, 0, "Start_track").unwrap()];
    let err = encode(&records, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Encoding(EncodingError::FieldOverflow { field: "track", value: 4, width: 2 })
    ));
}

#[test]
fn test_non_ascii_literal_fails() {
    let records = vec![Record::literal(1, 0, "Title_t, \"Für Elise\"").unwrap()];
    let err = encode(&records, Vec::new()).unwrap_err();
    assert!(matches!(err, Error::Encoding(EncodingError::NonAsciiLiteral(_))));
}

#[test]
fn test_time_the_decoder_cannot_rebuild_fails() {
    // track 2 starts at 50, but a track change restarts the decoder at 0
    let records = parse("1, 0, Start_track\n1, 100, End_track\n2, 50, Start_track\n");
    let err = encode(&records, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Encoding(EncodingError::UnreproducibleTime { index: 2, time: 50, decoded: 0 })
    ));

    // the first delta is always 0
    let records = parse("1, 10, Start_track\n");
    let err = encode(&records, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        Error::Encoding(EncodingError::UnreproducibleTime { index: 0, time: 10, decoded: 0 })
    ));
}

#[test]
fn test_more_frequent_triple_gets_shorter_code() {
    let loud = [0, 60, 100];
    let quiet = [0, 60, 0];
    let records: Vec<Record> = std::iter::repeat(loud)
        .take(5)
        .chain(std::iter::repeat(quiet).take(3))
        .map(|params| note_on(0, params))
        .collect();

    let packed = pack(&records);
    let reader = Reader::open(packed.as_slice()).unwrap();
    let model = &reader.header().param_model;
    assert_eq!(model.len(), 2);
    let loud_code = model.code_for(pack_triple(loud)).unwrap();
    let quiet_code = model.code_for(pack_triple(quiet)).unwrap();
    assert!(loud_code.len() <= quiet_code.len());
    assert!(!loud_code.is_prefix_of(quiet_code) && !quiet_code.is_prefix_of(loud_code));
}

#[test]
fn test_header_tables_match_training() {
    let records = parse(SONATA);
    let packed = pack(&records);
    let reader = Reader::open(packed.as_slice()).unwrap();
    let header = reader.header();
    assert_eq!(header.record_count, records.len());
    // deltas seen: 0, 240, 480 (negative ones are not trained)
    assert_eq!(header.time_model.len(), 3);
    assert_eq!(header.time_model.max_bits(), 9);
    let params: Vec<u32> = header.param_model.iter().map(|(value, _)| value).collect();
    assert_eq!(
        params,
        vec![
            pack_triple([0, 7, 100]),
            pack_triple([0, 60, 0]),
            pack_triple([0, 60, 100]),
            pack_triple([0, 65, 0]),
            pack_triple([0, 65, 90]),
            pack_triple([1, 48, 0]),
            pack_triple([1, 48, 80]),
        ]
    );
}

#[test]
fn test_truncated_stream_is_an_error() {
    let params = [0, 60, 100];
    let header = StreamHeader {
        time_model: HuffmanModel::train([0]).unwrap(),
        param_model: HuffmanModel::train([pack_triple(params) as i64]).unwrap(),
        record_count: 10,
    };
    let mut bits = BitWriter::new(Vec::new());
    header.write_to(&mut bits).unwrap();
    // one record: track 0, delta code "0", Note_on_c prefix, parameter code "0"
    bits.write_bits(0, 2).unwrap();
    bits.write_code(header.time_model.encode(0).unwrap()).unwrap();
    bits.write_bits(0b10, 2).unwrap();
    bits.write_code(header.param_model.encode(pack_triple(params) as i64).unwrap()).unwrap();
    let stream = bits.finish().unwrap();

    let mut reader = Reader::open(stream.as_slice()).unwrap();
    assert_eq!(reader.record_count(), 10);
    assert_eq!(reader.next().unwrap().unwrap(), note_on(0, params));
    assert!(matches!(reader.next(), Some(Err(Error::Decoding(_)))));
    assert!(reader.next().is_none());

    let err = decode(stream.as_slice()).unwrap_err();
    assert!(matches!(err, Error::Decoding(DecodingError::UnexpectedEof { .. })));
}

#[test]
fn test_cut_short_encoded_stream_is_an_error() {
    let records = parse(SONATA);
    let packed = pack(&records);
    for keep in [0, 1, packed.len() / 2, packed.len() - 2] {
        let err = decode(&packed[..keep]).unwrap_err();
        assert!(matches!(err, Error::Decoding(_)), "keep {keep}: {err}");
    }
}

#[test]
fn test_unknown_literal_in_stream_is_an_error() {
    let header = StreamHeader {
        time_model: HuffmanModel::train([0]).unwrap(),
        param_model: HuffmanModel::train(std::iter::empty()).unwrap(),
        record_count: 1,
    };
    let mut bits = BitWriter::new(Vec::new());
    header.write_to(&mut bits).unwrap();
    bits.write_bits(0, 2).unwrap();
    bits.write_code(header.time_model.encode(0).unwrap()).unwrap();
    bits.write_bits(0b00, 2).unwrap();
    bits.write_bits(5, 6).unwrap();
    for byte in b"Bogus" {
        bits.write_bits(*byte as u64, 7).unwrap();
    }
    let stream = bits.finish().unwrap();

    let err = decode(stream.as_slice()).unwrap_err();
    assert!(matches!(
        err,
        Error::Decoding(DecodingError::UnknownCommand(ref literal)) if literal == "Bogus"
    ));
}

#[test]
fn test_parameter_code_without_parameter_table_is_an_error() {
    let header = StreamHeader {
        time_model: HuffmanModel::train([0]).unwrap(),
        param_model: HuffmanModel::train(std::iter::empty()).unwrap(),
        record_count: 1,
    };
    let mut bits = BitWriter::new(Vec::new());
    header.write_to(&mut bits).unwrap();
    bits.write_bits(0, 2).unwrap();
    bits.write_code(header.time_model.encode(0).unwrap()).unwrap();
    bits.write_bits(0b01, 2).unwrap();
    bits.write_bits(0xFF, 8).unwrap();
    let stream = bits.finish().unwrap();

    let err = decode(stream.as_slice()).unwrap_err();
    assert!(matches!(
        err,
        Error::Decoding(DecodingError::NoMatchingCode { model: "parameter", .. })
    ));
}
