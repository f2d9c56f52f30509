//! In-memory shape of one midicsv line.
//!
//! A line is `track, time, command[, fields...]`. Three commands carry a
//! triple of byte parameters that the stream packs into 24 bits and
//! Huffman-codes; every other command keeps its text after the time column
//! verbatim and is stored as 7-bit characters.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// The 2-bit class prefix written in front of every record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandClass {
    Literal,
    Control,
    NoteOn,
    NoteOff,
}

impl CommandClass {
    pub fn prefix(self) -> u8 {
        match self {
            CommandClass::Literal => 0b00,
            CommandClass::Control => 0b01,
            CommandClass::NoteOn => 0b10,
            CommandClass::NoteOff => 0b11,
        }
    }

    pub fn from_prefix(prefix: u8) -> Option<Self> {
        match prefix {
            0b00 => Some(CommandClass::Literal),
            0b01 => Some(CommandClass::Control),
            0b10 => Some(CommandClass::NoteOn),
            0b11 => Some(CommandClass::NoteOff),
            _ => None,
        }
    }
}

/// The midicsv commands the stream knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Header,
    StartTrack,
    TitleT,
    TextT,
    TimeSignature,
    Tempo,
    EndTrack,
    KeySignature,
    ControlC,
    NoteOnC,
    NoteOffC,
    EndOfFile,
}

impl Command {
    pub const ALL: [Command; 12] = [
        Command::Header,
        Command::StartTrack,
        Command::TitleT,
        Command::TextT,
        Command::TimeSignature,
        Command::Tempo,
        Command::EndTrack,
        Command::KeySignature,
        Command::ControlC,
        Command::NoteOnC,
        Command::NoteOffC,
        Command::EndOfFile,
    ];

    /// Name as it appears in the text form.
    pub fn name(self) -> &'static str {
        match self {
            Command::Header => "Header",
            Command::StartTrack => "Start_track",
            Command::TitleT => "Title_t",
            Command::TextT => "Text_t",
            Command::TimeSignature => "Time_signature",
            Command::Tempo => "Tempo",
            Command::EndTrack => "End_track",
            Command::KeySignature => "Key_signature",
            Command::ControlC => "Control_c",
            Command::NoteOnC => "Note_on_c",
            Command::NoteOffC => "Note_off_c",
            Command::EndOfFile => "End_of_file",
        }
    }

    pub fn class(self) -> CommandClass {
        match self {
            Command::ControlC => CommandClass::Control,
            Command::NoteOnC => CommandClass::NoteOn,
            Command::NoteOffC => CommandClass::NoteOff,
            _ => CommandClass::Literal,
        }
    }

    /// True for the commands whose payload is a byte triple.
    pub fn has_params(self) -> bool {
        self.class() != CommandClass::Literal
    }

    /// Exact name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Resolve the literal-class command a literal tail starts with.
    pub fn from_literal(literal: &str) -> Option<Self> {
        let name = literal.split(',').next().unwrap_or_default().trim();
        Self::from_name(name).filter(|c| !c.has_params())
    }

    /// The parameterized command carried by a non-literal class.
    pub fn for_class(class: CommandClass) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.has_params() && c.class() == class)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What follows the command: verbatim text, or three byte parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    /// Everything from the command name to the end of the line.
    Literal(String),
    Triple([u8; 3]),
}

/// Pack three bytes into the low 24 bits, first byte most significant.
pub fn pack_triple(params: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, params[0], params[1], params[2]])
}

/// Inverse of [`pack_triple`]; the top byte is ignored.
pub fn unpack_triple(packed: u32) -> [u8; 3] {
    let [_, a, b, c] = packed.to_be_bytes();
    [a, b, c]
}

/// One event line.
///
/// The constructors keep the payload consistent with the command: literal
/// commands always carry `Payload::Literal`, parameterized ones
/// `Payload::Triple`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
    track: u8,
    time: u32,
    command: Command,
    payload: Payload,
}

impl Record {
    /// A literal-class record; the command is read from the start of `literal`.
    pub fn literal(track: u8, time: u32, literal: impl Into<String>) -> Result<Self, ParseError> {
        let literal = literal.into();
        let name = literal.split(',').next().unwrap_or_default().trim();
        let command = Command::from_name(name).ok_or_else(|| ParseError::UnknownCommand(name.to_string()))?;
        if command.has_params() {
            return Err(ParseError::PayloadMismatch {
                command: command.name(),
            });
        }
        Ok(Self {
            track,
            time,
            command,
            payload: Payload::Literal(literal),
        })
    }

    /// A parameterized record.
    pub fn triple(track: u8, time: u32, command: Command, params: [u8; 3]) -> Result<Self, ParseError> {
        if !command.has_params() {
            return Err(ParseError::PayloadMismatch {
                command: command.name(),
            });
        }
        Ok(Self {
            track,
            time,
            command,
            payload: Payload::Triple(params),
        })
    }

    /// Assemble a record whose command and payload are already known to agree.
    pub(crate) fn from_parts(track: u8, time: u32, command: Command, payload: Payload) -> Self {
        Self {
            track,
            time,
            command,
            payload,
        }
    }

    pub fn track(&self) -> u8 {
        self.track
    }

    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The 24-bit packed parameters, if this record has any.
    pub fn packed_params(&self) -> Option<u32> {
        match self.payload {
            Payload::Triple(params) => Some(pack_triple(params)),
            Payload::Literal(_) => None,
        }
    }
}

fn parse_field<T: FromStr>(field: &'static str, raw: Option<&str>) -> Result<T, ParseError> {
    let raw = raw.ok_or(ParseError::MissingField(field))?.trim();
    raw.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

impl FromStr for Record {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut columns = line.splitn(3, ',');
        let track = parse_field("track", columns.next())?;
        let time = parse_field("time", columns.next())?;
        let rest = columns.next().ok_or(ParseError::MissingField("command"))?;
        let rest = rest.strip_prefix(' ').unwrap_or(rest);

        let mut fields = rest.split(',');
        let name = fields.next().unwrap_or_default().trim();
        let command = Command::from_name(name).ok_or_else(|| ParseError::UnknownCommand(name.to_string()))?;
        if !command.has_params() {
            return Record::literal(track, time, rest);
        }

        let params: Vec<&str> = fields.collect();
        if params.len() != 3 {
            return Err(ParseError::WrongParameterCount {
                command: command.name(),
                found: params.len(),
            });
        }
        let mut triple = [0u8; 3];
        for (slot, raw) in triple.iter_mut().zip(params) {
            *slot = parse_field("parameter", Some(raw))?;
        }
        Record::triple(track, time, command, triple)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, ", self.track, self.time)?;
        match &self.payload {
            Payload::Literal(text) => f.write_str(text),
            Payload::Triple([a, b, c]) => write!(f, "{}, {}, {}, {}", self.command, a, b, c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_are_unique_per_class() {
        for class in [
            CommandClass::Literal,
            CommandClass::Control,
            CommandClass::NoteOn,
            CommandClass::NoteOff,
        ] {
            assert_eq!(CommandClass::from_prefix(class.prefix()), Some(class));
        }
        assert_eq!(Command::for_class(CommandClass::Control), Some(Command::ControlC));
        assert_eq!(Command::for_class(CommandClass::NoteOn), Some(Command::NoteOnC));
        assert_eq!(Command::for_class(CommandClass::NoteOff), Some(Command::NoteOffC));
        assert_eq!(Command::for_class(CommandClass::Literal), None);
        let literal_count = Command::ALL.iter().filter(|c| !c.has_params()).count();
        assert_eq!(literal_count, 9);
    }

    #[test]
    fn test_parse_literal_line() {
        let record: Record = "0, 0, Header, 1, 3, 480".parse().unwrap();
        assert_eq!(record.track(), 0);
        assert_eq!(record.time(), 0);
        assert_eq!(record.command(), Command::Header);
        assert_eq!(record.payload(), &Payload::Literal("Header, 1, 3, 480".to_string()));
        assert_eq!(record.packed_params(), None);
        assert_eq!(record.to_string(), "0, 0, Header, 1, 3, 480");
    }

    #[test]
    fn test_parse_literal_without_fields() {
        let record: Record = "1, 7680, End_track".parse().unwrap();
        assert_eq!(record.command(), Command::EndTrack);
        assert_eq!(record.to_string(), "1, 7680, End_track");
    }

    #[test]
    fn test_parse_quoted_literal_keeps_commas() {
        let line = "1, 0, Title_t, \"Sonata, Op. 2\"";
        let record: Record = line.parse().unwrap();
        assert_eq!(record.command(), Command::TitleT);
        assert_eq!(record.to_string(), line);
    }

    #[test]
    fn test_parse_triple_line() {
        let record: Record = "2, 960, Note_on_c, 0, 60, 100".parse().unwrap();
        assert_eq!(record.command(), Command::NoteOnC);
        assert_eq!(record.payload(), &Payload::Triple([0, 60, 100]));
        assert_eq!(record.packed_params(), Some(0x003C64));
        assert_eq!(record.to_string(), "2, 960, Note_on_c, 0, 60, 100");
    }

    #[test]
    fn test_pack_unpack() {
        assert_eq!(pack_triple([1, 2, 3]), 0x010203);
        assert_eq!(unpack_triple(0x010203), [1, 2, 3]);
        assert_eq!(unpack_triple(pack_triple([255, 0, 255])), [255, 0, 255]);
    }

    #[test]
    fn test_unknown_command() {
        let err = "1, 0, Pitch_bend_c, 0, 8192".parse::<Record>().unwrap_err();
        assert_eq!(err, ParseError::UnknownCommand("Pitch_bend_c".to_string()));
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(
            "".parse::<Record>().unwrap_err(),
            ParseError::InvalidNumber { field: "track", value: String::new() }
        );
        assert_eq!("0".parse::<Record>().unwrap_err(), ParseError::MissingField("time"));
        assert_eq!("0, 0".parse::<Record>().unwrap_err(), ParseError::MissingField("command"));
        assert_eq!(
            "x, 0, Tempo, 500000".parse::<Record>().unwrap_err(),
            ParseError::InvalidNumber { field: "track", value: "x".to_string() }
        );
        assert_eq!(
            "1, 0, Note_off_c, 0, 60".parse::<Record>().unwrap_err(),
            ParseError::WrongParameterCount { command: "Note_off_c", found: 2 }
        );
        assert_eq!(
            "1, 0, Control_c, 0, 64, 256".parse::<Record>().unwrap_err(),
            ParseError::InvalidNumber { field: "parameter", value: "256".to_string() }
        );
    }

    #[test]
    fn test_payload_must_match_command() {
        assert_eq!(
            Record::triple(0, 0, Command::Tempo, [0, 0, 0]).unwrap_err(),
            ParseError::PayloadMismatch { command: "Tempo" }
        );
        assert_eq!(
            Record::literal(0, 0, "Note_on_c, 0, 60, 100").unwrap_err(),
            ParseError::PayloadMismatch { command: "Note_on_c" }
        );
    }

    #[test]
    fn test_from_literal_only_resolves_literal_class() {
        assert_eq!(Command::from_literal("Tempo, 500000"), Some(Command::Tempo));
        assert_eq!(Command::from_literal("End_of_file"), Some(Command::EndOfFile));
        assert_eq!(Command::from_literal("Note_on_c, 0, 1, 2"), None);
        assert_eq!(Command::from_literal(""), None);
    }
}
