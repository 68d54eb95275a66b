//! Wire-level framing for the Connect protocol.
//!
//! Outbound commands are newline-terminated text lines. Inbound data is
//! self-describing only at the byte-count level: a fixed 40-byte header
//! declares how many payload bytes follow. Payload bodies can contain
//! embedded newlines, so every read here is byte-exact; a buffered line
//! read would desynchronize the stream.

use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;

use crate::error::{StkError, StkResult};

/// Response payload shape declared for a Connect command verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandShape {
    /// Command returns no payload beyond the ack/nack token.
    NoData,
    /// One 40-byte header followed by its body.
    SingleRecord,
    /// A leading header+body carrying the record count, then that many
    /// header+body pairs.
    MultiRecord,
}

/// Look up the declared response shape for a command verb.
///
/// Verbs absent from the table return no payload. The table covers the
/// subset of the Connect command surface this harness issues plus the
/// common query and report verbs.
pub fn response_shape(verb: &str) -> CommandShape {
    static SHAPES: OnceLock<HashMap<&'static str, CommandShape>> = OnceLock::new();
    let table = SHAPES.get_or_init(|| {
        use CommandShape::{MultiRecord, SingleRecord};
        let mut map = HashMap::new();
        // Keep this list in alphabetical order.
        map.insert("ACCESS", SingleRecord);
        map.insert("ACCESSINFO_R", SingleRecord);
        map.insert("AER", SingleRecord);
        map.insert("ALLACCESS", MultiRecord);
        map.insert("ALLINSTANCENAMES", SingleRecord);
        map.insert("ASYNCALLOWED_R", SingleRecord);
        map.insert("CHECKISAPPBUSY", SingleRecord);
        map.insert("CHECKSCENARIO", SingleRecord);
        map.insert("CONVERTDATE", SingleRecord);
        map.insert("DOESOBJEXIST", SingleRecord);
        map.insert("GETACCESSES", MultiRecord);
        map.insert("GETANIMTIME", SingleRecord);
        map.insert("GETDEFAULTDIR", SingleRecord);
        map.insert("GETEPOCH", SingleRecord);
        map.insert("GETFULLREPORT", MultiRecord);
        map.insert("GETLASTCOMMAND", MultiRecord);
        map.insert("GETREPORT", MultiRecord);
        map.insert("GETRPTSUMMARY", MultiRecord);
        map.insert("GETSCENPATH", SingleRecord);
        map.insert("GETSTKHOMEDIR", SingleRecord);
        map.insert("GETSTKVERSION", SingleRecord);
        map.insert("GETTIMEPERIOD", SingleRecord);
        map.insert("LISTSUBOBJECTS", SingleRecord);
        map.insert("ONEPOINTACCESS", MultiRecord);
        map.insert("QUICKREPORT_RM", MultiRecord);
        map.insert("REPORT_RM", MultiRecord);
        map.insert("SHOWNAMES", SingleRecord);
        map.insert("SHOWUNITS", SingleRecord);
        map.insert("UNITS_GET", SingleRecord);
        map
    });
    table
        .get(verb.to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(CommandShape::NoData)
}

/// Encode one command line for the wire.
pub fn encode_command(line: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    bytes
}

/// Read exactly `count` bytes, looping over partial reads, and return them
/// as text. EOF before `count` bytes is a transport failure.
pub fn read_exact_string<R: Read>(reader: &mut R, count: usize) -> StkResult<String> {
    let mut buffer = vec![0u8; count];
    let mut filled = 0;
    while filled < count {
        let read = reader
            .read(&mut buffer[filled..])
            .map_err(StkError::Transport)?;
        if read == 0 {
            return Err(StkError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("connection closed after {filled} of {count} payload bytes"),
            )));
        }
        filled += read;
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Read the 3-byte ack/nack token. A leading `A` is an ack; anything else
/// is a nack, in which case exactly one further byte is discarded.
pub fn read_ack<R: Read>(reader: &mut R) -> StkResult<bool> {
    let token = read_exact_string(reader, 3)?;
    if token.as_bytes().first() == Some(&b'A') {
        Ok(true)
    } else {
        read_exact_string(reader, 1)?;
        Ok(false)
    }
}

/// Read the fixed 40-byte header and return the declared payload length.
///
/// The header is whitespace-tokenized with embedded newlines treated as
/// spaces; the second token is the decimal byte count of the body.
pub fn read_header<R: Read>(reader: &mut R) -> StkResult<usize> {
    let raw = read_exact_string(reader, 40)?;
    let cleaned = raw.replace('\n', " ");
    let mut tokens = cleaned.split_whitespace();
    tokens.next();
    let length = tokens
        .next()
        .ok_or_else(|| StkError::protocol(format!("header missing length token: {raw:?}")))?;
    length
        .trim()
        .parse::<usize>()
        .map_err(|_| StkError::protocol(format!("header length is not an integer: {raw:?}")))
}

/// Read one header+body pair.
pub fn read_record<R: Read>(reader: &mut R) -> StkResult<String> {
    let length = read_header(reader)?;
    read_exact_string(reader, length)
}

/// Read a multi-record response: a leading record whose first token is the
/// record count, then that many header+body pairs.
pub fn read_multi_records<R: Read>(reader: &mut R) -> StkResult<Vec<String>> {
    let leader = read_record(reader)?;
    let cleaned = leader.replace('\n', " ");
    let count_token = cleaned
        .split_whitespace()
        .next()
        .ok_or_else(|| StkError::protocol(format!("empty multi-record leader: {leader:?}")))?;
    let count = count_token
        .parse::<usize>()
        .map_err(|_| StkError::protocol(format!("bad multi-record count: {leader:?}")))?;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(read_record(reader)?);
    }
    Ok(records)
}

/// Fixed-width header preceding each asynchronous message packet.
#[derive(Debug, Clone)]
pub struct AsyncHeader {
    pub sync_pattern: String,
    pub header_length: String,
    pub version: String,
    pub revision: String,
    pub type_length: String,
    pub async_type: String,
    pub identifier: String,
    pub total_packets: u32,
    pub packet_number: u32,
    pub data_length: usize,
}

/// Read one async message header field by field.
pub fn read_async_header<R: Read>(reader: &mut R) -> StkResult<AsyncHeader> {
    let sync_pattern = read_exact_string(reader, 3)?;
    let header_length = read_exact_string(reader, 2)?;
    let version = read_exact_string(reader, 1)?;
    let revision = read_exact_string(reader, 1)?;
    let type_length = read_exact_string(reader, 2)?;
    let async_type = read_exact_string(reader, 15)?;
    let identifier = read_exact_string(reader, 6)?;
    let total_packets = parse_async_count(&read_exact_string(reader, 4)?)?;
    let packet_number = parse_async_count(&read_exact_string(reader, 4)?)?;
    let data_length = parse_async_count(&read_exact_string(reader, 4)?)? as usize;

    Ok(AsyncHeader {
        sync_pattern,
        header_length,
        version,
        revision,
        type_length,
        async_type,
        identifier,
        total_packets,
        packet_number,
        data_length,
    })
}

/// Drain one complete asynchronous message and return its payload lines.
pub fn read_async_message<R: Read>(reader: &mut R) -> StkResult<Vec<String>> {
    let mut header = read_async_header(reader)?;
    let total = header.total_packets;
    let mut payload = String::new();

    for packet in 1..=total {
        payload.push_str(&read_exact_string(reader, header.data_length)?);
        if packet < total {
            header = read_async_header(reader)?;
        }
    }

    Ok(payload
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn parse_async_count(field: &str) -> StkResult<u32> {
    field
        .trim()
        .parse::<u32>()
        .map_err(|_| StkError::protocol(format!("bad async header field: {field:?}")))
}
