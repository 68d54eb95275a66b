//! Stand-in for the STK Connect socket, used by the integration tests.
//!
//! Speaks just enough of the wire protocol for a full workflow run: the
//! 3-byte ack/nack token, 40-byte payload headers, single- and
//! multi-record responses, and a handful of command verbs over a small
//! in-memory scenario. Facility names come from the command line;
//! defaults cover the smoke tests.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

const DEFAULT_FACILITIES: [&str; 2] = ["WallopsFacility", "Boulder"];

/// Canned access interval every (satellite, facility) pair reports.
const ACCESS_ROW: &str =
    "     1    1 Jul 2024 12:00:00.000    1 Jul 2024 12:09:38.522    578.522";
const REPORT_HEADER_ROW: &str =
    "Access    Start Time (UTCG)    Stop Time (UTCG)    Duration (sec)";

struct HostState {
    ack: bool,
    scenario: Option<String>,
    satellites: Vec<String>,
    facilities: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    println!("listening on {addr}");

    let mut facilities: Vec<String> = std::env::args().skip(1).collect();
    if facilities.is_empty() {
        facilities = DEFAULT_FACILITIES.iter().map(|s| s.to_string()).collect();
    }

    // Serve connections one at a time; the harness only ever opens one.
    for stream in listener.incoming() {
        serve(stream?, facilities.clone())?;
    }
    Ok(())
}

fn serve(stream: TcpStream, facilities: Vec<String>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut state = HostState {
        ack: true,
        scenario: None,
        satellites: Vec::new(),
        facilities,
    };

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        if !handle_command(line.trim(), &mut state, &mut writer)? {
            return Ok(());
        }
    }
}

/// Dispatch one command line. Returns false when the session should end.
fn handle_command(line: &str, state: &mut HostState, writer: &mut TcpStream) -> std::io::Result<bool> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = tokens.split_first() else {
        return Ok(true);
    };

    match verb.to_ascii_uppercase().as_str() {
        "CONCONTROL" => {
            for arg in args {
                if arg.eq_ignore_ascii_case("AckOn") {
                    state.ack = true;
                } else if arg.eq_ignore_ascii_case("AckOff") {
                    state.ack = false;
                } else if arg.eq_ignore_ascii_case("disconnect") {
                    return Ok(false);
                }
            }
            write_ack(writer, state)?;
        }
        "CHECKSCENARIO" => {
            write_ack(writer, state)?;
            let open = if state.scenario.is_some() { "1" } else { "0" };
            write_record(writer, "CHECKSCENARIO", open)?;
        }
        "NEW" => match args {
            [_, "Scenario", name, ..] => {
                state.scenario = Some((*name).to_string());
                write_ack(writer, state)?;
            }
            [_, "*/Satellite", name, ..] => {
                if state.scenario.is_some() {
                    state.satellites.push((*name).to_string());
                    write_ack(writer, state)?;
                } else {
                    write_nack(writer, state)?;
                }
            }
            _ => write_nack(writer, state)?,
        },
        "LOAD" => {
            let name = args
                .last()
                .map(|raw| raw.trim_matches('"'))
                .and_then(|path| path.rsplit(['/', '\\']).next())
                .map(|file| file.trim_end_matches(".sc").to_string());
            match name {
                Some(name) if !name.is_empty() => {
                    state.scenario = Some(name);
                    write_ack(writer, state)?;
                }
                _ => write_nack(writer, state)?,
            }
        }
        "SETSTATE" => {
            let known = state
                .satellites
                .iter()
                .any(|sat| line.contains(&format!("/Satellite/{sat} ")));
            if known {
                write_ack(writer, state)?;
            } else {
                write_nack(writer, state)?;
            }
        }
        "ALLINSTANCENAMES" => {
            write_ack(writer, state)?;
            write_record(writer, "ALLINSTANCENAMES", &instance_names(state, args))?;
        }
        "ACCESS" => {
            write_ack(writer, state)?;
            write_record(writer, "ACCESS", "computed")?;
        }
        "REPORT_RM" => {
            write_ack(writer, state)?;
            write_multi(writer, "REPORT_RM", &[REPORT_HEADER_ROW, ACCESS_ROW])?;
        }
        _ => write_ack(writer, state)?,
    }

    Ok(true)
}

fn instance_names(state: &HostState, args: &[&str]) -> String {
    let Some(scenario) = &state.scenario else {
        return String::new();
    };
    let facility_filter = args.iter().any(|arg| arg.eq_ignore_ascii_case("Facility"));

    let mut paths = Vec::new();
    if !facility_filter {
        paths.push(format!("/Scenario/{scenario}"));
        for sat in &state.satellites {
            paths.push(format!("/Scenario/{scenario}/Satellite/{sat}"));
        }
    }
    for facility in &state.facilities {
        paths.push(format!("/Scenario/{scenario}/Facility/{facility}"));
    }
    paths.join(" ")
}

fn write_ack(writer: &mut TcpStream, state: &HostState) -> std::io::Result<()> {
    if state.ack {
        writer.write_all(b"ACK")?;
        writer.flush()?;
    }
    Ok(())
}

fn write_nack(writer: &mut TcpStream, state: &HostState) -> std::io::Result<()> {
    if state.ack {
        writer.write_all(b"NACK")?;
        writer.flush()?;
    }
    Ok(())
}

fn write_record(writer: &mut TcpStream, verb: &str, body: &str) -> std::io::Result<()> {
    let header = format!("{:<40}", format!("{verb} {}", body.len()));
    writer.write_all(header.as_bytes())?;
    writer.write_all(body.as_bytes())?;
    writer.flush()
}

fn write_multi(writer: &mut TcpStream, verb: &str, records: &[&str]) -> std::io::Result<()> {
    write_record(writer, verb, &records.len().to_string())?;
    for record in records {
        write_record(writer, verb, record)?;
    }
    Ok(())
}
