//! Scenario resolution: reuse whatever scenario STK already has open, or
//! create/load one from the configured save file.

use std::io::{Read, Write};
use std::path::Path;

use log::info;

use crate::client::ConnectClient;
use crate::config::DEFAULT_SCENARIO_NAME;
use crate::error::{StkError, StkResult};

/// Resolve the scenario this workflow run will populate and return its name.
///
/// An already-open scenario is detected with `CheckScenario /` and its name
/// recovered from the object paths `AllInstanceNames /` returns. Otherwise
/// the configured save file decides between `Load` (file exists on disk)
/// and `New` (name derived from the file stem); with no file configured a
/// scenario with the fixed default name is created. A rejected create/load
/// is fatal.
pub fn resolve_scenario<S: Read + Write>(
    client: &mut ConnectClient<S>,
    scenario_file: Option<&Path>,
) -> StkResult<String> {
    let check = client.send_command("CheckScenario /")?;
    let open = check
        .first_record()
        .and_then(|record| record.split_whitespace().next())
        == Some("1");

    if open {
        let names = client.send_command("AllInstanceNames /")?;
        return extract_scenario_name(&names.text()).ok_or_else(|| {
            StkError::ScenarioSetup("a scenario is open but its name could not be determined".into())
        });
    }

    let (name, command) = match scenario_file {
        Some(path) => {
            let name = scenario_name_from_path(path);
            if path.exists() {
                (name, format!("Load / Scenario \"{}\"", path.display()))
            } else {
                (name.clone(), format!("New / Scenario {name}"))
            }
        }
        None => (
            DEFAULT_SCENARIO_NAME.to_string(),
            format!("New / Scenario {DEFAULT_SCENARIO_NAME}"),
        ),
    };

    info!("setting up scenario {name}");
    client.send_expecting_ack(&command).map_err(|err| match err {
        StkError::HostRejected(command) => {
            StkError::ScenarioSetup(format!("STK rejected `{command}`"))
        }
        other => other,
    })?;
    Ok(name)
}

/// Pull the scenario name out of an object-path listing: the segment
/// immediately following the last `/Scenario/` occurrence, truncated at
/// the next `/`.
pub fn extract_scenario_name(paths: &str) -> Option<String> {
    let start = paths.rfind("/Scenario/")? + "/Scenario/".len();
    let rest = &paths[start..];
    let name = rest
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or("");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn scenario_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_SCENARIO_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn name_is_segment_after_last_scenario_marker() {
        let paths = "/Scenario/Foo/Satellite/Bar/Sensor/Baz";
        assert_eq!(extract_scenario_name(paths).as_deref(), Some("Foo"));
    }

    #[test]
    fn last_scenario_occurrence_wins() {
        let paths = "/Scenario/Old/Satellite/X /Scenario/Current/Facility/Y";
        assert_eq!(extract_scenario_name(paths).as_deref(), Some("Current"));
    }

    #[test]
    fn missing_marker_yields_none() {
        assert!(extract_scenario_name("/Facility/OnlyGround").is_none());
        assert!(extract_scenario_name("").is_none());
    }

    #[test]
    fn scenario_name_comes_from_file_stem() {
        assert_eq!(
            scenario_name_from_path(&PathBuf::from("C:/scenarios/OpsRun.sc")),
            "OpsRun"
        );
    }

    // Scripted-transport plumbing mirrors the client unit tests.
    struct Pipe {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl std::io::Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl std::io::Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn single_record(verb: &str, body: &str) -> Vec<u8> {
        let mut wire = format!("{:<40}", format!("{verb} {}", body.len())).into_bytes();
        wire.extend(body.as_bytes());
        wire
    }

    #[test]
    fn open_scenario_is_reused() {
        let mut wire = b"ACK".to_vec();
        wire.extend(single_record("CHECKSCENARIO", "1"));
        wire.extend(b"ACK");
        wire.extend(single_record(
            "ALLINSTANCENAMES",
            "/Scenario/Ops /Scenario/Ops/Facility/Wallops",
        ));

        let pipe = Pipe {
            input: Cursor::new(wire),
            written: Vec::new(),
        };
        let mut client = ConnectClient::from_stream(pipe, true);
        let name = resolve_scenario(&mut client, None).expect("resolve");
        assert_eq!(name, "Ops");
    }

    #[test]
    fn no_open_scenario_creates_default_name() {
        let mut wire = b"ACK".to_vec();
        wire.extend(single_record("CHECKSCENARIO", "0"));
        wire.extend(b"ACK"); // New / Scenario
        let pipe = Pipe {
            input: Cursor::new(wire),
            written: Vec::new(),
        };
        let mut client = ConnectClient::from_stream(pipe, true);
        let name = resolve_scenario(&mut client, None).expect("resolve");
        assert_eq!(name, DEFAULT_SCENARIO_NAME);
    }

    #[test]
    fn rejected_create_is_fatal_scenario_setup() {
        let mut wire = b"ACK".to_vec();
        wire.extend(single_record("CHECKSCENARIO", "0"));
        wire.extend(b"NACK");
        let pipe = Pipe {
            input: Cursor::new(wire),
            written: Vec::new(),
        };
        let mut client = ConnectClient::from_stream(pipe, true);
        let err = resolve_scenario(&mut client, None).unwrap_err();
        assert!(matches!(err, StkError::ScenarioSetup(_)));
    }

    #[test]
    fn missing_save_file_issues_new_with_stem_name() {
        let mut wire = b"ACK".to_vec();
        wire.extend(single_record("CHECKSCENARIO", "0"));
        wire.extend(b"ACK");
        let pipe = Pipe {
            input: Cursor::new(wire),
            written: Vec::new(),
        };
        let mut client = ConnectClient::from_stream(pipe, true);
        let name = resolve_scenario(&mut client, Some(Path::new("Z:/nowhere/NightOps.sc")))
            .expect("resolve");
        assert_eq!(name, "NightOps");
    }
}
