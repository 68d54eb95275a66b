//! Creates satellites in the scenario and attaches their TLE state.
//!
//! The batch is best-effort: a rejected create or a missing catalog number
//! skips that satellite with a warning, and a rejected state attach is
//! logged without rolling the created object back. Only wire-level
//! failures abort the batch.

use std::io::{Read, Write};
use std::path::Path;

use log::{info, warn};

use crate::client::ConnectClient;
use crate::error::StkResult;
use crate::tle::{self, TleEntry};

/// Propagation step handed to SetState, in seconds.
const TLE_TIME_STEP: &str = "60.0";

/// Outcome of one satellite in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Created and TLE state attached.
    Loaded,
    /// Created, but the state attach was rejected; the object exists with
    /// no trajectory.
    CreatedWithoutState,
    /// Never created.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct LoadRecord {
    pub name: String,
    pub status: LoadStatus,
    pub note: Option<String>,
}

/// Per-satellite results for one batch.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub records: Vec<LoadRecord>,
}

impl LoadSummary {
    /// Names of satellites that exist in the scenario after the batch.
    pub fn created_names(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.status != LoadStatus::Skipped)
            .map(|record| record.name.clone())
            .collect()
    }

    pub fn skipped_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == LoadStatus::Skipped)
            .count()
    }

    fn push(&mut self, name: &str, status: LoadStatus, note: Option<String>) {
        self.records.push(LoadRecord {
            name: name.to_string(),
            status,
            note,
        });
    }
}

/// Create every entry's satellite object and attach its TLE state.
///
/// The catalog number is looked up by re-scanning the TLE source file for
/// each satellite rather than trusting the parsed entry, so the file on
/// disk stays the single source of truth for what STK propagates.
pub fn load_all<S: Read + Write>(
    client: &mut ConnectClient<S>,
    scenario_name: &str,
    entries: &[TleEntry],
    tle_path: &Path,
) -> StkResult<LoadSummary> {
    let mut summary = LoadSummary::default();

    for entry in entries {
        let name = entry.name.as_str();

        let create = client.send_command(&format!("New / */Satellite {name}"))?;
        if client.is_ack_on() && !create.acked {
            warn!("satellite {name}: create rejected, skipping state attach");
            summary.push(name, LoadStatus::Skipped, Some("create rejected".into()));
            continue;
        }

        let Some(catalog_number) = tle::find_catalog_number(tle_path, name)? else {
            warn!("satellite {name}: no catalog number in {}", tle_path.display());
            summary.push(name, LoadStatus::Skipped, Some("catalog number not found".into()));
            continue;
        };

        let attach = client.send_command(&format!(
            "SetState /Scenario/{scenario_name}/Satellite/{name} TLE {catalog_number} \
TimePeriod UseScenarioInterval TimeStep {TLE_TIME_STEP} TleSource File \"{}\"",
            tle_path.display()
        ))?;
        if client.is_ack_on() && !attach.acked {
            warn!("satellite {name}: state attach rejected");
            summary.push(
                name,
                LoadStatus::CreatedWithoutState,
                Some("state attach rejected".into()),
            );
            continue;
        }

        info!("satellite {name} loaded with catalog number {catalog_number}");
        summary.push(name, LoadStatus::Loaded, None);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write as IoWrite};

    use super::*;
    use crate::tle::TleSet;

    const TLE_CONTENT: &str = "\
SAT ALPHA
1 11111U 98067A   24183.54166667  .00016717  00000-0  10270-3 0  9000
2 11111  51.6400 208.9163 0006317  69.9862 290.2000 15.49815308  1000
SAT BRAVO
1 22222U 17073A   24183.50000000  .00000100  00000-0  00000-0 0  9991
2 22222  98.7200 120.0000 0001000  90.0000 270.0000 14.19000000  1000
";

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

    fn fixture() -> (tempfile::NamedTempFile, Vec<TleEntry>) {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(TLE_CONTENT.as_bytes()).expect("write");
        let entries = TleSet::load(file.path()).expect("parse").entries;
        (file, entries)
    }

    fn run(acks: &[u8], entries: &[TleEntry], path: &Path) -> (LoadSummary, String) {
        let pipe = Pipe {
            input: Cursor::new(acks.to_vec()),
            written: Vec::new(),
        };
        let mut client = ConnectClient::from_stream(pipe, true);
        let summary = load_all(&mut client, "Ops", entries, path).expect("batch");
        let written = String::from_utf8(client_written(&mut client)).unwrap();
        (summary, written)
    }

    fn client_written(client: &mut ConnectClient<Pipe>) -> Vec<u8> {
        // Snapshot before Drop appends the disconnect notification.
        clientstream(client).written.clone()
    }

    fn clientstream(client: &mut ConnectClient<Pipe>) -> &mut Pipe {
        client.stream_mut().expect("connected")
    }

    #[test]
    fn full_batch_creates_and_attaches_each_satellite() {
        let (file, entries) = fixture();
        // ACK per command: create+attach for both satellites.
        let (summary, written) = run(b"ACKACKACKACK", &entries, file.path());

        assert_eq!(summary.created_names(), vec!["SAT_ALPHA", "SAT_BRAVO"]);
        assert_eq!(summary.skipped_count(), 0);
        assert!(written.contains("New / */Satellite SAT_ALPHA"));
        assert!(written.contains("/Scenario/Ops/Satellite/SAT_ALPHA TLE 11111"));
        assert!(written.contains("/Scenario/Ops/Satellite/SAT_BRAVO TLE 22222"));
        assert!(written.contains(&format!("TleSource File \"{}\"", file.path().display())));
    }

    #[test]
    fn rejected_create_skips_attach_but_not_the_batch() {
        let (file, entries) = fixture();
        // First create nacked; second satellite proceeds normally.
        let (summary, written) = run(b"NACKACKACK", &entries, file.path());

        assert_eq!(summary.created_names(), vec!["SAT_BRAVO"]);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.records[0].status, LoadStatus::Skipped);
        assert!(!written.contains("/Scenario/Ops/Satellite/SAT_ALPHA TLE"));
    }

    #[test]
    fn rejected_attach_keeps_the_created_object() {
        let (file, entries) = fixture();
        let one = &entries[..1];
        let (summary, _) = run(b"ACKNACK", one, file.path());

        assert_eq!(summary.records[0].status, LoadStatus::CreatedWithoutState);
        assert_eq!(summary.created_names(), vec!["SAT_ALPHA"]);
    }

    #[test]
    fn unknown_name_is_skipped_with_warning_note() {
        let (file, _) = fixture();
        let ghost = TleEntry {
            name: "GHOST".into(),
            catalog_number: "99999".into(),
            named_in_source: true,
        };
        let (summary, _) = run(b"ACK", &[ghost], file.path());

        assert_eq!(summary.records[0].status, LoadStatus::Skipped);
        assert_eq!(summary.records[0].note.as_deref(), Some("catalog number not found"));
    }
}
