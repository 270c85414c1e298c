//! A simple CLI tool for auditing election dumps offline.
//! This uses the ledger's own dump verification, and is by definition
//! compatible with the output of `GET /elections/<election_id>/dump`.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use evote_ledger::model::{
    common::Timestamp,
    election::{DumpError, ElectionDump},
};

const PROGRAM_NAME: &str = "ledger-audit";

const ABOUT_TEXT: &str = "Audit the internal consistency of an election dump.

EXIT CODES:
     0: Verification succeeded.
   255: Ran successfully, but verification failed.
 Other: Error.";

const DUMP_PATH: &str = "DUMP_PATH";

const DUMP_PATH_HELP: &str = "The path to a JSON dump of a specific election,\n\
as returned by `GET /elections/<election_id>/dump`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(DUMP_PATH)
            .help(DUMP_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// Verification failed due to the contained reason.
    Verification(DumpError),
}

/// Running totals for every candidate, as of one vote.
#[derive(Debug, Eq, PartialEq)]
struct TimelinePoint {
    pub timestamp: Timestamp,
    /// Name of the candidate who received this vote.
    pub candidate_name: String,
    /// Totals after this vote, in candidate order.
    pub totals: Vec<u64>,
}

impl Display for TimelinePoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let totals = self
            .totals
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" / ");
        write!(
            f,
            "{} +1 {} => {}",
            self.timestamp.to_rfc3339(),
            self.candidate_name,
            totals
        )
    }
}

/// A verified dump and the vote-by-vote story of how it got there.
#[derive(Debug, Eq, PartialEq)]
struct AuditReport {
    pub election_name: String,
    pub candidate_names: Vec<String>,
    pub timeline: Vec<TimelinePoint>,
}

/// Replay the timeline into cumulative per-candidate totals. Only call this
/// on a verified dump, where every timeline entry names a real candidate.
fn cumulative_timeline(dump: &ElectionDump) -> Vec<TimelinePoint> {
    let mut totals = vec![0; dump.candidates.len()];
    let mut timeline = Vec::with_capacity(dump.timeline.len());
    for vote in &dump.timeline {
        let position = dump
            .candidates
            .iter()
            .position(|candidate| candidate.id == vote.candidate_id);
        if let Some(position) = position {
            totals[position] += 1;
            timeline.push(TimelinePoint {
                timestamp: vote.timestamp,
                candidate_name: dump.candidates[position].name.clone(),
                totals: totals.clone(),
            });
        }
    }
    timeline
}

/// Run verification.
fn verify(path: &str) -> Result<AuditReport, Error> {
    // Load the file.
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let dump: ElectionDump =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    // Run verification.
    dump.verify().map_err(Error::Verification)?;

    Ok(AuditReport {
        election_name: dump.details.name.clone(),
        candidate_names: dump
            .candidates
            .iter()
            .map(|candidate| candidate.name.clone())
            .collect(),
        timeline: cumulative_timeline(&dump),
    })
}

/// Run verification, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(DUMP_PATH).unwrap(); // Required argument is guaranteed to be present.
    match verify(path) {
        Ok(report) => {
            println!("Verification succeeded for \"{}\".", report.election_name);
            println!("Candidates: {}", report.candidate_names.join(" / "));
            for point in report.timeline {
                println!("{}", point);
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {}", msg);
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {}", msg);
            1
        }
        Err(Error::Verification(err)) => {
            println!("Verification failed: {}.", err);
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(seconds: i64) -> Timestamp {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    #[test]
    fn verification() {
        // This test actually enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["evote_ledger"], None, None);

        let expected_report = AuditReport {
            election_name: "Student council".to_string(),
            candidate_names: vec!["Ada".to_string(), "Grace".to_string()],
            timeline: vec![
                TimelinePoint {
                    timestamp: at(1_700_000_060),
                    candidate_name: "Ada".to_string(),
                    totals: vec![1, 0],
                },
                TimelinePoint {
                    timestamp: at(1_700_000_120),
                    candidate_name: "Grace".to_string(),
                    totals: vec![1, 1],
                },
                TimelinePoint {
                    timestamp: at(1_700_000_120),
                    candidate_name: "Ada".to_string(),
                    totals: vec![2, 1],
                },
            ],
        };
        assert_eq!(verify("example_dumps/election.json"), Ok(expected_report));

        let expected_report = AuditReport {
            election_name: "Empty".to_string(),
            candidate_names: vec!["Ada".to_string()],
            timeline: vec![],
        };
        assert_eq!(
            verify("example_dumps/election_no_votes.json"),
            Ok(expected_report)
        );

        assert_eq!(
            verify("example_dumps/election_invalid_totals.json"),
            Err(Error::Verification(DumpError::TotalMismatch {
                recorded: 4,
                counted: 3
            }))
        );
        assert_eq!(
            verify("example_dumps/election_invalid_candidate.json"),
            Err(Error::Verification(DumpError::UnknownCandidate {
                index: 1,
                candidate_id: 3
            }))
        );
        assert_eq!(
            verify("example_dumps/election_out_of_order.json"),
            Err(Error::Verification(DumpError::OutOfOrder { index: 2 }))
        );
    }

    #[test]
    fn correct_cli_usage() {
        let command_line = [PROGRAM_NAME, "example_dumps/election.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "example_dumps/election_invalid_totals.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);

        let command_line = [PROGRAM_NAME, "example_dumps/election_malformed.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
