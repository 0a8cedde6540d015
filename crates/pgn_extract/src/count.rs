use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::rc::Rc;

use pgn_stream::{FieldTable, FieldValue};
use serde::Serialize;

use crate::input::{Error, InputArgs, ReportTarget, Run};

const RATING_TAG: &str = "WhiteElo";
const TIME_CONTROL_TAG: &str = "TimeControl";

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Dataset figures gathered while counting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetStats {
    /// Records carrying an `Event` tag.
    pub games: u64,
    /// Records with a readable `WhiteElo`.
    pub rated_games: u64,
    pub average_elo: Option<f64>,
    pub min_elo: Option<i64>,
    pub max_elo: Option<i64>,
    /// Distinct `TimeControl` values.
    pub time_controls: usize,
}

#[derive(Debug, Default)]
struct DatasetTally {
    games: u64,
    rated_games: u64,
    elo_sum: i64,
    min_elo: Option<i64>,
    max_elo: Option<i64>,
    time_controls: BTreeSet<String>,
}

impl DatasetTally {
    fn observe(&mut self, fields: &FieldTable) {
        if fields.contains("Event") {
            self.games += 1;
        }
        if let Some(elo) = readable_rating(fields) {
            self.rated_games += 1;
            self.elo_sum += elo;
            self.min_elo = Some(self.min_elo.map_or(elo, |min| min.min(elo)));
            self.max_elo = Some(self.max_elo.map_or(elo, |max| max.max(elo)));
        }
        if let Some(time_control) = fields.text(TIME_CONTROL_TAG) {
            if !self.time_controls.contains(time_control) {
                self.time_controls.insert(time_control.to_string());
            }
        }
    }

    fn stats(&self) -> DatasetStats {
        let average_elo = (self.rated_games > 0)
            .then(|| self.elo_sum as f64 / self.rated_games as f64);
        DatasetStats {
            games: self.games,
            rated_games: self.rated_games,
            average_elo,
            min_elo: self.min_elo,
            max_elo: self.max_elo,
            time_controls: self.time_controls.len(),
        }
    }
}

/// A rating that was present and parsed; the `0` stand-in for a bad value
/// does not count.
fn readable_rating(fields: &FieldTable) -> Option<i64> {
    let Some(FieldValue::Integer(elo)) = fields.get(RATING_TAG) else {
        return None;
    };
    if fields.warnings().iter().any(|warning| warning.tag == RATING_TAG) {
        return None;
    }
    Some(*elo)
}

/// Scans the whole input and prints record, game, rating and time-control
/// figures.
pub fn run(args: Args) -> Result<(), Error> {
    let mut config = args.input.load_config()?;
    config.max_output_records = None;

    let tally = Rc::new(RefCell::new(DatasetTally::default()));
    let observer = Rc::clone(&tally);
    let predicate = move |fields: &FieldTable| {
        observer.borrow_mut().observe(fields);
        true
    };

    let run = Run {
        command: "count",
        input: &args.input,
        config,
        predicate: Box::new(predicate),
        report_to: ReportTarget::Stdout,
    };
    let report_tally = Rc::clone(&tally);
    let stats = run.execute_with(Box::new(io::sink()), move || {
        let dataset = report_tally.borrow().stats();
        Some(dataset)
    })?;

    if !args.input.json_report {
        let dataset = tally.borrow().stats();
        let mut out = io::stdout().lock();
        writeln!(out, "records: {}", stats.records_scanned)?;
        writeln!(out, "games: {}", dataset.games)?;
        if let (Some(average), Some(min), Some(max)) =
            (dataset.average_elo, dataset.min_elo, dataset.max_elo)
        {
            writeln!(out, "average elo: {}", average.round() as i64)?;
            writeln!(out, "elo range: {min} - {max}")?;
        }
        writeln!(out, "time controls: {}", dataset.time_controls)?;
    }
    Ok(())
}
