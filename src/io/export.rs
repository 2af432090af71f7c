//! CSV export for simulation step results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::StepResult;

/// Column header for CSV telemetry export.
const HEADER: &str = "step,time_s,target_mw,committed_mw,reserve_mw,\
                      regulation_command_mw,regulation_mw,output_mw,\
                      ramp_mw_per_s,ramp_ok";

/// Exports simulation results to a CSV file at the given path.
///
/// Writes a header row followed by one data row per step. Produces
/// deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[StepResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes simulation results as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[StepResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in results {
        wtr.write_record(&[
            r.step.to_string(),
            format!("{:.3}", r.time),
            format!("{:.6}", r.target),
            format!("{:.6}", r.committed),
            format!("{:.6}", r.reserve),
            format!("{:.6}", r.regulation_command),
            format!("{:.6}", r.regulation),
            format!("{:.6}", r.output),
            format!("{:.6}", r.ramp_rate),
            r.within_ramp_limits.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_step(k: usize) -> StepResult {
        StepResult {
            step: k,
            time: k as f64 * 60.0,
            target: 80.0,
            committed: 50.0 + k as f64,
            reserve: 0.5,
            regulation_command: 1.0,
            regulation: 0.75,
            output: 51.25 + k as f64,
            ramp_rate: 1.0 / 60.0,
            within_ramp_limits: true,
            targets_consumed: 0,
        }
    }

    #[test]
    fn header_matches_schema() {
        let results = vec![make_step(0)];
        let mut buf = Vec::new();
        write_csv(&results, &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        let first_line = output.as_deref().unwrap_or("").lines().next().unwrap_or("");
        assert_eq!(
            first_line,
            "step,time_s,target_mw,committed_mw,reserve_mw,\
             regulation_command_mw,regulation_mw,output_mw,ramp_mw_per_s,ramp_ok"
        );
    }

    #[test]
    fn row_count_matches_step_count() {
        let results: Vec<StepResult> = (0..24).map(make_step).collect();
        let mut buf = Vec::new();
        write_csv(&results, &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        let lines: Vec<&str> = output.as_deref().unwrap_or("").lines().collect();
        // 1 header + 24 data rows
        assert_eq!(lines.len(), 25);
    }

    #[test]
    fn deterministic_output() {
        let results: Vec<StepResult> = (0..5).map(make_step).collect();
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        write_csv(&results, &mut buf1).ok();
        write_csv(&results, &mut buf2).ok();
        assert_eq!(buf1, buf2);
    }

    #[test]
    fn rows_are_parseable() {
        let results: Vec<StepResult> = (0..3).map(make_step).collect();
        let mut buf = Vec::new();
        write_csv(&results, &mut buf).ok();

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        let headers = rdr.headers().cloned().ok();
        assert_eq!(headers.as_ref().map(csv::StringRecord::len), Some(10));

        let mut row_count = 0;
        for record in rdr.records() {
            let Ok(rec) = record else {
                panic!("every row should parse");
            };
            for i in 1..9 {
                assert!(rec[i].parse::<f64>().is_ok(), "column {i} should parse as f64");
            }
            assert!(rec[9].parse::<bool>().is_ok(), "ramp_ok should parse as bool");
            row_count += 1;
        }
        assert_eq!(row_count, 3);
    }
}
