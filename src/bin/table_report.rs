//! Summarize a saved sweep table: which answers led to which outcomes.

use clap::{Arg, Command};
use std::error::Error;
use std::path::PathBuf;

use form_sweep::table::OutputTable;

fn main() -> Result<(), Box<dyn Error>> {
    let matches = Command::new("table_report")
        .about("Outcome breakdown per question for a saved form-sweep table")
        .arg(
            Arg::new("table")
                .help("Path to table.json inside a sweep session")
                .value_name("FILE")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the breakdown as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let Some(path) = matches.get_one::<PathBuf>("table") else {
        return Err("missing table path".into());
    };
    let table = OutputTable::load(path)?;
    let breakdown = table.breakdown();

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    if breakdown.is_empty() {
        println!("{} has no Results column yet", path.display());
        return Ok(());
    }

    println!("Sheet: {} ({} data rows)", table.name, table.row_count().saturating_sub(2));
    for column in &breakdown {
        println!();
        println!("{}", column.question);
        for tally in &column.answers {
            let total = tally.successes + tally.failures;
            println!(
                "  {:<30} {:>4} runs  {:>4} success  {:>4} failure",
                tally.answer, total, tally.successes, tally.failures
            );
        }
    }
    Ok(())
}
