use crate::error::DbpushError;
use crate::pipeline::RunReport;

/// The success line written to stdout.
pub fn summary_line(report: &RunReport) -> String {
    format!("Pushed {} metrics", report.samples)
}

pub fn print_summary(report: &RunReport) {
    println!("{}", summary_line(report));
}

/// Print error to stderr in the contract format: error: <category>: <message>
pub fn print_error(err: &DbpushError) {
    eprintln!("error: {}", err);
}
