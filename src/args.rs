use clap::Parser;

/// This program adds up the votes of the QR codes printed on ballot-tally reports.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file listing the scans to read and the
    /// output settings. See the manual of the vote_ledger crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference summary in JSON format. If provided, qrtally will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (directory, 'stdout' or empty) If specified, the export and the JSON summary are
    /// written to this directory ('stdout' prints the summary instead). Overrides the
    /// output directory of the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, repeatable) A scan to ingest, either an image of a QR code or a text file
    /// with the decoded payload. These are added after the sources of the --config option.
    #[clap(short, long, value_parser)]
    pub input: Vec<String>,

    /// (image or payload) How to read the files passed with --input. By default, .txt files
    /// are payloads and everything else is an image.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (scan number, repeatable) Removes the scan with this number after all the inputs are
    /// ingested. Scans are numbered from 1 in the order of the inputs.
    #[clap(long, value_parser)]
    pub remove: Vec<u64>,

    /// (default 15) The number of candidates shown in the rankings.
    #[clap(short, long, value_parser)]
    pub limit: Option<usize>,

    /// (xlsx or csv, default xlsx) The format of the export: one workbook with a sheet per
    /// office, or one CSV file per office.
    #[clap(long, value_parser)]
    pub format: Option<String>,

    /// If passed as an argument, a payload with a malformed vote token is rejected entirely
    /// instead of skipping the token.
    #[clap(long, takes_value = false)]
    pub strict: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
