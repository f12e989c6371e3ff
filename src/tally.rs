use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use vote_ledger::*;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::tally::config_reader::*;
use crate::tally::io_common::*;
use crate::tally::io_decode::{PayloadFileDecoder, QrServerDecoder};

pub mod config_reader;
mod io_common;
mod io_decode;
mod io_export;

#[derive(Debug, Snafu)]
pub enum TallyError {
    #[snafu(display("Error reading input file {path}"))]
    ReadingInput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening JSON file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Error writing workbook {path}"))]
    WritingXlsx {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },
    #[snafu(display("Error creating the HTTP client of the decoder"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("No input: pass files with --input or list them in the sources of --config"))]
    NoSources {},
    #[snafu(display("Tally error: {source}"))]
    Session { source: SessionError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TallyResult<T> = Result<T, TallyError>;

/// One file to ingest.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InputFile {
    pub path: String,
    pub provider: Provider,
}

/// Everything a run needs, once the command line and the configuration file are merged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub inputs: Vec<InputFile>,
    pub removals: Vec<ScanId>,
    pub rules: ParseRules,
    pub ranking_limit: usize,
    pub decoder_url: String,
    pub timeout_seconds: u64,
    /// Directory of the export and summary. `stdout` prints the summary instead.
    pub out: Option<String>,
    pub export_name: String,
    pub export_format: ExportFormat,
    pub reference: Option<String>,
}

fn build_settings(args: &Args, config: &TallyConfig, root: Option<&Path>) -> TallyResult<RunSettings> {
    let default_provider = match config.decoder.provider.as_deref() {
        Some(p) => Some(Provider::from_name(p)?),
        None => None,
    };
    let cli_provider = match args.input_type.as_deref() {
        Some(p) => Some(Provider::from_name(p)?),
        None => None,
    };

    let mut inputs: Vec<InputFile> = Vec::new();
    for cfs in config.sources.iter() {
        let provider = match cfs.provider.as_deref() {
            Some(p) => Provider::from_name(p)?,
            None => default_provider.unwrap_or_else(|| guess_provider(&cfs.file_path)),
        };
        inputs.push(InputFile {
            path: resolve_path(root, &cfs.file_path),
            provider,
        });
    }
    for p in args.input.iter() {
        inputs.push(InputFile {
            path: p.clone(),
            provider: cli_provider.unwrap_or_else(|| guess_provider(p)),
        });
    }
    ensure!(!inputs.is_empty(), NoSourcesSnafu {});

    let rules = if args.strict {
        ParseRules::STRICT_RULES
    } else {
        config.parser.rules()?
    };

    let format_name = args
        .format
        .as_deref()
        .or(config.output_settings.export_format.as_deref());
    let export_format = match format_name {
        Some(f) => ExportFormat::from_name(f)?,
        None => ExportFormat::Xlsx,
    };

    let out = match &args.out {
        Some(o) => Some(o.clone()),
        None => config
            .output_settings
            .output_directory
            .as_ref()
            .map(|d| resolve_path(root, d)),
    };

    Ok(RunSettings {
        inputs,
        removals: args.remove.iter().map(|id| ScanId(*id)).collect(),
        rules,
        ranking_limit: args.limit.unwrap_or_else(|| config.ranking_limit()),
        decoder_url: config
            .decoder
            .url
            .clone()
            .unwrap_or_else(|| QRSERVER_URL.to_string()),
        timeout_seconds: config
            .decoder
            .timeout_seconds
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        out,
        export_name: config
            .output_settings
            .export_name
            .clone()
            .unwrap_or_else(|| DEFAULT_EXPORT_NAME.to_string()),
        export_format,
        reference: args.reference.clone(),
    })
}

fn ingest_inputs(session: &mut TallySession, settings: &RunSettings) -> TallyResult<()> {
    // Only built when an image has to be sent.
    let mut remote: Option<QrServerDecoder> = None;
    for input in settings.inputs.iter() {
        info!("Attempting to read scan file {:?}", input.path);
        let content = fs::read(&input.path).context(ReadingInputSnafu {
            path: input.path.clone(),
        })?;
        let name = simplify_file_name(&input.path);
        let id = match input.provider {
            Provider::Payload => session.ingest_image(&name, &content, &PayloadFileDecoder),
            Provider::QrServer => {
                if remote.is_none() {
                    remote = Some(QrServerDecoder::new(
                        &settings.decoder_url,
                        settings.timeout_seconds,
                    )?);
                }
                match remote.as_ref() {
                    Some(decoder) => session.ingest_image(&name, &content, decoder),
                    None => whatever!("decoder not initialized"),
                }
            }
        }
        .context(SessionSnafu {})?;
        debug!("ingest_inputs: {:?} -> scan {}", input.path, id);
    }
    Ok(())
}

fn apply_removals(session: &mut TallySession, removals: &[ScanId]) -> TallyResult<()> {
    for id in removals.iter() {
        match session.remove(*id) {
            Ok(scan) => info!("Removed scan {} ({})", id, scan.source.name),
            Err(e) if !e.is_fatal() => warn!("Cannot remove scan {}: {}", id, e),
            Err(e) => return Err(e).context(SessionSnafu {}),
        }
    }
    Ok(())
}

fn ranking_to_json(entries: &[RankingEntry]) -> Vec<JSValue> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, e)| json!({"rank": idx + 1, "candidate": e.candidate, "votes": e.votes}))
        .collect()
}

fn build_summary_js(session: &TallySession, limit: usize) -> JSValue {
    let ledger = session.ledger();
    let mut rankings = serde_json::Map::new();
    let mut breakdowns = serde_json::Map::new();
    for office in Office::ALL {
        rankings.insert(
            office.name().to_string(),
            JSValue::Array(ranking_to_json(&session.ranking(office, limit))),
        );
        breakdowns.insert(
            office.name().to_string(),
            json!(session.scan_breakdown(office, limit)),
        );
    }
    json!({
        "totals": {
            "totalVotes": ledger.total_votes(),
            "blank": ledger.blank(),
            "null": ledger.null(),
            "activeScans": ledger.active_records(),
        },
        "scans": session.list(),
        "rankings": rankings,
        "scanBreakdown": breakdowns,
        "export": session.export(),
    })
}

fn print_report(session: &TallySession, limit: usize) {
    println!("QR codes:");
    for s in session.list() {
        match s.status {
            ScanStatus::Decoded => println!(
                "  {:>3} {} {}: {} votes (blank: {}, null: {})",
                s.position, s.id, s.source.name, s.candidate_votes, s.blank, s.null
            ),
            ScanStatus::Failed => println!(
                "  {:>3} {} {}: ERROR {}",
                s.position,
                s.id,
                s.source.name,
                s.failure.unwrap_or_default()
            ),
        }
    }
    for office in Office::ALL {
        println!("Ranking {} (top {}):", office, limit);
        let rk = session.ranking(office, limit);
        if rk.is_empty() {
            println!("  no votes registered");
        }
        for (idx, e) in rk.iter().enumerate() {
            println!("  {:>3}. {:>6} {:>8}", idx + 1, e.candidate, e.votes);
        }
    }
    let ledger = session.ledger();
    println!(
        "Total: {} votes, {} blank, {} null",
        ledger.total_votes(),
        ledger.blank(),
        ledger.null()
    );
}

/// Ingests all the inputs, applies the removals and produces the summary of the tally.
pub fn run(settings: &RunSettings) -> TallyResult<JSValue> {
    info!("settings: {:?}", settings);
    let mut session = TallySession::new(settings.rules);
    ingest_inputs(&mut session, settings)?;
    apply_removals(&mut session, &settings.removals)?;
    if !session.is_consistent() {
        whatever!("the ledger does not match the registered scans")
    }

    print_report(&session, settings.ranking_limit);
    let summary = build_summary_js(&session, settings.ranking_limit);

    match settings.out.as_deref() {
        Some("stdout") => {
            let pretty = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;
            println!("{}", pretty);
        }
        Some(dir) => {
            let dir_p = Path::new(dir);
            let snapshot = session.export();
            match settings.export_format {
                ExportFormat::Xlsx => {
                    io_export::write_workbook(dir_p, &settings.export_name, &snapshot)?;
                }
                ExportFormat::Csv => {
                    io_export::write_sheets(dir_p, &settings.export_name, &snapshot)?;
                }
            }
            let summary_p: PathBuf = dir_p.join(format!("{}_summary.json", settings.export_name));
            io_export::write_summary(&summary_p, &summary)?;
        }
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &settings.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_ref = serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        let pretty_stats = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;
        if pretty_ref != pretty_stats {
            warn!("Found differences with the reference summary");
            print_diff(pretty_ref.as_str(), pretty_stats.as_ref(), "\n");
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }
    Ok(summary)
}

pub fn run_tally(args: &Args) -> TallyResult<JSValue> {
    let (config, root) = match &args.config {
        Some(path) => {
            let config = read_config(path)?;
            let root = Path::new(path).parent().map(|p| p.to_path_buf());
            (config, root)
        }
        None => (TallyConfig::default(), None),
    };
    let settings = build_settings(args, &config, root.as_deref())?;
    run(&settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let d = std::env::temp_dir().join(format!("qrtally-{}-{}", name, std::process::id()));
        fs::create_dir_all(&d).unwrap();
        d
    }

    fn payload_file(dir: &Path, name: &str, payload: &str) -> InputFile {
        let p = dir.join(name);
        fs::write(&p, payload).unwrap();
        InputFile {
            path: p.display().to_string(),
            provider: Provider::Payload,
        }
    }

    fn settings(inputs: Vec<InputFile>) -> RunSettings {
        RunSettings {
            inputs,
            removals: vec![],
            rules: ParseRules::DEFAULT_RULES,
            ranking_limit: 15,
            decoder_url: QRSERVER_URL.to_string(),
            timeout_seconds: 1,
            out: None,
            export_name: DEFAULT_EXPORT_NAME.to_string(),
            export_format: ExportFormat::Csv,
            reference: None,
        }
    }

    #[test]
    fn payload_files_end_to_end() {
        let dir = test_dir("e2e");
        let mut s = settings(vec![
            payload_file(&dir, "a.txt", "12:100 45678:4 BRAN:1"),
            payload_file(&dir, "b.txt", "12:50 13:20 NULO:2"),
            payload_file(&dir, "c.txt", "no votes in here"),
        ]);
        s.removals = vec![ScanId(1), ScanId(9)];
        s.out = Some(dir.join("out").display().to_string());
        let summary = run(&s).unwrap();

        assert_eq!(summary["totals"]["totalVotes"], json!(70));
        assert_eq!(summary["totals"]["null"], json!(2));
        assert_eq!(summary["totals"]["blank"], json!(0));
        assert_eq!(summary["scans"].as_array().map(|a| a.len()), Some(2));
        assert_eq!(summary["scans"][1]["status"], json!("Failed"));
        assert_eq!(summary["rankings"]["Mayor"][0]["candidate"], json!("12"));
        assert_eq!(summary["rankings"]["Mayor"][0]["votes"], json!(50));
        assert!(dir.join("out/resultados_votacao_Mayor.csv").exists());
        assert!(dir.join("out/resultados_votacao_summary.json").exists());

        s.export_format = ExportFormat::Xlsx;
        s.out = Some(dir.join("book").display().to_string());
        run(&s).unwrap();
        assert!(dir.join("book/resultados_votacao.xlsx").exists());
        assert!(!dir.join("book/resultados_votacao_Mayor.csv").exists());

        // The written summary is a valid reference for the same run.
        s.out = None;
        s.reference = Some(
            dir.join("out/resultados_votacao_summary.json")
                .display()
                .to_string(),
        );
        assert!(run(&s).is_ok());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn reference_mismatch_fails() {
        let dir = test_dir("reference");
        let mut s = settings(vec![payload_file(&dir, "a.txt", "12:1")]);
        let ref_p = dir.join("ref.json");
        fs::write(&ref_p, "{}").unwrap();
        s.reference = Some(ref_p.display().to_string());
        assert!(run(&s).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_input_is_an_error() {
        let s = settings(vec![InputFile {
            path: "/nonexistent/qrtally/a.txt".to_string(),
            provider: Provider::Payload,
        }]);
        assert!(matches!(run(&s), Err(TallyError::ReadingInput { .. })));
    }

    #[test]
    fn settings_merge_config_and_command_line() {
        let config: TallyConfig = serde_json::from_str(
            r#"{"outputSettings": {"outputDirectory": "res", "rankingLimit": 5},
                "parser": {"malformedTokenPolicy": "abort"},
                "sources": [{"filePath": "a.png"}, {"filePath": "b.txt"}]}"#,
        )
        .unwrap();
        let args = Args {
            config: None,
            reference: None,
            out: None,
            input: vec!["c.png".to_string()],
            input_type: Some("payload".to_string()),
            remove: vec![2],
            limit: None,
            format: None,
            strict: false,
            verbose: false,
        };
        let s = build_settings(&args, &config, Some(Path::new("/data"))).unwrap();
        assert_eq!(
            s.inputs,
            vec![
                InputFile {
                    path: "/data/a.png".to_string(),
                    provider: Provider::QrServer
                },
                InputFile {
                    path: "/data/b.txt".to_string(),
                    provider: Provider::Payload
                },
                InputFile {
                    path: "c.png".to_string(),
                    provider: Provider::Payload
                },
            ]
        );
        assert_eq!(s.rules, ParseRules::STRICT_RULES);
        assert_eq!(s.ranking_limit, 5);
        assert_eq!(s.out.as_deref(), Some("/data/res"));
        assert_eq!(s.removals, vec![ScanId(2)]);
        assert_eq!(s.export_name, DEFAULT_EXPORT_NAME);
        assert_eq!(s.export_format, ExportFormat::Xlsx);
    }

    #[test]
    fn no_inputs_is_an_error() {
        let args = Args {
            config: None,
            reference: None,
            out: None,
            input: vec![],
            input_type: None,
            remove: vec![],
            limit: None,
            format: None,
            strict: false,
            verbose: false,
        };
        assert!(matches!(
            build_settings(&args, &TallyConfig::default(), None),
            Err(TallyError::NoSources {})
        ));
    }
}
