// Writing the export snapshot and the summary to disk.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use serde_json::Value as JSValue;

use crate::tally::*;

/// Writes one CSV file per sheet of the snapshot, named `<name>_<sheet>.csv`.
/// Returns the paths of the written files.
pub fn write_sheets(dir: &Path, name: &str, snapshot: &ExportSnapshot) -> TallyResult<Vec<String>> {
    fs::create_dir_all(dir).context(WritingOutputSnafu {
        path: dir.display().to_string(),
    })?;
    let mut written = Vec::new();
    for sheet in snapshot.sheets.iter() {
        let p: PathBuf = dir.join(format!("{}_{}.csv", name, sheet.name()));
        let path = p.display().to_string();
        let mut wtr = csv::Writer::from_path(&p).context(WritingCsvSnafu { path: &path })?;
        wtr.write_record(ExportSheet::COLUMNS)
            .context(WritingCsvSnafu { path: &path })?;
        for row in sheet.rows.iter() {
            wtr.write_record(&[row.candidate.to_string(), row.votes.to_string()])
                .context(WritingCsvSnafu { path: &path })?;
        }
        wtr.flush().context(WritingOutputSnafu { path: &path })?;
        info!("Wrote {} rows to {:?}", sheet.rows.len(), path);
        written.push(path);
    }
    Ok(written)
}

/// Writes the snapshot as a single workbook `<name>.xlsx`, one worksheet per sheet.
/// Returns the path of the workbook.
pub fn write_workbook(dir: &Path, name: &str, snapshot: &ExportSnapshot) -> TallyResult<String> {
    fs::create_dir_all(dir).context(WritingOutputSnafu {
        path: dir.display().to_string(),
    })?;
    let p: PathBuf = dir.join(format!("{}.xlsx", name));
    let path = p.display().to_string();
    let mut workbook = Workbook::new();
    for sheet in snapshot.sheets.iter() {
        let ws = workbook.add_worksheet();
        ws.set_name(sheet.name()).context(WritingXlsxSnafu { path: &path })?;
        for (col, title) in ExportSheet::COLUMNS.iter().enumerate() {
            ws.write_string(0, col as u16, *title)
                .context(WritingXlsxSnafu { path: &path })?;
        }
        let mut row: u32 = 1;
        for r in sheet.rows.iter() {
            ws.write_string(row, 0, r.candidate.as_str())
                .context(WritingXlsxSnafu { path: &path })?;
            ws.write_number(row, 1, r.votes as f64)
                .context(WritingXlsxSnafu { path: &path })?;
            row += 1;
        }
        debug!("write_workbook: sheet {} with {} rows", sheet.name(), sheet.rows.len());
    }
    workbook.save(&p).context(WritingXlsxSnafu { path: &path })?;
    info!("Wrote workbook {:?}", path);
    Ok(path)
}

pub fn write_summary(path: &Path, summary: &JSValue) -> TallyResult<()> {
    let pretty = serde_json::to_string_pretty(summary).context(ParsingJsonSnafu {})?;
    fs::write(path, pretty).context(WritingOutputSnafu {
        path: path.display().to_string(),
    })?;
    info!("Wrote summary to {:?}", path);
    Ok(())
}
