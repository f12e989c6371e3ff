use std::path::{Path, PathBuf};

use crate::tally::config_reader::Provider;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Resolves the path of a source relative to the directory of the configuration file.
pub fn resolve_path(root: Option<&Path>, path: &str) -> String {
    match root {
        Some(r) if Path::new(path).is_relative() => {
            let p: PathBuf = [r, Path::new(path)].iter().collect();
            p.display().to_string()
        }
        _ => path.to_string(),
    }
}

/// Text files hold already-decoded payloads; everything else is an image.
pub fn guess_provider(path: &str) -> Provider {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("txt") => Provider::Payload,
        _ => Provider::QrServer,
    }
}
