use crate::tally::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use vote_ledger::reporting::DEFAULT_RANKING_LIMIT;

/// The remote decoding service used by default.
pub const QRSERVER_URL: &str = "http://api.qrserver.com/v1/read-qr-code/";
pub const DEFAULT_EXPORT_NAME: &str = "resultados_votacao";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "exportName")]
    pub export_name: Option<String>,
    #[serde(rename = "rankingLimit")]
    pub ranking_limit: Option<usize>,
    /// `xlsx` or `csv`.
    #[serde(rename = "exportFormat")]
    pub export_format: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecoderSettings {
    pub provider: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserSettings {
    #[serde(rename = "malformedTokenPolicy")]
    pub malformed_token_policy: Option<String>,
}

impl ParserSettings {
    pub fn rules(&self) -> TallyResult<ParseRules> {
        match self.malformed_token_policy.as_deref() {
            None | Some("skip") => Ok(ParseRules::DEFAULT_RULES),
            Some("abort") => Ok(ParseRules::STRICT_RULES),
            Some(x) => whatever!("unknown malformed token policy: {:?}", x),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// Overrides the decoder provider for this file.
    pub provider: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(default)]
    pub decoder: DecoderSettings,
    #[serde(default)]
    pub parser: ParserSettings,
    #[serde(default)]
    pub sources: Vec<FileSource>,
}

impl TallyConfig {
    pub fn ranking_limit(&self) -> usize {
        self.output_settings
            .ranking_limit
            .unwrap_or(DEFAULT_RANKING_LIMIT)
    }
}

/// How the content of an input file becomes a QR payload.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    /// An image sent to the remote decoding service.
    QrServer,
    /// A text file holding the already-decoded payload.
    Payload,
}

impl Provider {
    pub fn from_name(name: &str) -> TallyResult<Provider> {
        match name {
            "qrserver" | "image" => Ok(Provider::QrServer),
            "payload" => Ok(Provider::Payload),
            x => whatever!("Provider not implemented {:?}", x),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ExportFormat {
    /// One workbook, `<name>.xlsx`, with a sheet per office.
    Xlsx,
    /// One file per office, `<name>_<office>.csv`.
    Csv,
}

impl ExportFormat {
    pub fn from_name(name: &str) -> TallyResult<ExportFormat> {
        match name {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            x => whatever!("Export format not implemented {:?}", x),
        }
    }
}

pub fn read_config(path: &str) -> TallyResult<TallyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: TallyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> TallyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config() {
        let js = r#"{
            "outputSettings": {"outputDirectory": "out", "exportName": "urna", "rankingLimit": 5},
            "decoder": {"provider": "payload", "timeoutSeconds": 3},
            "parser": {"malformedTokenPolicy": "abort"},
            "sources": [{"filePath": "a.txt"}, {"filePath": "b.png", "provider": "qrserver"}]
        }"#;
        let c: TallyConfig = serde_json::from_str(js).unwrap();
        assert_eq!(c.ranking_limit(), 5);
        assert_eq!(c.parser.rules().unwrap(), ParseRules::STRICT_RULES);
        assert_eq!(c.sources.len(), 2);
        assert_eq!(c.sources[1].provider.as_deref(), Some("qrserver"));
        assert_eq!(c.decoder.timeout_seconds, Some(3));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let c: TallyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c.ranking_limit(), 15);
        assert_eq!(c.parser.rules().unwrap(), ParseRules::DEFAULT_RULES);
        assert!(c.sources.is_empty());
    }

    #[test]
    fn unknown_options_are_rejected() {
        let p = ParserSettings {
            malformed_token_policy: Some("retry".to_string()),
        };
        assert!(p.rules().is_err());
        assert!(ExportFormat::from_name("ods").is_err());
        assert_eq!(ExportFormat::from_name("csv").unwrap(), ExportFormat::Csv);
        assert!(Provider::from_name("zxing").is_err());
        assert_eq!(Provider::from_name("image").unwrap(), Provider::QrServer);
    }
}
