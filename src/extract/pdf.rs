use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;

use crate::error::ExtractError;
use crate::extract::process::{read_output_lines, run};
use crate::extract::{Metadata, MetadataExtractor};

const INFO_KEY: &str = "InfoKey: ";
const INFO_VALUE: &str = "InfoValue: ";

/// PDF document info dictionary through `pdftk`.
pub struct PdfExtractor {
    tool: String,
}

impl PdfExtractor {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new("pdftk")
    }
}

impl MetadataExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn supports(&self, _path: &Path, mime_type: &str) -> bool {
        mime_type == "application/pdf"
    }

    fn extract(&self, path: &Path) -> Result<Metadata, ExtractError> {
        let lines = read_output_lines(
            &self.tool,
            [path.as_os_str(), OsStr::new("dump_data_utf8"), OsStr::new("output"), OsStr::new("-")],
        )?;
        Ok(parse_dump_data(&lines))
    }

    fn apply(&self, path: &Path, metadata: &Metadata) -> Result<(), ExtractError> {
        let mut info = tempfile::Builder::new().prefix("metainfo-").tempfile()?;
        info.write_all(render_info(metadata).as_bytes())?;
        info.flush()?;

        // pdftk cannot write in place; build next to the original and swap.
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let output = tempfile::Builder::new()
            .prefix(".tagfs-")
            .suffix(".pdf")
            .tempfile_in(dir)?;

        run(
            &self.tool,
            [
                path.as_os_str(),
                OsStr::new("update_info_utf8"),
                info.path().as_os_str(),
                OsStr::new("output"),
                output.path().as_os_str(),
            ],
        )?;

        // The temporary file is created 0600; keep the original's mode.
        let permissions = std::fs::metadata(path)?.permissions();
        output.as_file().set_permissions(permissions)?;
        output.persist(path).map_err(|e| ExtractError::Io(e.error))?;
        Ok(())
    }
}

/// Parses `dump_data` output, pairing each `InfoKey:` with the next `InfoValue:`.
pub fn parse_dump_data(lines: &[String]) -> Metadata {
    let mut result = Metadata::new();
    let mut pending_key: Option<&str> = None;

    for line in lines {
        match pending_key {
            None => {
                if let Some(key) = line.strip_prefix(INFO_KEY) {
                    pending_key = Some(key);
                }
            }
            Some(key) => {
                if let Some(value) = line.strip_prefix(INFO_VALUE) {
                    result.insert(key.to_string(), value.to_string());
                    pending_key = None;
                }
            }
        }
    }
    result
}

fn render_info(metadata: &Metadata) -> String {
    let mut out = String::new();
    for (key, value) in metadata {
        out.push_str("InfoBegin\n");
        out.push_str(&format!("{}{}\n", INFO_KEY, key));
        out.push_str(&format!("{}{}\n", INFO_VALUE, value));
    }
    out
}
