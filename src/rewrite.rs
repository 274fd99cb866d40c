//! Transform-on-disk: copy a file with its header normalized.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::Serialize;

use crate::{
    config::RewriteSettings,
    error::{CsvRecordsError, Result},
    header::normalize_header,
    io_utils::{self, Dialect, QuotePolicy},
    reader::RecordStream,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteOutcome {
    #[serde(rename = "FilePath")]
    pub output: PathBuf,
    #[serde(skip)]
    pub rows: usize,
}

/// `<output dir or input dir>/<input stem><extension>`.
pub fn output_path(input: &Path, settings: &RewriteSettings) -> PathBuf {
    let directory = settings
        .output_directory
        .clone()
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let mut file_name = input.file_stem().unwrap_or_default().to_os_string();
    file_name.push(&settings.extension);
    directory.join(file_name)
}

/// Rewrites one file with the same dialect it was read with. The header row is
/// normalized and data rows are copied field for field until the end of input
/// or the end-of-data row. The destination is replaced atomically, so it may be
/// the input file itself.
pub fn rewrite_file(input: &Path, settings: &RewriteSettings) -> Result<RewriteOutcome> {
    if io_utils::is_dash(input) {
        return Err(CsvRecordsError::configuration(
            "Rewrite needs a file path; standard input has no name to derive the output from",
        ));
    }
    let dialect = settings.dialect.with_headers(true);
    let output = output_path(input, settings);
    if let Some(directory) = &settings.output_directory {
        fs::create_dir_all(directory).map_err(|err| CsvRecordsError::io(directory, err))?;
    }
    let mut stream = RecordStream::open(input, &dialect)?;
    let mut rows = 0usize;
    let mut warned = false;

    io_utils::write_atomically(&output, &dialect, |writer| {
        if let Some(header) = stream.header()? {
            let header = normalize_header(header);
            warn_if_unescaped(&header, &dialect, &output, &mut warned);
            writer
                .write_record(&header)
                .map_err(|err| CsvRecordsError::csv(&output, err))?;
        }
        for row in stream.by_ref() {
            let row = row?;
            warn_if_unescaped(&row, &dialect, &output, &mut warned);
            writer
                .write_record(&row)
                .map_err(|err| CsvRecordsError::csv(&output, err))?;
            rows += 1;
        }
        Ok(())
    })?;

    info!("Rewrote {rows} row(s) from {input:?} to {output:?}");
    Ok(RewriteOutcome { output, rows })
}

/// True when writing `field` without quotes would change how it reads back.
fn needs_quoting(field: &str, dialect: &Dialect) -> bool {
    field
        .bytes()
        .any(|b| b == dialect.delimiter || b == dialect.quote || b == b'\n' || b == b'\r')
}

fn warn_if_unescaped(fields: &[String], dialect: &Dialect, output: &Path, warned: &mut bool) {
    if *warned || dialect.quote_policy != QuotePolicy::Never {
        return;
    }
    if let Some(field) = fields.iter().find(|field| needs_quoting(field, dialect)) {
        warn!(
            "Writing {output:?} without quoting; {field:?} contains a delimiter, quote or line break and will not read back as one field"
        );
        *warned = true;
    }
}
