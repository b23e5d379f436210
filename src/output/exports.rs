use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Writes `value` as JSON followed by a newline.
pub fn export_json<T: Serialize>(value: &T, pretty: bool, output: &mut dyn Write) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *output, value)?;
    } else {
        serde_json::to_writer(&mut *output, value)?;
    }
    writeln!(output)?;
    Ok(())
}

/// Writes JSON to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, pretty: bool, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            export_json(value, pretty, &mut writer)?;
            writer.flush()?;
        }
        None => export_json(value, pretty, &mut io::stdout().lock())?,
    }
    Ok(())
}
