//! Reading measurement exports.
//!
//! Two export families are supported: text logs from input devices
//! ([`text`]) and delimited tables from output devices ([`delimited`]).

pub mod delimited;
pub mod text;

use std::io::Read;
use std::path::Path;

use crate::error::IngestError;

pub use delimited::parse_csv;
pub use text::{ChannelData, parse_text, scan_measurement_types};

/// Read a file with a bounded read, enforcing `max_file_size`.
///
/// At most `max_file_size + 1` bytes are read so an oversized file is
/// detected without loading it. Bytes that are not valid UTF-8 are replaced,
/// since instrument logs occasionally carry stray code-page characters in
/// their headers.
///
/// # Errors
///
/// Returns [`IngestError::Io`] when the file cannot be opened or read and
/// [`IngestError::FileTooLarge`] when it exceeds the limit.
pub fn read_file_bounded(path: &Path, max_file_size: u64) -> Result<String, IngestError> {
    let io_err = |source| IngestError::Io {
        path: path.to_owned(),
        source,
    };

    let file = std::fs::File::open(path).map_err(io_err)?;

    let mut buffer = Vec::new();
    file.take(max_file_size.saturating_add(1))
        .read_to_end(&mut buffer)
        .map_err(io_err)?;

    if buffer.len() as u64 > max_file_size {
        return Err(IngestError::FileTooLarge {
            limit: max_file_size,
        });
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
