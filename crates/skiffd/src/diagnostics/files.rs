use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Writes the provided bytes to the path using an atomic persist step.
///
/// The temporary sibling is flushed and fsync'd before it is renamed into
/// place, and it is removed again if any step fails.
pub(super) fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("skiffd"),
    );
    builder.suffix(".tmp");

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
