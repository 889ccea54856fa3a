use std::io::{self, Write};
use std::path::Path;

/// Replace `path` with `data` so readers see either the old or the new content, never a mix.
///
/// Writes to a temp file in the same directory (named after the target), syncs it, applies
/// `mode` and renames it over `path`. If any step fails the temp file is removed and the error
/// returned.
///
/// `mode` is a unix permission mask (e.g. `0o644`). Elsewhere only its write bits are honoured,
/// as the read-only flag.
pub fn write_file_atomic(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    // NamedTempFile deletes itself on drop, which covers every early return below.
    let mut tmp = tempfile::Builder::new()
        .prefix(name)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    std::fs::set_permissions(tmp.path(), permissions(tmp.as_file(), mode)?)?;
    tmp.persist(path).map_err(|err| err.error)?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "atomically replaced");
    Ok(())
}

#[cfg(unix)]
fn permissions(_file: &std::fs::File, mode: u32) -> io::Result<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn permissions(file: &std::fs::File, mode: u32) -> io::Result<std::fs::Permissions> {
    let mut perms = file.metadata()?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    Ok(perms)
}
