use std::{fs, io::Write, path::Path};

/// Replace `path` with `bytes` so that a crash leaves either the old or the
/// new content, never a torn file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    // Persist the rename itself.
    #[cfg(unix)]
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::File::open(dir)?.sync_all()?;
    }
    Ok(())
}
