use std::{io::BufWriter, path::PathBuf};

use fs_err::File;
use serde::Serialize;

/// Writes `value` as JSON, creating missing parent directories first.
pub fn write_json<P: Into<PathBuf>, T: Serialize>(path: P, value: &T) -> anyhow::Result<()> {
    let path = path.into();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    Ok(serde_json::to_writer(
        BufWriter::new(File::create(path)?),
        value,
    )?)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::write_json;

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let value = BTreeMap::from([("a".to_owned(), 1), ("b".to_owned(), 2)]);
        write_json(&path, &value).unwrap();
        let read: BTreeMap<String, i32> =
            serde_json::from_str(&fs_err::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, value);
    }

    #[test]
    fn test_write_without_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        assert_eq!(fs_err::read_to_string(&path).unwrap(), "[1,2,3]");
    }
}
