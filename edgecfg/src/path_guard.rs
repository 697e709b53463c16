use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Make sure `dir` can receive output files, creating it when missing.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            bail!(
                "refusing to write into {}: path exists and is not a directory",
                dir.display()
            );
        }
        return Ok(());
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::prepare_output_dir;

    #[test]
    fn creates_missing_directories() {
        let tmp = TempDir::new().expect("tempdir");
        let nested = tmp.path().join("a").join("b");
        prepare_output_dir(&nested).expect("create");
        assert!(nested.is_dir());
        prepare_output_dir(&nested).expect("existing dir is fine");
    }

    #[test]
    fn rejects_existing_file() {
        let tmp = TempDir::new().expect("tempdir");
        let file = tmp.path().join("out");
        fs::write(&file, "x").expect("write");
        let err = prepare_output_dir(&file).expect_err("file must be rejected");
        assert!(err.to_string().contains("not a directory"));
    }
}
