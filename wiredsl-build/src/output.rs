//! Output filesystem: directory creation and text-file writing with
//! failure propagation.

use std::fs;
use std::path::{Path, PathBuf};

use wiredsl::{Error, ErrorKind, Result};

#[derive(Debug)]
pub struct OutputFs {
    root: PathBuf,
}

impl OutputFs {
    pub fn new(root: impl Into<PathBuf>) -> OutputFs {
        OutputFs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a file relative to the output root, creating parent
    /// directories on demand.
    pub fn write(&self, rel: impl AsRef<Path>, contents: &str) -> Result<()> {
        let path = self.root.join(rel.as_ref());
        log::info!("Generating {}", path.display());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                Error::new(
                    ErrorKind::IoError,
                    format!("Failed to create \"{}\": {}", parent.display(), err),
                )
            })?;
        }

        fs::write(&path, contents).map_err(|err| {
            Error::new(
                ErrorKind::IoError,
                format!("Failed to write \"{}\": {}", path.display(), err),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_through_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputFs::new(dir.path());
        out.write("include/demo/field/F1.h", "#pragma once\n").unwrap();
        let written = std::fs::read_to_string(dir.path().join("include/demo/field/F1.h")).unwrap();
        assert_eq!("#pragma once\n", written);
    }
}
