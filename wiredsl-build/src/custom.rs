//! Custom-code injection: per-entity override files looked up in a parallel
//! input tree whose paths mirror the entity's scope.

use std::fs;
use std::path::PathBuf;

/// Recognised override suffixes and their effect on the generated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomOp {
    /// Extra `#include`s injected into the definition.
    Inc,
    /// Extra members appended to the respective visibility block.
    Public,
    Protected,
    Private,
    /// Replacement bodies for the named operations.
    Read,
    Write,
    Refresh,
    Valid,
    Length,
    Name,
    /// Wraps the generated class with a user-derived subclass.
    Extend,
    /// Text appended verbatim after the entity.
    Append,
    /// Replaces the entire generated file.
    Replace,
    /// Custom constructor body (interfaces).
    Construct,
}

impl CustomOp {
    pub fn suffix(self) -> &'static str {
        match self {
            CustomOp::Inc => "_inc",
            CustomOp::Public => "_public",
            CustomOp::Protected => "_protected",
            CustomOp::Private => "_private",
            CustomOp::Read => "_read",
            CustomOp::Write => "_write",
            CustomOp::Refresh => "_refresh",
            CustomOp::Valid => "_valid",
            CustomOp::Length => "_length",
            CustomOp::Name => "_name",
            CustomOp::Extend => "_extend",
            CustomOp::Append => "_append",
            CustomOp::Replace => "_replace",
            CustomOp::Construct => "_construct",
        }
    }
}

/// Reader over the customisation input tree. With no input directory every
/// lookup is a miss.
#[derive(Debug)]
pub struct CustomCode {
    input_dir: Option<PathBuf>,
}

impl CustomCode {
    pub fn new(input_dir: Option<PathBuf>) -> CustomCode {
        CustomCode { input_dir }
    }

    /// Reads the override for an entity; `rel` is the entity's header path
    /// relative to the include root (`demo/sub/message/Msg1.h`).
    pub fn read(&self, rel: &str, op: CustomOp) -> Option<String> {
        let dir = self.input_dir.as_ref()?;
        let path = dir.join(format!("{}{}", rel, op.suffix()));
        fs::read_to_string(path).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_override_files_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let file_dir = dir.path().join("demo/field");
        std::fs::create_dir_all(&file_dir).unwrap();
        std::fs::write(file_dir.join("F1.h_read"), "custom read body").unwrap();

        let custom = CustomCode::new(Some(dir.path().to_path_buf()));
        assert_eq!(
            Some("custom read body".to_string()),
            custom.read("demo/field/F1.h", CustomOp::Read)
        );
        assert_eq!(None, custom.read("demo/field/F1.h", CustomOp::Write));
        assert_eq!(None, CustomCode::new(None).read("demo/field/F1.h", CustomOp::Read));
    }
}
