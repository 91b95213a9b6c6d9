//! Module kind detection from file extensions.
//!
//! Table-driven. Unknown extensions return None, never infer from content.

use crate::symbol::ModuleKind;
use std::path::Path;

/// Detect the module kind of an exported VBA component.
///
/// # Examples
///
/// ```
/// # use vbrewrite::ingest::detect::detect_module_kind;
/// # use vbrewrite::symbol::ModuleKind;
/// # use std::path::Path;
/// assert_eq!(detect_module_kind(Path::new("Module1.bas")), Some(ModuleKind::Standard));
/// assert_eq!(detect_module_kind(Path::new("Class1.cls")), Some(ModuleKind::Class));
/// assert_eq!(detect_module_kind(Path::new("Form1.frm")), None);
/// ```
pub fn detect_module_kind(path: &Path) -> Option<ModuleKind> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();

    let kind = match extension.as_str() {
        "bas" => ModuleKind::Standard,
        "cls" => ModuleKind::Class,
        _ => return None,
    };

    Some(kind)
}

/// Component name of a module file: its file stem.
pub fn component_name(path: &Path) -> Option<&str> {
    path.file_stem()?.to_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(detect_module_kind(Path::new("M.BAS")), Some(ModuleKind::Standard));
        assert_eq!(detect_module_kind(Path::new("src/C.Cls")), Some(ModuleKind::Class));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_module_kind(Path::new("notes.txt")), None);
        assert_eq!(detect_module_kind(Path::new("Makefile")), None);
    }

    #[test]
    fn test_component_name() {
        assert_eq!(component_name(Path::new("src/Module1.bas")), Some("Module1"));
    }
}
