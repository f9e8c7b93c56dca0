//! Mapping from (mode, variant) to HuMo inference scripts

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Inference script for each supported (mode, variant) pair
pub const SCRIPT_MATRIX: &[((&str, &str), &str)] = &[
    (("TA", "1.3B"), "infer_ta.sh"),
    (("TA", "14B"), "infer_ta.sh"),
    (("TIA", "1.3B"), "infer_tia.sh"),
    (("TIA", "14B"), "infer_tia.sh"),
];

/// Directory inside the HuMo checkout that holds the scripts
pub const SCRIPTS_DIR: &str = "scripts";

/// Look up the script for a resolved mode and canonical variant.
///
/// Matching is exact; callers pass the values `resolve` produced.
pub fn select_script(mode: &str, variant: &str) -> Result<&'static str> {
    SCRIPT_MATRIX
        .iter()
        .find(|((m, v), _)| *m == mode && *v == variant)
        .map(|(_, script)| *script)
        .ok_or_else(|| Error::UnsupportedCombination {
            mode: mode.to_string(),
            variant: variant.to_string(),
        })
}

/// Path of `name` inside `<humo_dir>/scripts`
///
/// # Errors
///
/// `Error::MissingDependency` when the script does not exist.
pub fn locate_script(humo_dir: &Path, name: &str) -> Result<PathBuf> {
    let path = humo_dir.join(SCRIPTS_DIR).join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::MissingDependency(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_lookup() {
        assert_eq!(select_script("TA", "1.3B").unwrap(), "infer_ta.sh");
        assert_eq!(select_script("TA", "14B").unwrap(), "infer_ta.sh");
        assert_eq!(select_script("TIA", "1.3B").unwrap(), "infer_tia.sh");
        assert_eq!(select_script("TIA", "14B").unwrap(), "infer_tia.sh");
    }

    #[test]
    fn test_unsupported_pair_names_key() {
        let err = select_script("T2V", "1.3B").unwrap_err();
        match &err {
            Error::UnsupportedCombination { mode, variant } => {
                assert_eq!(mode, "T2V");
                assert_eq!(variant, "1.3B");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("(T2V, 1.3B)"));

        assert!(select_script("TA", "1.7B").is_err());
        assert!(select_script("ta", "1.3B").is_err());
    }

    #[test]
    fn test_locate_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scripts")).unwrap();
        std::fs::write(dir.path().join("scripts/infer_ta.sh"), "#!/bin/bash\n").unwrap();

        let path = locate_script(dir.path(), "infer_ta.sh").unwrap();
        assert!(path.ends_with("scripts/infer_ta.sh"));

        let err = locate_script(dir.path(), "infer_tia.sh").unwrap_err();
        assert!(matches!(err, Error::MissingDependency(p) if p.ends_with("infer_tia.sh")));
    }
}
