//! SPIR-V loading.

use std::fs::File;
use std::path::Path;

use crate::error::GraphicsError;

/// Name of the entry point every shader is compiled with.
pub const SHADER_ENTRY_POINT: &std::ffi::CStr = c"main";

/// Read a whole SPIR-V file into words.
///
/// An unreadable file and invalid bytecode are both reported as
/// [`GraphicsError::FileMissing`].
pub fn load_spirv(path: &Path) -> Result<Vec<u32>, GraphicsError> {
    let mut file = File::open(path)
        .map_err(|e| GraphicsError::FileMissing(format!("{}: {}", path.display(), e)))?;

    ash::util::read_spv(&mut file)
        .map_err(|e| GraphicsError::FileMissing(format!("{}: invalid SPIR-V: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vireo-shader-{}-{}", std::process::id(), name))
    }

    #[test]
    fn missing_file() {
        let err = load_spirv(&temp_path("does-not-exist.spv")).unwrap_err();
        assert!(matches!(err, GraphicsError::FileMissing(_)));
    }

    #[test]
    fn truncated_bytecode_is_missing() {
        let path = temp_path("truncated.spv");
        std::fs::write(&path, [0x03, 0x02, 0x23]).unwrap();
        let result = load_spirv(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(GraphicsError::FileMissing(_))));
    }

    #[test]
    fn reads_words() {
        let path = temp_path("words.spv");
        let words: [u32; 2] = [0x0723_0203, 0x0001_0000];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        std::fs::write(&path, &bytes).unwrap();
        let result = load_spirv(&path);
        std::fs::remove_file(&path).ok();

        assert_eq!(result.unwrap(), words.to_vec());
    }
}
