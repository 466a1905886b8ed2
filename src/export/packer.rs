use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{ConvertError, ConvertResult};

/// Turns a separate-files glTF document into the final compact binary asset.
pub trait Packer {
    fn pack(&self, gltf: &Path, glb: &Path) -> ConvertResult<()>;
}

/// Runs `<program> -i <gltf> -o <glb>` as a child process.
#[derive(Debug, Clone)]
pub struct CommandPacker {
    program: PathBuf,
}

impl CommandPacker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Packer for CommandPacker {
    fn pack(&self, gltf: &Path, glb: &Path) -> ConvertResult<()> {
        log::info!(
            "[pack] {} -i {} -o {}",
            self.program.display(),
            gltf.display(),
            glb.display()
        );
        let output = Command::new(&self.program)
            .arg("-i")
            .arg(gltf)
            .arg("-o")
            .arg(glb)
            .output()
            .map_err(|e| ConvertError::io(&self.program, e))?;

        if !output.status.success() {
            return Err(ConvertError::Packer {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn successful_packer_returns_ok() {
        let packer = CommandPacker::new("true");
        packer
            .pack(Path::new("in.gltf"), Path::new("out.glb"))
            .expect("`true` should exit 0");
    }

    #[test]
    fn failing_packer_carries_exit_code() {
        let packer = CommandPacker::new("false");
        let err = packer
            .pack(Path::new("in.gltf"), Path::new("out.glb"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Packer { code: Some(1), .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn missing_program_is_io_error() {
        let packer = CommandPacker::new("/nonexistent/zen3d-packer");
        let err = packer
            .pack(Path::new("in.gltf"), Path::new("out.glb"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
    }
}
