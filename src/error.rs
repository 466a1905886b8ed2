use std::path::PathBuf;

use crate::bake::Channel;

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Terminal failures of a conversion run. None of them are retried; the first
/// one aborts the run after scratch cleanup.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("malformed shading graph in material '{material}': {reason}")]
    MalformedGraph { material: String, reason: String },

    #[error("bake backend failed during {channel} pass: {message}")]
    BakeBackend { channel: Channel, message: String },

    #[error("uv unwrap failed for mesh '{mesh}': {message}")]
    Unwrap { mesh: String, message: String },

    #[error("failed to persist baked image at {}", path.display())]
    ImagePersist {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("export failed for {}: {message}", path.display())]
    Export { path: PathBuf, message: String },

    #[error("packer exited with {}: {stderr}", code.map_or_else(|| "signal".to_string(), |c| format!("code {c}")))]
    Packer { code: Option<i32>, stderr: String },

    #[error("i/o error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub fn malformed(material: &str, reason: impl Into<String>) -> Self {
        Self::MalformedGraph {
            material: material.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for the CLI. Packer failures propagate the child's code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Packer { code: Some(c), .. } if *c != 0 => *c,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packer_exit_code_propagates() {
        let err = ConvertError::Packer {
            code: Some(3),
            stderr: String::new(),
        };
        assert_eq!(err.exit_code(), 3);
        assert!(format!("{err}").contains("code 3"));
    }

    #[test]
    fn other_errors_exit_with_one() {
        let err = ConvertError::malformed("Glass", "no MaterialOutput node");
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            format!("{err}"),
            "malformed shading graph in material 'Glass': no MaterialOutput node"
        );
    }
}
