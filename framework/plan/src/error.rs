use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Plan not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read plan {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write patched plan {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type PlanResult<T> = Result<T, PlanError>;

pub(crate) fn read_plan(path: &std::path::Path) -> PlanResult<String> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            PlanError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            PlanError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}
