use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use jawa_summary_model::RunArtifacts;

/// Format of the token that names every artifact of a run.
pub const RUN_TOKEN_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Directory conventions of a load test project.
///
/// ```text
/// <root>/plan/main.jmx
/// <root>/prop/<environment>/*.properties
/// <root>/results/result-<token>.csv
/// <root>/jmeter_logs/jmeter-<token>.log
/// <root>/reports/report-<token>/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plan_path(&self) -> PathBuf {
        self.root.join("plan").join("main.jmx")
    }

    pub fn prop_root(&self) -> PathBuf {
        self.root.join("prop")
    }

    pub fn prop_dir(&self, environment: &str) -> PathBuf {
        self.prop_root().join(environment)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("jmeter_logs")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// Names of the environments that have a property directory, sorted.
    pub fn environments(&self) -> io::Result<Vec<String>> {
        let prop_root = self.prop_root();
        let entries = match std::fs::read_dir(&prop_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No property directory at {}", prop_root.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut environments = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                environments.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        environments.sort();
        Ok(environments)
    }

    /// Property files to load for `environment`, sorted by file name.
    ///
    /// A missing environment directory has no property files.
    pub fn property_files(&self, environment: &str) -> io::Result<Vec<PathBuf>> {
        let dir = self.prop_dir(environment);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "No property directory for environment '{environment}' at {}",
                    dir.display()
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "properties") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// A token for a run started at `now` that no earlier run in this project has used.
    ///
    /// Two runs started within the same second get a `-N` suffix.
    pub fn unique_run_id(&self, now: DateTime<Utc>) -> String {
        let base = now.format(RUN_TOKEN_FORMAT).to_string();
        let mut run_id = base.clone();
        let mut suffix = 1;
        while self.report_path(&run_id).exists() || self.results_path(&run_id).exists() {
            run_id = format!("{base}-{suffix}");
            suffix += 1;
        }
        run_id
    }

    pub fn results_path(&self, run_id: &str) -> PathBuf {
        self.results_dir().join(format!("result-{run_id}.csv"))
    }

    pub fn log_path(&self, run_id: &str) -> PathBuf {
        self.logs_dir().join(format!("jmeter-{run_id}.log"))
    }

    pub fn report_path(&self, run_id: &str) -> PathBuf {
        self.reports_dir().join(format!("report-{run_id}"))
    }

    /// Artifact paths of the run `run_id`, given the patched plan it executes.
    pub fn artifacts(&self, run_id: &str, patched_plan_path: PathBuf) -> RunArtifacts {
        RunArtifacts {
            patched_plan_path,
            results_path: self.results_path(run_id),
            log_path: self.log_path(run_id),
            report_path: self.report_path(run_id),
        }
    }

    /// Create the output directories. The report directory itself is left to the engine, which
    /// refuses to write into a non-empty one.
    pub fn create_output_dirs(&self) -> io::Result<()> {
        for dir in [self.results_dir(), self.logs_dir(), self.reports_dir()] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn environments_are_sorted_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert!(layout.environments().unwrap().is_empty());

        for env in ["staging", "dev"] {
            std::fs::create_dir_all(layout.prop_dir(env)).unwrap();
        }
        std::fs::write(layout.prop_root().join("README"), "not an env").unwrap();

        assert_eq!(vec!["dev", "staging"], layout.environments().unwrap());
    }

    #[test]
    fn property_files_are_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let env_dir = layout.prop_dir("dev");
        std::fs::create_dir_all(&env_dir).unwrap();
        for name in ["users.properties", "hosts.properties", "notes.txt"] {
            std::fs::write(env_dir.join(name), "").unwrap();
        }

        assert_eq!(
            vec![env_dir.join("hosts.properties"), env_dir.join("users.properties")],
            layout.property_files("dev").unwrap()
        );
        assert!(layout.property_files("prod").unwrap().is_empty());
    }

    #[test]
    fn run_id_is_suffixed_when_taken() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        assert_eq!("20240501-100000", layout.unique_run_id(now));

        std::fs::create_dir_all(layout.report_path("20240501-100000")).unwrap();
        assert_eq!("20240501-100000-1", layout.unique_run_id(now));

        std::fs::create_dir_all(layout.report_path("20240501-100000-1")).unwrap();
        assert_eq!("20240501-100000-2", layout.unique_run_id(now));
    }

    #[test]
    fn artifact_paths_share_the_token() {
        let layout = ProjectLayout::new("/work");
        let artifacts = layout.artifacts("20240501-100000", PathBuf::from("/work/plan/main-mod.jmx"));

        assert_eq!(PathBuf::from("/work/results/result-20240501-100000.csv"), artifacts.results_path);
        assert_eq!(PathBuf::from("/work/jmeter_logs/jmeter-20240501-100000.log"), artifacts.log_path);
        assert_eq!(PathBuf::from("/work/reports/report-20240501-100000"), artifacts.report_path);
    }
}
