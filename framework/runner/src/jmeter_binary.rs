use std::env;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;

/// Environment variable to override the path to the JMeter launcher used to run tests.
pub const JAWA_JMETER_PATH_ENV: &str = "JAWA_JMETER_PATH";

/// Get the path to the JMeter launcher.
///
/// If the [`JAWA_JMETER_PATH_ENV`] environment variable is set, its value is used as the path to
/// the launcher. Otherwise `jmeter` is looked up in the user's `PATH`.
pub fn jmeter_path() -> anyhow::Result<PathBuf> {
    match env::var(JAWA_JMETER_PATH_ENV).ok().as_deref() {
        Some("") => {
            bail!("'{JAWA_JMETER_PATH_ENV}' set to empty string");
        }
        Some("jmeter") | None => {
            log::debug!("'{JAWA_JMETER_PATH_ENV}' is not a path so looking in user's 'PATH'");
            which::which("jmeter").with_context(|| {
                format!(
                    "JMeter not found in PATH. Please install JMeter or set '{JAWA_JMETER_PATH_ENV}' to the correct path."
                )
            })
        }
        Some(path) => {
            let jmeter_path = PathBuf::from(path);
            if !jmeter_path.exists() {
                bail!(
                    "Path to JMeter overwritten with '{JAWA_JMETER_PATH_ENV}={path}' but that path doesn't exist",
                    path = jmeter_path.display()
                );
            }
            Ok(jmeter_path)
        }
    }
}
