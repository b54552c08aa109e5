// The scene-preparation step runs out of band (a script packs textures and
// flattens links inside the project file) and reports its outcome through a
// one-line log written next to the project: the literal `OK`, or
// `ERR<->some message`. This module is the only place that file format is
// known.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Outcome of the scene-preparation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareOutcome {
    Ok,
    Err(String),
}

/// Where the preparation script writes its log for a given project file.
pub fn log_path(project: &Path) -> PathBuf {
    let mut name = project.as_os_str().to_os_string();
    name.push(".log");
    PathBuf::from(name)
}

/// Parse the log file contents.
pub fn parse_outcome(contents: &str) -> PrepareOutcome {
    let contents = contents.trim_end();
    if contents == "OK" {
        return PrepareOutcome::Ok;
    }
    match contents.strip_prefix("ERR") {
        Some(rest) => {
            let message = rest.strip_prefix("<->").unwrap_or(rest);
            PrepareOutcome::Err(message.to_string())
        }
        // Anything else means the script was interrupted mid-write.
        None => PrepareOutcome::Err(format!("unrecognized prepare log: {:?}", contents)),
    }
}

/// Read the preparation outcome for a project file. `Ok(None)` means no log
/// exists, i.e. the preparation step was never run.
pub fn read_outcome(project: &Path) -> Result<Option<PrepareOutcome>> {
    let path = log_path(project);
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    Ok(Some(parse_outcome(&contents)))
}
