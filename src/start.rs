//! Loading of the optional start-task list.
//!
//! At engine start, a JSON file of seed entries can be merged with the
//! tasks registered on the builder. The file is an array of entries; a
//! missing file is not an error, a malformed one aborts startup. Targets
//! that parse as URLs get their fragment stripped before they enter the
//! queue.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::EngineError;
use crate::task::{Method, Task};

fn default_use_proxy() -> bool {
    true
}

/// One entry of the start-task list file.
#[derive(Debug, Deserialize)]
pub struct StartEntry {
    pub target: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
}

impl StartEntry {
    fn into_task(self) -> Task {
        let mut task = match self.method {
            Method::Get => Task::get(normalize_target(self.target)),
            Method::Post => Task::post(normalize_target(self.target)),
        };
        if let Some(referrer) = self.referrer {
            task = task.with_referrer(referrer);
        }
        for (name, value) in self.headers {
            task = task.with_header(name, value);
        }
        task.with_priority(self.priority).with_proxy(self.use_proxy)
    }
}

// Fragments never reach the server; strip them so equivalent seeds look
// equivalent. Non-URL targets pass through untouched.
fn normalize_target(target: String) -> String {
    match Url::parse(&target) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => target,
    }
}

/// Loads the start-task list at `path`. Returns an empty list when the
/// file does not exist.
pub fn load_start_list(path: &Path) -> Result<Vec<Task>, EngineError> {
    if !path.exists() {
        info!("start list {:?} not found, continuing without it", path);
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| EngineError::StartList {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let entries: Vec<StartEntry> =
        serde_json::from_str(&raw).map_err(|e| EngineError::StartList {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    info!("loaded {} start tasks from {:?}", entries.len(), path);
    Ok(entries.into_iter().map(StartEntry::into_task).collect())
}
