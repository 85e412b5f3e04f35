//! Trip script loading.
//!
//! Scripts live in a directory as one `{bike_id}.json` per bike. A second
//! directory of `{bike_id}.json` files (content ignored) marks bikes with
//! hand-checked routes; those start near full charge at assembly.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

use spoke_core::TripScript;
use tracing::{debug, warn};

/// Load every trip script in a directory, keyed by bike id. Files that
/// are not `{id}.json` are skipped; unreadable scripts are logged and
/// skipped so one bad file never takes the fleet down.
pub fn load_scripts(dir: &Path) -> io::Result<HashMap<i64, TripScript>> {
    let mut scripts = HashMap::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(bike_id) = bike_id_from_path(&path) else {
            debug!(path = %path.display(), "skipping non-script file");
            continue;
        };

        match read_script(&path) {
            Ok(script) => {
                scripts.insert(bike_id, script);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable trip script"),
        }
    }

    Ok(scripts)
}

/// Bike ids whose initial battery charge should be biased high.
pub fn load_good_route_ids(dir: &Path) -> io::Result<HashSet<i64>> {
    let mut ids = HashSet::new();
    for entry in fs::read_dir(dir)? {
        if let Some(bike_id) = bike_id_from_path(&entry?.path()) {
            ids.insert(bike_id);
        }
    }
    Ok(ids)
}

fn read_script(path: &Path) -> Result<TripScript, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

fn bike_id_from_path(path: &Path) -> Option<i64> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!("spoke-routes-{name}-{}", std::process::id()));
            fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn write(&self, name: &str, content: &str) {
            fs::write(self.0.join(name), content).unwrap();
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_load_scripts_by_bike_id() {
        let dir = ScratchDir::new("scripts");
        dir.write(
            "7.json",
            r#"{"trips": [{"user": {"id": 1, "token": "t"}, "coords": [[13.5, 59.4]]}]}"#,
        );
        dir.write("readme.txt", "not a script");

        let scripts = load_scripts(&dir.0).unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[&7].trips.len(), 1);
    }

    #[test]
    fn test_bad_script_is_skipped() {
        let dir = ScratchDir::new("bad");
        dir.write("1.json", "{ not json");
        dir.write("2.json", r#"{"trips": []}"#);

        let scripts = load_scripts(&dir.0).unwrap();
        assert!(!scripts.contains_key(&1));
        assert!(scripts.contains_key(&2));
    }

    #[test]
    fn test_good_route_ids_from_file_names() {
        let dir = ScratchDir::new("good");
        dir.write("3.json", "{}");
        dir.write("11.json", "{}");
        dir.write("notes.md", "");

        let ids = load_good_route_ids(&dir.0).unwrap();
        assert_eq!(ids, HashSet::from([3, 11]));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(load_scripts(Path::new("/nonexistent/spoke-routes")).is_err());
    }
}
