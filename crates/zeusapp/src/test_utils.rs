use std::path::PathBuf;
use tempfile::TempDir;

use crate::api::ZeusApi;
use crate::init;
use crate::store::FieldMap;

pub struct TestEnv {
    // Kept so the directory is not dropped until the test is done.
    pub _temp_dir: TempDir,
    pub api: ZeusApi,
    pub root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let paths =
            init::initialize(temp_dir.path(), Some("test")).expect("failed to init project");
        let root = paths.root().to_path_buf();
        let api = ZeusApi::open(paths).expect("failed to open project");
        Self {
            _temp_dir: temp_dir,
            api,
            root,
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a field map from string pairs.
pub fn str_fields(pairs: &[(&str, &str)]) -> FieldMap {
    let mut map = FieldMap::new();
    for (k, v) in pairs {
        map.insert(
            serde_yaml::Value::String(k.to_string()),
            serde_yaml::Value::String(v.to_string()),
        );
    }
    map
}
