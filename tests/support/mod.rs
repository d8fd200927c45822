#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

use tempo::config::Config;
use tempo::storage::Storage;
use tempo::store::{NewMilestone, NewProject, NewTask, OpenReport, Store};

/// A temporary directory with an initialized `.tempo/` data dir.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create tempdir");
        let this = Self { dir };
        this.storage().init().expect("failed to init storage");
        this
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage(&self) -> Storage {
        Storage::new(self.dir.path())
    }

    pub fn open_store(&self) -> Store {
        self.open_store_with(Config::default()).0
    }

    pub fn open_store_with(&self, config: Config) -> (Store, OpenReport) {
        Store::open(&self.storage(), config).expect("failed to open store")
    }

    pub fn write_config(&self, contents: &str) {
        std::fs::write(self.storage().config_file(), contents).expect("failed to write config");
    }

    pub fn events_file(&self) -> std::path::PathBuf {
        self.storage().events_file()
    }

    pub fn snapshot_file(&self) -> std::path::PathBuf {
        self.storage().snapshot_file()
    }
}

/// A `tempo` binary invocation rooted at the test directory.
pub fn tempo_cmd(dir: &TestDir) -> Command {
    let mut cmd = Command::cargo_bin("tempo").expect("tempo binary");
    cmd.current_dir(dir.path());
    cmd
}

/// Create a project, a milestone inside it, and `points`-sized tasks inside
/// the milestone. Returns (project id, milestone id, task ids).
pub fn seed_hierarchy(store: &Store, points: &[f64]) -> (String, String, Vec<String>) {
    let project = store
        .create_project(NewProject {
            title: "Project".to_string(),
            description: None,
        })
        .expect("create project");
    let milestone = store
        .create_milestone(
            &project.id,
            NewMilestone {
                title: "Milestone".to_string(),
                ..Default::default()
            },
        )
        .expect("create milestone");
    let tasks = points
        .iter()
        .enumerate()
        .map(|(index, points)| {
            store
                .create_task(
                    &milestone.id,
                    NewTask {
                        title: format!("Task {index}"),
                        estimated_points: *points,
                        ..Default::default()
                    },
                )
                .expect("create task")
                .id
        })
        .collect();
    (project.id, milestone.id, tasks)
}
