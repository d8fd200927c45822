//! tempo init command implementation
//!
//! Creates the `.tempo/` data directory, an empty event log, and a default
//! `.tempo.toml` configuration.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    data_dir: bool,
    config: bool,
}

pub fn run(start: PathBuf, options: OutputOptions) -> Result<()> {
    let storage = Storage::new(&start);

    let created_data_dir = !storage.is_initialized();
    storage.init()?;

    let config_path = storage.config_file();
    let created_config = !config_path.exists();
    if created_config {
        crate::lock::write_atomic(&config_path, Config::default_toml()?.as_bytes())?;
    }

    let report = InitReport {
        root: start.clone(),
        created: InitCreated {
            data_dir: created_data_dir,
            config: created_config,
        },
    };

    let mut created_items = Vec::new();
    if created_data_dir {
        created_items.push(".tempo/");
    }
    if created_config {
        created_items.push(".tempo.toml");
    }

    let header = if created_items.is_empty() {
        "tempo init: nothing to do".to_string()
    } else {
        "tempo init: initialized".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", start.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );

    emit_success(options, "init", &report, Some(&human))
}
