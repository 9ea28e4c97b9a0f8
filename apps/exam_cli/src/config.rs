use std::{collections::HashMap, env, fs};

const CONFIG_FILE: &str = "exam-archive.toml";

#[derive(Debug)]
pub struct Settings {
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/".into(),
            token: None,
        }
    }
}

/// Defaults, then the config file, then environment overrides.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(CONFIG_FILE) {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = env::var("EXAM_ARCHIVE_BASE_URL") {
        settings.base_url = v;
    }
    if let Ok(v) = env::var("EXAM_ARCHIVE_TOKEN") {
        settings.token = Some(v);
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
        if let Some(v) = file_cfg.get("base_url") {
            settings.base_url = v.clone();
        }
        if let Some(v) = file_cfg.get("token") {
            settings.token = Some(v.clone());
        }
    }
}
