//! File-backed template library for prompts, intro messages and images.
//!
//! The resources directory contains:
//! - `prompts/<id>.txt`: oracle instructions (system prompt per mode/persona)
//! - `messages/<id>.txt`: intro text shown when a mode is entered
//! - `images/<id>.jpg`: optional photo shown alongside

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::TemplateError;

/// Well-known subdirectories of the resources root.
pub mod dirs {
    pub const PROMPTS: &str = "prompts";
    pub const MESSAGES: &str = "messages";
    pub const IMAGES: &str = "images";
}

const TEXT_EXT: &str = "txt";
const IMAGE_EXT: &str = "jpg";

/// In-memory template library, loaded once at startup.
#[derive(Debug, Default, Clone)]
pub struct TemplateLibrary {
    prompts: HashMap<String, String>,
    messages: HashMap<String, String>,
    images: HashMap<String, PathBuf>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all templates under `root`. Missing subdirectories are tolerated.
    pub async fn load(root: &Path) -> Result<Self, TemplateError> {
        if !root.is_dir() {
            return Err(TemplateError::RootNotFound(root.display().to_string()));
        }

        let mut library = Self::new();
        for (id, path) in scan(&root.join(dirs::PROMPTS), TEXT_EXT).await? {
            library.prompts.insert(id, fs::read_to_string(&path).await?);
        }
        for (id, path) in scan(&root.join(dirs::MESSAGES), TEXT_EXT).await? {
            library.messages.insert(id, fs::read_to_string(&path).await?);
        }
        library.images = scan(&root.join(dirs::IMAGES), IMAGE_EXT)
            .await?
            .into_iter()
            .collect();

        tracing::info!(
            prompts = library.prompts.len(),
            messages = library.messages.len(),
            images = library.images.len(),
            root = %root.display(),
            "Templates loaded"
        );
        Ok(library)
    }

    pub fn with_prompt(mut self, id: &str, text: &str) -> Self {
        self.prompts.insert(id.to_string(), text.to_string());
        self
    }

    pub fn with_message(mut self, id: &str, text: &str) -> Self {
        self.messages.insert(id.to_string(), text.to_string());
        self
    }

    pub fn with_image(mut self, id: &str, path: PathBuf) -> Self {
        self.images.insert(id.to_string(), path);
        self
    }

    pub fn prompt(&self, id: &str) -> Option<&str> {
        self.prompts.get(id).map(String::as_str)
    }

    pub fn message(&self, id: &str) -> Option<&str> {
        self.messages.get(id).map(String::as_str)
    }

    /// Path of the image for `id`, if one was found at load time.
    pub fn image(&self, id: &str) -> Option<&Path> {
        self.images.get(id).map(PathBuf::as_path)
    }
}

/// List `(stem, path)` for files in `dir` with extension `ext`.
async fn scan(dir: &Path, ext: &str) -> Result<Vec<(String, PathBuf)>, TemplateError> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "Template directory missing, skipping");
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ext) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            found.push((stem.to_string(), path.clone()));
        }
    }
    Ok(found)
}
