//! Campaign description files
//!
//! A campaign is a comment-tolerant JSON document describing one or more
//! named experiments, each holding the raw configuration consumed by the
//! parameter pipeline. Comments (`//` line and `/* */` block) are stripped
//! before parsing so campaign files can be annotated freely.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde_json::{json, Value};
use thiserror::Error;

use crate::schema::{self, CheckOptions, DiskAccess};

/// Raw, unvalidated configuration of one experiment: section name to
/// section content, plus top-level entries such as an explicit mote list.
pub type RawConfig = BTreeMap<String, Value>;

/// A parsed campaign: experiment name to raw configuration.
pub type Campaign = BTreeMap<String, RawConfig>;

/// Errors raised while loading or writing campaign files
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("campaign file does not exist: {0}")]
    NotFound(PathBuf),
    #[error("failed to read campaign file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse campaign JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid campaign skeleton template: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
    #[error("failed to render campaign skeleton: {0}")]
    Render(#[from] Box<handlebars::RenderError>),
}

/// Strip `//` line and `/* */` block comments from a JSON document.
///
/// String literals are left untouched, including escaped quotes, so values
/// containing `//` survive. Newlines inside block comments are preserved to
/// keep parse-error line numbers meaningful.
pub fn strip_comments(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Normal,
        InString,
        Escaped,
        LineComment,
        BlockComment,
    }

    let mut state = State::Normal;
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            State::Normal => match ch {
                '"' => {
                    state = State::InString;
                    out.push(ch);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                _ => out.push(ch),
            },
            State::InString => {
                out.push(ch);
                match ch {
                    '\\' => state = State::Escaped,
                    '"' => state = State::Normal,
                    _ => {}
                }
            }
            State::Escaped => {
                out.push(ch);
                state = State::InString;
            }
            State::LineComment => {
                if ch == '\n' {
                    out.push(ch);
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if ch == '\n' {
                    out.push(ch);
                } else if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                }
            }
        }
    }
    out
}

/// Resolve a campaign reference: bare names land in the campaign folder and
/// the `.json` extension is appended when missing.
pub fn campaign_path(dir: &Path, name: &str) -> PathBuf {
    let mut path = PathBuf::from(name);
    if path.parent() == Some(Path::new("")) {
        path = dir.join(path);
    }
    if path.extension().is_none() {
        path.set_extension("json");
    }
    path
}

/// Load and parse a campaign file.
///
/// A missing file is a distinct error so callers can surface a remediation
/// hint; no partial campaign is ever returned.
pub fn load_campaign(dir: &Path, name: &str) -> Result<Campaign, CampaignError> {
    let path = campaign_path(dir, name);
    if !path.exists() {
        return Err(CampaignError::NotFound(path));
    }
    let text = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&strip_comments(&text))?)
}

/// Parse probe: true when the file holds well-formed campaign JSON.
pub fn is_valid_campaign(path: &Path) -> bool {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => return false,
    };
    serde_json::from_str::<Campaign>(&strip_comments(&text)).is_ok()
}

/// Sorted basenames of the valid campaign files in `dir`.
pub fn list_campaigns(dir: &Path) -> io::Result<Vec<String>> {
    let mut campaigns = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_file() && name.ends_with(".json") && is_valid_campaign(&path) {
            campaigns.push(name);
        }
    }
    campaigns.sort();
    Ok(campaigns)
}

/// Sorted names of the experiment folders in `dir` whose structure conforms
/// to the canonical layout.
pub fn list_experiments(dir: &Path) -> io::Result<Vec<String>> {
    let structure = schema::experiment_structure();
    let mut access = DiskAccess;
    let mut experiments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if !path.is_dir() || name.starts_with('.') {
            continue;
        }
        let conforms = schema::check(&mut access, &path, &structure, CheckOptions::validate())
            .unwrap_or(false);
        if conforms {
            experiments.push(name);
        }
    }
    experiments.sort();
    Ok(experiments)
}

/// Name of the campaign skeleton template in the shared template folder.
pub const SKELETON_TEMPLATE: &str = "experiments.json";

/// Write a campaign skeleton to `dest`, listing the available building
/// blocks as a comment so users can tune their experiments from it.
pub fn write_campaign_skeleton(
    templates_dir: &Path,
    dest: &Path,
    blocks: &[String],
) -> Result<(), CampaignError> {
    let mut registry = Handlebars::new();
    registry
        .register_template_file(SKELETON_TEMPLATE, templates_dir.join(SKELETON_TEMPLATE))
        .map_err(Box::new)?;
    let listing = blocks
        .iter()
        .map(|block| format!(" - {block}"))
        .collect::<Vec<_>>()
        .join("\n");
    let rendered = registry
        .render(SKELETON_TEMPLATE, &json!({ "available_building_blocks": listing }))
        .map_err(Box::new)?;
    fs::write(dest, rendered)?;
    Ok(())
}
