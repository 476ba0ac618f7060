use std::path::{Path, PathBuf};

use anyhow::bail;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::collections::HashSet;

pub fn data_dir() -> PathBuf { dirs::home_dir().unwrap_or_default().join(".arbor") }
pub fn restore_file() -> PathBuf { data_dir().join("layout.ron") }
pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".config"))
        .join("arbor")
        .join("config.toml")
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "yes")]
    pub auto_fullscreen: bool,
    #[serde(default = "no")]
    pub focus_previous_on_window_remove: bool,
    #[serde(default = "no")]
    pub cursor_warp: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_fullscreen: true,
            focus_previous_on_window_remove: false,
            cursor_warp: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    #[default]
    Normal,
    /// Hidden from group cycling; meant for drop-down windows.
    ScratchPad,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Name of the layout the group starts with.
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub kind: GroupKind,
    #[serde(default)]
    pub screen_affinity: Option<usize>,
    #[serde(default = "yes")]
    pub persist: bool,
}

impl GroupConfig {
    pub fn named(name: impl Into<String>) -> Self {
        GroupConfig {
            name: name.into(),
            label: None,
            layout: None,
            kind: GroupKind::Normal,
            screen_affinity: None,
            persist: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutConfig {
    TreeTab(TreeTabSettings),
    Max(MaxSettings),
}

impl LayoutConfig {
    /// The name groups and commands refer to the layout by.
    pub fn name(&self) -> &'static str {
        match self {
            LayoutConfig::TreeTab(_) => "treetab",
            LayoutConfig::Max(_) => "max",
        }
    }

    pub fn validate(&self) -> Vec<String> {
        match self {
            LayoutConfig::TreeTab(s) => s.validate(),
            LayoutConfig::Max(s) => s.validate(),
        }
    }
}

/// Theme and behaviour of the tree-tab layout. Colors are `rrggbb` hex.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct TreeTabSettings {
    pub font: String,
    pub fontsize: i32,
    pub section_fontsize: i32,
    pub section_fg: String,
    pub section_top: i32,
    pub section_bottom: i32,
    pub section_padding: i32,
    pub section_left: i32,
    pub padding_left: i32,
    pub padding_x: i32,
    pub padding_y: i32,
    pub border_width: i32,
    pub vspace: i32,
    pub level_shift: i32,
    pub panel_width: i32,
    pub bg_color: String,
    pub active_bg: String,
    pub active_fg: String,
    pub inactive_bg: String,
    pub inactive_fg: String,
    pub urgent_bg: String,
    pub urgent_fg: String,
    /// Initial sections, in display order.
    pub sections: Vec<String>,
    /// Where windows without a preferred section go; the first section if unset.
    pub default_section: Option<String>,
    /// Focus the previous window in the tree when the focused one is removed.
    pub previous_on_rm: bool,
    pub place_right: bool,
}

impl Default for TreeTabSettings {
    fn default() -> Self {
        TreeTabSettings {
            font: "sans".into(),
            fontsize: 14,
            section_fontsize: 11,
            section_fg: "ffffff".into(),
            section_top: 4,
            section_bottom: 6,
            section_padding: 4,
            section_left: 4,
            padding_left: 6,
            padding_x: 6,
            padding_y: 2,
            border_width: 2,
            vspace: 2,
            level_shift: 8,
            panel_width: 150,
            bg_color: "000000".into(),
            active_bg: "000080".into(),
            active_fg: "ffffff".into(),
            inactive_bg: "606060".into(),
            inactive_fg: "ffffff".into(),
            urgent_bg: "ff0000".into(),
            urgent_fg: "ffffff".into(),
            sections: vec!["Default".into()],
            default_section: None,
            previous_on_rm: false,
            place_right: false,
        }
    }
}

fn is_hex_color(c: &str) -> bool {
    let c = c.strip_prefix('#').unwrap_or(c);
    matches!(c.len(), 3 | 6 | 8) && c.chars().all(|ch| ch.is_ascii_hexdigit())
}

impl TreeTabSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.panel_width <= 0 {
            issues.push(format!("tree_tab: panel_width must be positive, got {}", self.panel_width));
        }
        if self.fontsize <= 0 || self.section_fontsize <= 0 {
            issues.push("tree_tab: font sizes must be positive".to_string());
        }
        if self.sections.is_empty() {
            issues.push("tree_tab: at least one section is required".to_string());
        }
        let mut seen = HashSet::default();
        for section in &self.sections {
            if !seen.insert(section.as_str()) {
                issues.push(format!("tree_tab: duplicate section {section:?}"));
            }
        }
        if let Some(default) = &self.default_section {
            if !self.sections.contains(default) {
                issues.push(format!(
                    "tree_tab: default_section {default:?} is not one of the sections"
                ));
            }
        }
        for (field, color) in [
            ("bg_color", &self.bg_color),
            ("section_fg", &self.section_fg),
            ("active_bg", &self.active_bg),
            ("active_fg", &self.active_fg),
            ("inactive_bg", &self.inactive_bg),
            ("inactive_fg", &self.inactive_fg),
            ("urgent_bg", &self.urgent_bg),
            ("urgent_fg", &self.urgent_fg),
        ] {
            if !is_hex_color(color) {
                issues.push(format!("tree_tab: {field} {color:?} is not a hex color"));
            }
        }

        issues
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields, default)]
pub struct MaxSettings {
    pub border_width: i32,
    pub margin: i32,
}

impl MaxSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.border_width < 0 || self.margin < 0 {
            issues.push("max: border_width and margin must not be negative".to_string());
        }
        issues
    }
}

/// Matches windows that should float as soon as they are managed. Every
/// field that is set has to match.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct FloatRule {
    #[serde(default)]
    pub wm_class: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub title_regex: Option<String>,
    #[serde(default)]
    pub title_substring: Option<String>,
}

impl FloatRule {
    pub fn is_empty(&self) -> bool {
        self.wm_class.is_none()
            && self.role.is_none()
            && self.title_regex.is_none()
            && self.title_substring.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct FloatingConfig {
    #[serde(default = "default_float_border")]
    pub border_width: i32,
    #[serde(default)]
    pub fullscreen_border_width: i32,
    #[serde(default)]
    pub rules: Vec<FloatRule>,
}

impl Default for FloatingConfig {
    fn default() -> Self {
        FloatingConfig {
            border_width: default_float_border(),
            fullscreen_border_width: 0,
            rules: Vec::new(),
        }
    }
}

impl FloatingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.border_width < 0 || self.fullscreen_border_width < 0 {
            issues.push("floating: border widths must not be negative".to_string());
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.is_empty() {
                issues.push(format!("floating: rule {i} matches nothing"));
            }
            if let Some(re) = &rule.title_regex {
                if let Err(e) = Regex::new(re) {
                    issues.push(format!("floating: rule {i} has an invalid title_regex: {e}"));
                }
            }
        }
        issues
    }
}

fn yes() -> bool { true }

fn no() -> bool { false }

fn default_float_border() -> i32 { 1 }

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub layouts: Vec<LayoutConfig>,
    #[serde(default)]
    pub floating: FloatingConfig,
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Config {
        Self::parse(include_str!("../../arbor.default.toml"))
            .unwrap_or_else(|e| panic!("built-in configuration is invalid: {e}"))
    }

    /// Save the current config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;

        Ok(())
    }

    pub fn layout_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.layouts.iter().map(LayoutConfig::name)
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.groups.is_empty() {
            issues.push("at least one group is required".to_string());
        }
        if self.layouts.is_empty() {
            issues.push("at least one layout is required".to_string());
        }

        let mut names = HashSet::default();
        for group in &self.groups {
            if group.name.is_empty() {
                issues.push("group names must not be empty".to_string());
            }
            if !names.insert(group.name.as_str()) {
                issues.push(format!("duplicate group {:?}", group.name));
            }
            if let Some(layout) = &group.layout {
                if !self.layout_names().any(|n| n == layout) {
                    issues.push(format!(
                        "group {:?} starts with unknown layout {layout:?}",
                        group.name
                    ));
                }
            }
        }

        let mut layouts = HashSet::default();
        for layout in &self.layouts {
            if !layouts.insert(layout.name()) {
                issues.push(format!("layout {:?} is configured twice", layout.name()));
            }
            issues.extend(layout.validate());
        }

        issues.extend(self.floating.validate());

        issues
    }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(c) => Ok(c),
            Err(e) => {
                let msg = e.to_string();
                match Self::suggest(&msg) {
                    Some(suggestion) => bail!("{msg}\nDid you mean `{suggestion}`?"),
                    None => bail!("{msg}"),
                }
            }
        }
    }

    /// For "unknown variant/field `x`, expected ..." errors, picks the closest
    /// expected name.
    fn suggest(err: &str) -> Option<String> {
        let start = err.find("unknown variant").or_else(|| err.find("unknown field"))?;
        let mut tokens = err[start..].split('`').skip(1).step_by(2);
        let unknown = tokens.next()?.to_lowercase();
        let (best, dist) = tokens
            .map(|cand| (cand, Self::levenshtein(&unknown, &cand.to_lowercase())))
            .min_by_key(|&(_, d)| d)?;
        (dist <= 3.max(best.len() / 2)).then(|| best.to_string())
    }

    fn levenshtein(a: &str, b: &str) -> usize {
        let b: Vec<char> = b.chars().collect();
        let mut prev: Vec<usize> = (0..=b.len()).collect();
        let mut cur = vec![0; b.len() + 1];
        for (i, ca) in a.chars().enumerate() {
            cur[0] = i + 1;
            for (j, &cb) in b.iter().enumerate() {
                let cost = usize::from(ca != cb);
                cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
            }
            std::mem::swap(&mut prev, &mut cur);
        }
        prev[b.len()]
    }
}
