//! Static command tables for every object in the command graph, and the
//! binding of positional/keyword arguments onto them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::layout_engine::{EngineError, LayoutError};

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub doc: &'static str,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub params: &'static [ParamSpec],
    pub doc: &'static str,
}

impl CommandSpec {
    pub fn answers_to(&self, name: &str) -> bool { self.name == name || self.aliases.contains(&name) }

    /// One-line signature, e.g. `focus_by_name(name)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| if p.required { p.name.to_string() } else { format!("{}=?", p.name) })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

const fn cmd(name: &'static str, params: &'static [ParamSpec], doc: &'static str) -> CommandSpec {
    CommandSpec { name, aliases: &[], params, doc }
}

const fn req(name: &'static str, doc: &'static str) -> ParamSpec {
    ParamSpec { name, required: true, doc }
}

const fn opt(name: &'static str, doc: &'static str) -> ParamSpec {
    ParamSpec { name, required: false, doc }
}

const SKIP_FLAGS: &[ParamSpec] = &[
    opt("skip_empty", "Skip groups without windows."),
    opt("skip_managed", "Skip groups shown on a screen."),
];

pub static ROOT_COMMANDS: &[CommandSpec] = &[
    cmd("get_groups", &[], "Info for every group, keyed by name."),
    cmd("next_layout", &[opt("name", "Group to act on.")], "Switch the group to its next layout."),
    cmd("prev_layout", &[opt("name", "Group to act on.")], "Switch the group to its previous layout."),
    cmd("next_group", SKIP_FLAGS, "Show the next group on the current screen."),
    cmd("prev_group", SKIP_FLAGS, "Show the previous group on the current screen."),
    cmd(
        "add_group",
        &[
            req("name", "Name of the new group."),
            opt("label", "Label shown for the group."),
            opt("layout", "Layout the group starts with."),
            opt("persist", "Keep the group once it is empty."),
        ],
        "Create a new group.",
    ),
    cmd(
        "del_group",
        &[req("name", "Group to delete.")],
        "Delete a group, moving its windows to a neighbouring group.",
    ),
    cmd("toggle_floating", &[], "Float or tile the focused window."),
    cmd(
        "togroup",
        &[
            req("group_name", "Destination group."),
            opt("switch_group", "Also show the destination group."),
        ],
        "Move the focused window to another group.",
    ),
];

pub static GROUP_COMMANDS: &[CommandSpec] = &[
    cmd("info", &[], "Group state as a map."),
    cmd("setlayout", &[req("layout", "Layout name or index.")], "Switch to a layout."),
    cmd(
        "toscreen",
        &[
            opt("screen", "Screen index; the current screen if omitted."),
            opt("toggle", "Show the previous group if this one is already there."),
        ],
        "Show this group on a screen.",
    ),
    cmd("unminimize_all", &[], "Restore every minimized window."),
    cmd("next_window", &[], "Focus the next window."),
    cmd("prev_window", &[], "Focus the previous window."),
    cmd("focus_back", &[], "Focus the window that had focus before the current one."),
    cmd("focus_by_name", &[req("name", "Window name.")], "Focus the first window with that name."),
    cmd("info_by_name", &[req("name", "Window name.")], "Info for the first window with that name."),
    cmd("focus_by_index", &[req("index", "Position in the group.")], "Focus a window by position."),
    cmd(
        "swap_window_order",
        &[req("new_location", "Position to swap the focused window with.")],
        "Swap the focused window with another position.",
    ),
    cmd(
        "switch_groups",
        &[req("name", "The other group.")],
        "Swap screens with another group.",
    ),
    cmd("set_label", &[req("label", "New label; null resets it.")], "Set the displayed label."),
];

pub static TREE_TAB_COMMANDS: &[CommandSpec] = &[
    cmd("info", &[], "Layout state as a map."),
    CommandSpec {
        name: "next",
        aliases: &["down"],
        params: &[],
        doc: "Focus the next window in the tree.",
    },
    CommandSpec {
        name: "previous",
        aliases: &["up"],
        params: &[],
        doc: "Focus the previous window in the tree.",
    },
    cmd("move_up", &[], "Swap the focused window with the one above it."),
    cmd("move_down", &[], "Swap the focused window with the one below it."),
    cmd("move_left", &[], "Move the focused window one level out."),
    cmd("move_right", &[], "Nest the focused window under the one above it."),
    cmd("add_section", &[req("name", "Section title.")], "Append a section."),
    cmd("del_section", &[req("name", "Section title.")], "Delete a section, keeping its windows."),
    cmd("section_up", &[], "Move the focused window to the section above."),
    cmd("section_down", &[], "Move the focused window to the section below."),
    cmd(
        "sort_windows",
        &[
            req("rules", "List of {title_regex | wm_class, section} rules."),
            opt("create_sections", "Create sections that do not exist yet."),
        ],
        "File top-level windows into sections by rule.",
    ),
    cmd("expand_branch", &[], "Show the children of the focused window."),
    cmd("collapse_branch", &[], "Hide the children of the focused window."),
    cmd("increase_ratio", &[], "Widen the panel."),
    cmd("decrease_ratio", &[], "Narrow the panel."),
];

pub static MAX_COMMANDS: &[CommandSpec] = &[
    cmd("info", &[], "Layout state as a map."),
    cmd("next", &[], "Focus the next window."),
    cmd("previous", &[], "Focus the previous window."),
];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("No such object: {0}")]
    NoSuchObject(String),
    #[error("{object} has no command {command:?}")]
    UnknownCommand { object: String, command: String },
    #[error("{command}() got an unexpected argument {name:?}")]
    UnknownArgument { command: &'static str, name: String },
    #[error("{command}() got multiple values for {name:?}")]
    DuplicateArgument { command: &'static str, name: &'static str },
    #[error("{command}() is missing required argument {name:?}")]
    MissingArgument { command: &'static str, name: &'static str },
    #[error("{command}() takes at most {max} arguments ({given} given)")]
    TooManyArguments {
        command: &'static str,
        max: usize,
        given: usize,
    },
    #[error("{command}(): {message}")]
    InvalidArgument { command: &'static str, message: String },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub fn find<'a>(table: &'a [CommandSpec], name: &str) -> Option<&'a CommandSpec> {
    table.iter().find(|c| c.answers_to(name))
}

/// Binds `args` and `kwargs` onto the parameter list of `spec`.
///
/// Optional parameters that were not given are left out of the map so the
/// command type's serde defaults apply.
pub fn bind(
    spec: &CommandSpec,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
) -> Result<Map<String, Value>, CommandError> {
    if args.len() > spec.params.len() {
        return Err(CommandError::TooManyArguments {
            command: spec.name,
            max: spec.params.len(),
            given: args.len(),
        });
    }
    let mut bound = Map::new();
    for (param, value) in spec.params.iter().zip(args) {
        bound.insert(param.name.to_string(), value);
    }
    for (name, value) in kwargs {
        let Some(param) = spec.params.iter().find(|p| p.name == name) else {
            return Err(CommandError::UnknownArgument { command: spec.name, name });
        };
        if bound.insert(name, value).is_some() {
            return Err(CommandError::DuplicateArgument { command: spec.name, name: param.name });
        }
    }
    if let Some(missing) = spec.params.iter().find(|p| p.required && !bound.contains_key(p.name)) {
        return Err(CommandError::MissingArgument { command: spec.name, name: missing.name });
    }
    Ok(bound)
}

/// Binds the arguments and decodes them into a command enum tagged by
/// `command`.
pub fn parse<T: DeserializeOwned>(
    spec: &CommandSpec,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
) -> Result<T, CommandError> {
    let mut bound = bind(spec, args, kwargs)?;
    bound.insert("command".into(), Value::String(spec.name.into()));
    serde_json::from_value(Value::Object(bound)).map_err(|e| CommandError::InvalidArgument {
        command: spec.name,
        message: e.to_string(),
    })
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum LayoutSelector {
    Index(i64),
    Name(String),
}

fn no() -> bool { false }

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum GroupCommand {
    Info,
    Setlayout {
        layout: LayoutSelector,
    },
    Toscreen {
        #[serde(default)]
        screen: Option<usize>,
        #[serde(default = "no")]
        toggle: bool,
    },
    UnminimizeAll,
    NextWindow,
    PrevWindow,
    FocusBack,
    FocusByName {
        name: String,
    },
    InfoByName {
        name: String,
    },
    FocusByIndex {
        index: usize,
    },
    SwapWindowOrder {
        new_location: usize,
    },
    SwitchGroups {
        name: String,
    },
    SetLabel {
        label: Option<String>,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RootCommand {
    GetGroups,
    NextLayout {
        #[serde(default)]
        name: Option<String>,
    },
    PrevLayout {
        #[serde(default)]
        name: Option<String>,
    },
    NextGroup {
        #[serde(default = "no")]
        skip_empty: bool,
        #[serde(default = "no")]
        skip_managed: bool,
    },
    PrevGroup {
        #[serde(default = "no")]
        skip_empty: bool,
        #[serde(default = "no")]
        skip_managed: bool,
    },
    AddGroup {
        name: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        layout: Option<String>,
        #[serde(default = "yes")]
        persist: bool,
    },
    DelGroup {
        name: String,
    },
    ToggleFloating,
    Togroup {
        group_name: String,
        #[serde(default = "no")]
        switch_group: bool,
    },
}

fn yes() -> bool { true }
