use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node of the command graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectPath {
    Root,
    /// A group by name; the group on the current screen when `None`.
    Group(Option<String>),
    /// A layout of a group by index; the group's current layout when `None`.
    Layout {
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        index: Option<usize>,
    },
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectPath::Root => f.write_str("root"),
            ObjectPath::Group(None) => f.write_str("group"),
            ObjectPath::Group(Some(name)) => write!(f, "group[{name}]"),
            ObjectPath::Layout { group, index } => {
                f.write_str("layout")?;
                if let Some(group) = group {
                    write!(f, "[{group}]")?;
                }
                if let Some(index) = index {
                    write!(f, "[{index}]")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ArborRequest {
    /// Invokes `command` on `object`. Positional `args` bind in parameter
    /// order, `kwargs` by name.
    Call {
        object: ObjectPath,
        command: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        kwargs: Map<String, Value>,
    },
    /// Lists the commands `object` answers to.
    Commands { object: ObjectPath },
    /// Signature and documentation of one command.
    Doc { object: ObjectPath, command: String },
}

impl ArborRequest {
    pub fn call(object: ObjectPath, command: impl Into<String>) -> Self {
        ArborRequest::Call {
            object,
            command: command.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_args(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        if let ArborRequest::Call { args, .. } = &mut self {
            args.extend(values);
        }
        self
    }

    pub fn with_kwarg(mut self, name: &str, value: Value) -> Self {
        if let ArborRequest::Call { kwargs, .. } = &mut self {
            kwargs.insert(name.to_owned(), value);
        }
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ArborResponse {
    Success { data: Value },
    Error { message: String },
}

impl ArborResponse {
    pub fn is_success(&self) -> bool { matches!(self, ArborResponse::Success { .. }) }
}
