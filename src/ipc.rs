//! The in-process command graph: root, groups and layouts, each with a
//! static command table, invoked through [`ArborRequest`].

pub mod commands;
pub mod protocol;

pub use protocol::{ArborRequest, ArborResponse, ObjectPath};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use self::commands::{
    CommandError, CommandSpec, GROUP_COMMANDS, GroupCommand, LayoutSelector, ROOT_COMMANDS,
    RootCommand,
};
use crate::common::config::GroupConfig;
use crate::layout_engine::{LayoutCommand, LayoutEngine, LayoutSystem};
use crate::model::group::Group;
use crate::sys::backend::Core;

pub fn handle_request(
    engine: &mut LayoutEngine,
    core: &mut dyn Core,
    request: ArborRequest,
) -> ArborResponse {
    debug!(?request, "handling request");
    let result = match request {
        ArborRequest::Call { object, command, args, kwargs } => {
            call(engine, core, &object, &command, args, kwargs)
        }
        ArborRequest::Commands { object } => command_table(engine, &object)
            .map(|table| json!(table.iter().map(|c| c.name).collect::<Vec<_>>())),
        ArborRequest::Doc { object, command } => command_table(engine, &object).and_then(|table| {
            let spec = find(table, &object, &command)?;
            Ok(json!(format!("{}\n\n{}", spec.signature(), spec.doc)))
        }),
    };
    match result {
        Ok(data) => ArborResponse::Success { data },
        Err(e) => {
            warn!("request failed: {e}");
            ArborResponse::Error { message: e.to_string() }
        }
    }
}

fn resolve_group<'a>(
    engine: &'a LayoutEngine,
    object: &ObjectPath,
    name: Option<&str>,
) -> Result<&'a Group, CommandError> {
    let group = match name {
        Some(name) => engine.group(name),
        None => engine.current_group(),
    };
    group.ok_or_else(|| CommandError::NoSuchObject(object.to_string()))
}

fn command_table(
    engine: &LayoutEngine,
    object: &ObjectPath,
) -> Result<&'static [CommandSpec], CommandError> {
    Ok(match object {
        ObjectPath::Root => ROOT_COMMANDS,
        ObjectPath::Group(name) => {
            resolve_group(engine, object, name.as_deref())?;
            GROUP_COMMANDS
        }
        ObjectPath::Layout { group, index } => {
            let group = resolve_group(engine, object, group.as_deref())?;
            let layout = group
                .layout_at(*index)
                .map_err(|_| CommandError::NoSuchObject(object.to_string()))?;
            layout.commands()
        }
    })
}

fn find<'a>(
    table: &'a [CommandSpec],
    object: &ObjectPath,
    command: &str,
) -> Result<&'a CommandSpec, CommandError> {
    commands::find(table, command).ok_or_else(|| CommandError::UnknownCommand {
        object: object.to_string(),
        command: command.to_owned(),
    })
}

fn call(
    engine: &mut LayoutEngine,
    core: &mut dyn Core,
    object: &ObjectPath,
    command: &str,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
) -> Result<Value, CommandError> {
    let spec = find(command_table(engine, object)?, object, command)?;
    match object {
        ObjectPath::Root => root_command(engine, core, commands::parse(spec, args, kwargs)?),
        ObjectPath::Group(name) => {
            let name = resolve_group(engine, object, name.as_deref())?.name().to_owned();
            group_command(engine, core, &name, commands::parse(spec, args, kwargs)?)
        }
        ObjectPath::Layout { group, index } => {
            let name = resolve_group(engine, object, group.as_deref())?.name().to_owned();
            let group = engine
                .group_mut(&name)
                .ok_or_else(|| CommandError::NoSuchObject(object.to_string()))?;
            if spec.name == "info" {
                commands::bind(spec, args, kwargs)?;
                return Ok(group.layout_info(*index)?);
            }
            let command: LayoutCommand = commands::parse(spec, args, kwargs)?;
            group.handle_layout_command(*index, command, core)?;
            Ok(Value::Null)
        }
    }
}

fn root_command(
    engine: &mut LayoutEngine,
    core: &mut dyn Core,
    command: RootCommand,
) -> Result<Value, CommandError> {
    match command {
        RootCommand::GetGroups => return Ok(engine.get_groups()),
        RootCommand::NextLayout { name } => engine.next_layout(name.as_deref(), core)?,
        RootCommand::PrevLayout { name } => engine.prev_layout(name.as_deref(), core)?,
        RootCommand::NextGroup { skip_empty, skip_managed } => {
            engine.next_group(skip_empty, skip_managed, core)
        }
        RootCommand::PrevGroup { skip_empty, skip_managed } => {
            engine.prev_group(skip_empty, skip_managed, core)
        }
        RootCommand::AddGroup { name, label, layout, persist } => {
            let config = GroupConfig { label, layout, persist, ..GroupConfig::named(name) };
            engine.add_group(config, core)?
        }
        RootCommand::DelGroup { name } => engine.del_group(&name, core)?,
        RootCommand::ToggleFloating => engine.toggle_floating(core)?,
        RootCommand::Togroup { group_name, switch_group } => {
            engine.togroup(&group_name, switch_group, core)?
        }
    }
    Ok(Value::Null)
}

fn group_command(
    engine: &mut LayoutEngine,
    core: &mut dyn Core,
    name: &str,
    command: GroupCommand,
) -> Result<Value, CommandError> {
    // Commands that reach beyond the group itself.
    match &command {
        GroupCommand::Toscreen { screen, toggle } => {
            engine.toscreen(name, *screen, *toggle, core)?;
            return Ok(Value::Null);
        }
        GroupCommand::SwitchGroups { name: other } => {
            engine.switch_groups(name, other, core)?;
            return Ok(Value::Null);
        }
        _ => {}
    }

    let group = engine
        .group_mut(name)
        .ok_or_else(|| CommandError::NoSuchObject(format!("group[{name}]")))?;
    match command {
        GroupCommand::Info => return Ok(group.info()),
        GroupCommand::InfoByName { name } => return Ok(json!(group.info_by_name(&name))),
        GroupCommand::Setlayout { layout: LayoutSelector::Index(index) } => {
            group.use_layout(index, core)?
        }
        GroupCommand::Setlayout { layout: LayoutSelector::Name(layout) } => {
            group.set_layout_by_name(&layout, core)
        }
        GroupCommand::UnminimizeAll => group.unminimize_all(core),
        GroupCommand::NextWindow => group.next_window(core),
        GroupCommand::PrevWindow => group.prev_window(core),
        GroupCommand::FocusBack => group.focus_back(core),
        GroupCommand::FocusByName { name } => group.focus_by_name(&name, core),
        GroupCommand::FocusByIndex { index } => group.focus_by_index(index, core),
        GroupCommand::SwapWindowOrder { new_location } => group.swap_window_order(new_location),
        GroupCommand::SetLabel { label } => group.set_label(label, core),
        GroupCommand::Toscreen { .. } | GroupCommand::SwitchGroups { .. } => {}
    }
    Ok(Value::Null)
}
