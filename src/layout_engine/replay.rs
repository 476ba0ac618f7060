//! Recording and replaying sessions line by line: the configuration as JSON
//! on the first line, then one [`Step`] per line in RON.
//!
//! The configuration line is JSON because `ron` cannot read back the
//! internally tagged `[[layouts]]` entries.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
#[cfg(test)]
use tempfile::NamedTempFile;
use tracing::debug;

use super::{LayoutEngine, LayoutEvent};
use crate::common::config::Config;
use crate::ipc::{self, ArborRequest, ArborResponse};
use crate::sys::backend::Core;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Event(LayoutEvent),
    Request(ArborRequest),
}

pub struct Record {
    file: Option<File>,
    #[cfg(test)]
    temp: Option<NamedTempFile>,
}

impl Record {
    pub fn new(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = path
            .map(|path| File::create(path).with_context(|| format!("creating {}", path.display())))
            .transpose()?;
        Ok(Self {
            file,
            #[cfg(test)]
            temp: None,
        })
    }

    #[cfg(test)]
    pub fn new_for_test(temp: NamedTempFile) -> Self { Self { file: None, temp: Some(temp) } }

    fn file(&mut self) -> Option<&mut File> {
        #[cfg(test)]
        return self.file.as_mut().or(self.temp.as_mut().map(|temp| temp.as_file_mut()));
        #[cfg(not(test))]
        self.file.as_mut()
    }

    pub fn start(&mut self, config: &Config) -> anyhow::Result<()> {
        let Some(file) = self.file() else { return Ok(()) };
        writeln!(file, "{}", config_line(config)?)?;
        Ok(())
    }

    pub fn on_step(&mut self, step: &Step) -> anyhow::Result<()> {
        let Some(file) = self.file() else { return Ok(()) };
        let line = ron::ser::to_string(step)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Applies one step, returning the response for requests.
pub fn apply(engine: &mut LayoutEngine, core: &mut dyn Core, step: Step) -> Option<ArborResponse> {
    match step {
        Step::Event(event) => {
            engine.handle_event(event, core);
            None
        }
        Step::Request(request) => Some(ipc::handle_request(engine, core, request)),
    }
}

/// Runs a recorded session against `core`. Blank lines and lines starting
/// with `//` are skipped.
pub fn replay(
    path: &Path,
    core: &mut dyn Core,
    mut on_response: impl FnMut(&Step, &ArborResponse),
) -> anyhow::Result<LayoutEngine> {
    let file = BufReader::new(File::open(path)?);
    let mut lines = file
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !skip(l)));
    let (_, config) = lines.next().context("empty replay file")?;
    let config = parse_config_line(&config?)?;
    let mut engine = LayoutEngine::new(&config)?;
    for (number, line) in lines {
        let step: Step =
            ron::de::from_str(&line?).with_context(|| format!("line {}", number + 1))?;
        debug!(line = number + 1, ?step, "replaying");
        if let Some(response) = apply(&mut engine, core, step.clone()) {
            on_response(&step, &response);
        }
    }
    Ok(engine)
}

fn config_line(config: &Config) -> anyhow::Result<String> { Ok(serde_json::to_string(config)?) }

fn parse_config_line(line: &str) -> anyhow::Result<Config> {
    serde_json::from_str(line).context("reading the configuration line")
}

fn skip(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with("//")
}
