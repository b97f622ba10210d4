//!
//! # Output Handlers
//!
//! Lists render either as a table or serialized as json or yaml.
//!
use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Row, Table};
use serde::Serialize;

#[derive(ValueEnum, Debug, Clone, Copy, Default, Eq, PartialEq)]
#[allow(non_camel_case_types)]
pub enum OutputType {
    #[default]
    table,
    yaml,
    json,
}

impl OutputType {
    pub fn is_table(&self) -> bool {
        *self == OutputType::table
    }
}

pub trait TableOutputHandler {
    fn header(&self) -> Row;
    fn content(&self) -> Vec<Row>;
}

/// Render `list` in the requested mode
pub fn render_list<T>(list: &T, mode: OutputType) -> Result<String>
where
    T: TableOutputHandler + Serialize,
{
    let rendered = match mode {
        OutputType::table => render_table(list),
        OutputType::json => serde_json::to_string_pretty(list)?,
        OutputType::yaml => serde_yaml::to_string(list)?,
    };
    Ok(rendered)
}

fn render_table<T: TableOutputHandler>(list: &T) -> String {
    let content = list.content();
    if content.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.set_header(list.header());
    for row in content {
        table.add_row(row);
    }
    table.load_preset(comfy_table::presets::NOTHING);
    table.to_string()
}
