//! `topology`: list the controls of a floor-plan document.

use serde::Serialize;
use tabled::Tabled;

use floorsync_config::{Topology, config_path};

use crate::cli::{GlobalOpts, TopologyArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ControlInfo {
    map: usize,
    image: String,
    kind: String,
    address: String,
    name: Option<String>,
    field: Option<&'static str>,
}

#[derive(Tabled)]
struct ControlRow {
    #[tabled(rename = "Map")]
    map: usize,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Field")]
    field: String,
}

impl From<&ControlInfo> for ControlRow {
    fn from(c: &ControlInfo) -> Self {
        Self {
            map: c.map,
            kind: c.kind.clone(),
            address: c.address.clone(),
            name: c.name.clone().unwrap_or_default(),
            field: c.field.unwrap_or("-").to_owned(),
        }
    }
}

pub fn handle(args: TopologyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = match args.file {
        Some(path) => path,
        None => crate::load_config(global)?
            .topology
            .ok_or_else(|| CliError::NoTopology {
                path: config_path().display().to_string(),
            })?,
    };
    let topology = Topology::load(&path)?;

    let controls: Vec<ControlInfo> = topology
        .maps
        .iter()
        .enumerate()
        .flat_map(|(index, map)| {
            map.controls.iter().map(move |control| ControlInfo {
                map: index,
                image: map.imgsrc.primary().to_owned(),
                kind: control.kind.to_string(),
                address: control.label(),
                name: control.name.clone(),
                field: control.kind.state_field(),
            })
        })
        .collect();

    let rendered = output::render_list(
        &global.output,
        &controls,
        |c| ControlRow::from(c),
        |c| c.address.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
