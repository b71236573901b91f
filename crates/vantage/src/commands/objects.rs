//! Object listing and state inspection.

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use vantage_core::{SystemObject, Value, Vantage, Vid};

use crate::cli::{GetArgs, GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ObjectSummary {
    vid: Vid,
    #[serde(rename = "type")]
    type_name: String,
    name: String,
    parent: Option<Vid>,
    interfaces: Vec<&'static str>,
}

impl From<&SystemObject> for ObjectSummary {
    fn from(object: &SystemObject) -> Self {
        Self {
            vid: object.vid(),
            type_name: object.type_name().to_owned(),
            name: object.name().to_owned(),
            parent: object.parent(),
            interfaces: object.interface_names(),
        }
    }
}

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "VID")]
    vid: u32,
    #[tabled(rename = "Type")]
    type_name: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Parent")]
    parent: String,
    #[tabled(rename = "Interfaces")]
    interfaces: String,
}

fn object_row(s: &ObjectSummary) -> ObjectRow {
    ObjectRow {
        vid: s.vid.get(),
        type_name: s.type_name.clone(),
        name: s.name.clone(),
        parent: s.parent.map(|p| p.to_string()).unwrap_or_default(),
        interfaces: s.interfaces.join(", "),
    }
}

#[derive(Serialize)]
struct ObjectDetail {
    #[serde(flatten)]
    summary: ObjectSummary,
    properties: Vec<PropertyEntry>,
}

#[derive(Serialize)]
struct PropertyEntry {
    interface: &'static str,
    property: &'static str,
    value: Option<Value>,
}

impl PropertyEntry {
    fn display_value(&self) -> String {
        self.value
            .as_ref()
            .map_or_else(|| "unknown".to_owned(), ToString::to_string)
    }
}

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Interface")]
    interface: &'static str,
    #[tabled(rename = "Property")]
    property: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// List objects from the configured snapshot. Does not connect.
pub async fn list(vantage: &Vantage, args: &ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if vantage.config().local_config_file.is_none() {
        return Err(CliError::Validation {
            field: "snapshot".into(),
            reason: "listing objects needs a Design Center backup (--snapshot)".into(),
        });
    }
    vantage.load_snapshot().await?;

    let mut objects: Vec<ObjectSummary> = vantage
        .objects()
        .iter()
        .filter(|o| {
            args.r#type
                .as_deref()
                .is_none_or(|t| o.type_name().eq_ignore_ascii_case(t))
        })
        .map(|o| ObjectSummary::from(o.as_ref()))
        .collect();
    objects.sort_by_key(|o| o.vid);

    let out = output::render_list(&global.output, &objects, object_row, |o| {
        format!("{}\t{}\t{}", o.vid, o.type_name, o.name)
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Fetch every cached property of one object and print it.
pub async fn get(vantage: &Vantage, args: &GetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    vantage.initialize(false, false).await?;
    let object = super::util::resolve_object(vantage, args.vid, args.r#type.as_deref())?;
    object.fetch_state().await;

    let detail = ObjectDetail {
        summary: ObjectSummary::from(object.as_ref()),
        properties: object
            .properties()
            .into_iter()
            .map(|(interface, property, value)| PropertyEntry {
                interface,
                property,
                value,
            })
            .collect(),
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &detail,
        |d| {
            let title = format!("{} {} {}", d.summary.vid, d.summary.type_name, d.summary.name);
            let mut text = output::accent(title.trim_end(), color);
            if !d.properties.is_empty() {
                text.push('\n');
                let rows: Vec<PropertyRow> = d
                    .properties
                    .iter()
                    .map(|p| PropertyRow {
                        interface: p.interface,
                        property: p.property,
                        value: p.display_value(),
                    })
                    .collect();
                text.push_str(&Table::new(rows).with(Style::rounded()).to_string());
            }
            text
        },
        |d| {
            d.properties
                .iter()
                .map(|p| format!("{}.{}\t{}", p.interface, p.property, p.display_value()))
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
