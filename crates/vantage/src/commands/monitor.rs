//! Live status monitor.

use std::time::Duration;

use owo_colors::OwoColorize;
use tracing::warn;

use vantage_core::{ObjectEvent, Vantage};

use crate::cli::{GlobalOpts, MonitorArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(vantage: &Vantage, args: MonitorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let format = global.output.clone();
    let quiet = global.quiet;
    let type_filter = args.r#type;

    let lookup = vantage.clone();
    let subscription = vantage.subscribe_all(move |event| {
        let object = lookup.get(event.vid());
        let type_name = object.as_ref().map_or("", |o| o.type_name());
        if type_filter
            .as_deref()
            .is_some_and(|t| !type_name.eq_ignore_ascii_case(t))
        {
            return;
        }
        let name = object.as_ref().map_or("", |o| o.name());
        output::print_output(&format_event(event, type_name, name, &format, color), quiet);
    });

    let result = follow(vantage, args.fetch, args.duration).await;
    subscription.unsubscribe();
    result
}

async fn follow(vantage: &Vantage, fetch: bool, duration: Option<u64>) -> Result<(), CliError> {
    vantage.initialize(fetch, true).await?;
    if vantage.objects().is_empty() {
        warn!("no objects known; pass --snapshot to follow a whole project");
    }

    match duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await?,
    }
    Ok(())
}

fn format_event(
    event: &ObjectEvent,
    type_name: &str,
    name: &str,
    format: &OutputFormat,
    color: bool,
) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
        }
        OutputFormat::Yaml => output_yaml(event),
        OutputFormat::Table | OutputFormat::Plain => {
            let vid = event.vid().to_string();
            let vid = if color { vid.yellow().to_string() } else { vid };
            let label = output::dim(format!("{type_name} {name}").trim(), color);
            match event {
                ObjectEvent::ObjectAdded { .. } => format!("{vid} {label} added"),
                ObjectEvent::PropertyChanged {
                    interface,
                    property,
                    old,
                    new,
                    ..
                } => {
                    let old = old
                        .as_ref()
                        .map_or_else(|| "unknown".to_owned(), ToString::to_string);
                    let new = output::accent(&new.to_string(), color);
                    format!("{vid} {label} {interface}.{property}: {old} -> {new}")
                }
            }
        }
    }
}

fn output_yaml(event: &ObjectEvent) -> String {
    let doc = serde_yaml::to_string(event).unwrap_or_else(|e| format!("error: {e}\n"));
    format!("---\n{}", doc.trim_end())
}
