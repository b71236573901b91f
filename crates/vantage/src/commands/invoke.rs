//! Untyped method calls and raw host commands.

use serde::Serialize;
use tabled::Tabled;

use vantage_core::Vantage;

use crate::cli::{GlobalOpts, InvokeArgs, RawArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct InvokeResult {
    vid: u32,
    method: String,
    result: String,
    args: Vec<String>,
}

#[derive(Tabled)]
struct InvokeRow {
    #[tabled(rename = "VID")]
    vid: u32,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Args")]
    args: String,
}

/// `INVOKE <vid> <Interface.Method> [args...]`, printed as the echoed reply.
pub async fn invoke(
    vantage: &Vantage,
    args: &InvokeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !args.method.contains('.') {
        return Err(CliError::Validation {
            field: "method".into(),
            reason: format!("'{}' is not Interface.Method", args.method),
        });
    }

    let reply = vantage
        .command_client()
        .invoke(args.vid, &args.method, &args.args)
        .await?;
    let result = InvokeResult {
        vid: reply.vid,
        method: reply.method,
        result: reply.result,
        args: reply.args,
    };

    let out = output::render_list(
        &global.output,
        std::slice::from_ref(&result),
        |r| InvokeRow {
            vid: r.vid,
            method: r.method.clone(),
            result: r.result.clone(),
            args: r.args.join(" "),
        },
        |r| r.result.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Send one raw line and print every line received up to the reply.
pub async fn raw(vantage: &Vantage, args: &RawArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let line = args.line.join(" ");
    let lines = vantage.command_client().raw_request(&line).await?;

    let out = output::render_single(
        &global.output,
        &lines,
        |l| l.join("\n"),
        |l| l.join("\n"),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
