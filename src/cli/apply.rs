// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::Ordering;

use devconf::{Engine, Operation, OfflineSession};

use crate::{
    config::Config,
    error::{CliError, EX_DATAERR, EX_USAGE},
    state::{context_from_matches, schema_from_file, tree_from_file},
};

pub(crate) fn apply(matches: &clap::ArgMatches) -> Result<String, CliError> {
    let (schema_path, tree_path) =
        match (matches.value_of("SCHEMA"), matches.value_of("TREE")) {
            (Some(s), Some(t)) => (s, t),
            _ => return Err("Please define both SCHEMA and TREE".into()),
        };
    let operation = parse_operation(
        matches.value_of("OPERATION").unwrap_or("create"),
    )?;
    let config = Config::load_from_matches(matches)?;
    let timeout = match matches.value_of("TIMEOUT") {
        Some(t) => Some(u32::from_str(t).map_err(|e| CliError {
            code: EX_DATAERR,
            error_msg: format!("Invalid timeout {t}: {e}"),
        })?),
        None => config.apply.timeout,
    };

    let feature = schema_from_file(schema_path)?;
    let tree = tree_from_file(tree_path, &feature)?;
    let ctx = context_from_matches(matches, false)?;

    let mut engine = Engine::<OfflineSession>::new_offline();
    if let Some(t) = timeout {
        engine.set_timeout(t);
    }
    set_ctrl_c_action(&engine);

    let identity = matches
        .value_of("IDENTITY")
        .unwrap_or_else(|| feature.identity_of(&tree))
        .to_string();
    let outcome = match operation {
        Operation::Create => engine.create(&feature, &tree, &ctx)?,
        Operation::Update => engine.update(&feature, &identity, &tree, &ctx)?,
        Operation::Delete => engine.delete(&feature, &identity)?,
        _ => {
            return Err(format!("Unsupported operation {operation}").into());
        }
    };
    log::info!(
        "{} {} {}: {} statement(s)",
        operation,
        feature.name,
        identity,
        outcome.batch.len()
    );

    let artifact = engine.take_artifact()?;
    let content = format!(
        "# devconfctl {} {} {} at {}\n{}",
        operation,
        feature.name,
        identity,
        chrono::Local::now().to_rfc3339(),
        artifact
    );
    match matches.value_of("OUTPUT") {
        Some(path) if path != "-" => {
            let mut fd = std::fs::File::create(path)?;
            fd.write_all(content.as_bytes())?;
            Ok(format!(
                "Wrote {} statement(s) to {path}",
                artifact.len()
            ))
        }
        _ => Ok(content.trim_end().to_string()),
    }
}

fn parse_operation(value: &str) -> Result<Operation, CliError> {
    match value {
        "create" => Ok(Operation::Create),
        "update" => Ok(Operation::Update),
        "delete" => Ok(Operation::Delete),
        _ => Err(CliError {
            code: EX_USAGE,
            error_msg: format!(
                "Invalid operation '{value}', expecting create, update or \
                delete"
            ),
        }),
    }
}

fn set_ctrl_c_action(engine: &Engine<OfflineSession>) {
    let cancel = engine.cancel_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        log::warn!("Interrupted, cancelling");
        cancel.store(true, Ordering::SeqCst);
    }) {
        log::warn!("Failed to set Ctrl-C handler: {e}");
    }
}
