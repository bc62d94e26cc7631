// SPDX-License-Identifier: Apache-2.0

use devconf::decompile_text;

use crate::{
    config::Config,
    error::CliError,
    state::{context_from_matches, format_tree, read_content, schema_from_file},
};

pub(crate) fn parse(matches: &clap::ArgMatches) -> Result<String, CliError> {
    let schema_path = match matches.value_of("SCHEMA") {
        Some(s) => s,
        None => return Err("Please define SCHEMA".into()),
    };
    let feature = schema_from_file(schema_path)?;
    let strict = if matches.is_present("STRICT") {
        true
    } else {
        Config::load_from_matches(matches)?.parse.strict
    };
    let ctx = context_from_matches(matches, strict)?;

    let content =
        read_content(matches.value_of("CONFIG_FILE").unwrap_or("-"))?;
    let mut tree = decompile_text(&content, &feature.fields, &ctx)?;
    if let (Some(id_field), Some(identity)) =
        (feature.identity.as_deref(), matches.value_of("IDENTITY"))
    {
        tree.set(id_field, identity);
    }
    format_tree(&tree, &feature, matches.is_present("JSON"))
}
