// SPDX-License-Identifier: Apache-2.0

use devconf::compile_batch;

use crate::{
    error::CliError,
    state::{context_from_matches, schema_from_file, tree_from_file},
};

pub(crate) fn gen_conf(matches: &clap::ArgMatches) -> Result<String, CliError> {
    let (schema_path, tree_path) =
        match (matches.value_of("SCHEMA"), matches.value_of("TREE")) {
            (Some(s), Some(t)) => (s, t),
            _ => return Err("Please define both SCHEMA and TREE".into()),
        };
    let feature = schema_from_file(schema_path)?;
    let tree = tree_from_file(tree_path, &feature)?;
    let ctx = context_from_matches(matches, false)?;

    let batch = compile_batch(&feature, &tree, &ctx)?;
    Ok(batch.to_string().trim_end().to_string())
}
