// SPDX-License-Identifier: Apache-2.0

use devconf::{
    compile_batch, decompile_text, gen_diff, CodecContext, FeatureModel,
    OptionsBlock, Statement, StatementBatch,
};

use crate::{
    error::CliError,
    state::{
        context_from_matches, read_content, schema_from_file, tree_from_file,
    },
};

// Whether the captured output holds any statement line
fn has_statement(content: &str) -> bool {
    content
        .lines()
        .map(|l| l.trim())
        .any(|l| l == "set" || l.starts_with("set "))
}

fn statements_of(batch: &StatementBatch) -> Vec<Statement> {
    batch.entries().iter().map(|e| e.statement().clone()).collect()
}

/// Difference between the object captured in `CURRENT_CONFIG`, relative to
/// its object path, and the desired tree.
pub(crate) fn diff(matches: &clap::ArgMatches) -> Result<String, CliError> {
    let (schema_path, current_path, tree_path) = match (
        matches.value_of("SCHEMA"),
        matches.value_of("CURRENT_CONFIG"),
        matches.value_of("TREE"),
    ) {
        (Some(s), Some(c), Some(t)) => (s, c, t),
        _ => {
            return Err(
                "Please define SCHEMA, CURRENT_CONFIG and TREE".into()
            );
        }
    };
    let feature = schema_from_file(schema_path)?;
    let desired_tree = tree_from_file(tree_path, &feature)?;
    let ctx = context_from_matches(matches, false)?;
    let content = read_content(current_path)?;

    let desired =
        statements_of(&compile_batch(&feature, &desired_tree, &ctx)?);
    let current = if has_statement(&content) {
        let current_tree =
            current_tree(&feature, &desired_tree, &content, &ctx)?;
        statements_of(&compile_batch(&feature, &current_tree, &ctx)?)
    } else {
        Vec::new()
    };

    let diff = gen_diff(current.as_slice(), desired.as_slice());
    if diff.is_empty() {
        log::info!("No difference found");
    }
    Ok(diff.to_string().trim_end().to_string())
}

// Captured text does not hold the identity, take it from the desired tree
fn current_tree(
    feature: &FeatureModel,
    desired_tree: &OptionsBlock,
    content: &str,
    ctx: &CodecContext,
) -> Result<OptionsBlock, CliError> {
    let mut tree = decompile_text(content, &feature.fields, ctx)?;
    if let Some(id_field) = feature.identity.as_deref() {
        tree.set(id_field, feature.identity_of(desired_tree));
    }
    Ok(tree)
}
