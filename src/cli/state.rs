// SPDX-License-Identifier: Apache-2.0

use std::io::Read;

use devconf::{CodecContext, FeatureModel, OptionsBlock};

use crate::error::{CliError, EX_USAGE};

// `-` means stdin
pub(crate) fn read_content(file_path: &str) -> Result<String, CliError> {
    let mut content = String::new();
    if file_path == "-" {
        std::io::stdin().read_to_string(&mut content)?;
    } else {
        std::fs::File::open(file_path)?.read_to_string(&mut content)?;
    };
    // Replace non-breaking space '\u{A0}'  to normal space
    Ok(content.replace('\u{A0}', " "))
}

pub(crate) fn schema_from_file(
    file_path: &str,
) -> Result<FeatureModel, CliError> {
    Ok(FeatureModel::from_yaml(&read_content(file_path)?)?)
}

/// Options tree from a YAML or JSON file. JSON is a subset of YAML.
pub(crate) fn tree_from_file(
    file_path: &str,
    feature: &FeatureModel,
) -> Result<OptionsBlock, CliError> {
    let value: serde_json::Value =
        serde_yaml::from_str(&read_content(file_path)?)?;
    Ok(OptionsBlock::from_json(&value, &feature.fields)?)
}

/// Codec context holding every `--context KEY=VALUE` given.
pub(crate) fn context_from_matches(
    matches: &clap::ArgMatches,
    strict: bool,
) -> Result<CodecContext, CliError> {
    let mut ctx = CodecContext::new();
    ctx.set_strict(strict);
    if let Some(values) = matches.values_of("CONTEXT") {
        for value in values {
            match value.split_once('=') {
                Some((key, v)) if !key.is_empty() => {
                    ctx.set_discriminant(key, v);
                }
                _ => {
                    return Err(CliError {
                        code: EX_USAGE,
                        error_msg: format!(
                            "Invalid context '{value}', expecting KEY=VALUE"
                        ),
                    });
                }
            }
        }
    }
    Ok(ctx)
}

/// Render a tree as YAML, or as pretty JSON when `json` is true.
pub(crate) fn format_tree(
    tree: &OptionsBlock,
    feature: &FeatureModel,
    json: bool,
) -> Result<String, CliError> {
    let value = tree.to_json(&feature.fields);
    Ok(if json {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_yaml::to_string(&value)?
    })
}
