// SPDX-License-Identifier: Apache-2.0

use crate::{
    compile::{discriminant_value, is_field_set},
    BlockModel, CodecContext, DevConfError, ErrorKind, FieldKind, FieldModel,
    OptionsBlock, OptionsValue, ScalarType, ScalarValue, Statement,
};

pub(crate) const OUTPUT_START_MARKER: &str = "<configuration-output>";
pub(crate) const OUTPUT_END_MARKER: &str = "</configuration-output>";
const LINE_PREFIX: &str = "set ";

/// Rebuild an options tree from statements relative to the block owning
/// `model`.
///
/// Statements are dispatched one by one on the longest matching field
/// keyword. Repeated blocks are looked up by identity, so statements of the
/// same sub-block do not need to be contiguous. A statement of a variant
/// field is held back until the sibling discriminant of its block is known,
/// whatever the declaration order is.
pub fn decompile(
    statements: &[Statement],
    model: &BlockModel,
    context: &CodecContext,
) -> Result<OptionsBlock, DevConfError> {
    let mut ret = model.new_block();
    let mut unknown: Vec<(usize, &Statement)> = Vec::new();
    let mut pending: Vec<(usize, &Statement)> =
        statements.iter().enumerate().collect();
    let mut settle = false;
    while !pending.is_empty() {
        let mut pass = if settle {
            Pass::Settle
        } else {
            Pass::Defer { holding: false }
        };
        let mut deferred = Vec::new();
        for (index, statement) in pending.iter().copied() {
            match decompile_statement(
                &mut ret,
                model,
                context,
                statement.tokens(),
                statement,
                &mut pass,
            )? {
                Dispatch::Assigned => (),
                Dispatch::Deferred => deferred.push((index, statement)),
                Dispatch::Unknown => unknown.push((index, statement)),
            }
        }
        // No discriminant got assigned, settle the rest with the context
        if deferred.len() == pending.len() {
            settle = true;
        }
        pending = deferred;
    }
    if unknown.is_empty() {
        return Ok(ret);
    }
    unknown.sort_by_key(|(index, _)| *index);
    let unknown: Vec<&Statement> = unknown.into_iter().map(|u| u.1).collect();
    if context.is_strict() {
        let e = DevConfError::new_statement_error(
            ErrorKind::UnrecognizedStatement,
            format!(
                "{} statement(s) not described by the model: {}",
                unknown.len(),
                unknown
                    .iter()
                    .map(|s| format!("'{s}'"))
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            &unknown[0].to_string(),
        );
        log::error!("{}", e);
        Err(e)
    } else {
        for statement in unknown {
            log::warn!("Ignoring unrecognized statement '{}'", statement);
        }
        Ok(ret)
    }
}

/// Decompile the raw text of a `display set relative` query.
pub fn decompile_text(
    text: &str,
    model: &BlockModel,
    context: &CodecContext,
) -> Result<OptionsBlock, DevConfError> {
    let mut statements = Vec::new();
    for line in statement_lines(text) {
        statements.push(Statement::parse(line)?);
    }
    decompile(statements.as_slice(), model, context)
}

/// Remove the framing marker lines, leaving only the configuration text.
pub(crate) fn strip_output_framing(text: &str) -> String {
    text.lines()
        .filter(|l| {
            let l = l.trim();
            l != OUTPUT_START_MARKER && l != OUTPUT_END_MARKER
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Statement lines of the query output with the `set ` prefix removed.
pub(crate) fn statement_lines(text: &str) -> Vec<&str> {
    let mut ret = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty()
            || line == OUTPUT_START_MARKER
            || line == OUTPUT_END_MARKER
        {
            continue;
        }
        match line.strip_prefix(LINE_PREFIX) {
            Some(l) => ret.push(l),
            None => {
                log::debug!("Skipping non-statement line '{}'", line);
            }
        }
    }
    ret
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Assigned,
    // Waiting for a sibling discriminant
    Deferred,
    // No field of the model describes the statement
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    // Once a statement is held back, every following statement of a
    // variant field is held too, keeping list and block order.
    Defer { holding: bool },
    Settle,
}

enum Lookup<'a> {
    Found(&'a FieldModel),
    Deferred,
    NotFound,
}

fn decompile_statement(
    block: &mut OptionsBlock,
    model: &BlockModel,
    context: &CodecContext,
    tokens: &[String],
    statement: &Statement,
    pass: &mut Pass,
) -> Result<Dispatch, DevConfError> {
    let field = match find_field(block, model, context, tokens, pass) {
        Lookup::Found(f) => f,
        Lookup::Deferred => return Ok(Dispatch::Deferred),
        Lookup::NotFound => return Ok(Dispatch::Unknown),
    };
    let rest = &tokens[field.keyword.len()..];

    match &field.kind {
        FieldKind::Scalar(ScalarType::Flag) => {
            if !rest.is_empty() {
                return Ok(Dispatch::Unknown);
            }
            block.set(&field.name, true);
        }
        FieldKind::Scalar(t) => {
            if rest.is_empty() {
                return Ok(Dispatch::Unknown);
            }
            let value = parse_scalar(field, *t, rest, statement)?;
            block.set(&field.name, value);
        }
        FieldKind::List(t) => {
            if rest.is_empty() {
                return Ok(Dispatch::Unknown);
            }
            let value = parse_scalar(field, *t, rest, statement)?;
            match block.get_mut(&field.name) {
                Some(OptionsValue::List(items)) => items.push(value),
                None => {
                    block.set(&field.name, OptionsValue::List(vec![value]));
                }
                Some(v) => return Err(holds_wrong_kind(field, v)),
            }
        }
        FieldKind::Set(t) => {
            if rest.is_empty() {
                return Ok(Dispatch::Unknown);
            }
            let value = parse_scalar(field, *t, rest, statement)?;
            match block.get_mut(&field.name) {
                Some(OptionsValue::Set(items)) => {
                    items.insert(value);
                }
                None => {
                    block.set(
                        &field.name,
                        OptionsValue::Set([value].into_iter().collect()),
                    );
                }
                Some(v) => return Err(holds_wrong_kind(field, v)),
            }
        }
        FieldKind::Block(sub_model) => {
            if block.get(&field.name).is_none() {
                block.set(&field.name, sub_model.new_block());
            }
            let sub_block = match block.get_mut(&field.name) {
                Some(OptionsValue::Block(b)) => b,
                Some(v) => return Err(holds_wrong_kind(field, v)),
                None => return Err(holds_nothing(field)),
            };
            if !rest.is_empty() {
                return decompile_statement(
                    sub_block, sub_model, context, rest, statement, pass,
                );
            }
        }
        FieldKind::Blocks { identity, fields } => {
            if rest.is_empty() {
                return Ok(Dispatch::Unknown);
            }
            let id_type = match fields.field(identity).map(|f| &f.kind) {
                Some(FieldKind::Scalar(t)) => *t,
                _ => return Err(holds_nothing(field)),
            };
            let id = parse_scalar(field, id_type, &rest[..1], statement)?;
            if block.get(&field.name).is_none() {
                block.set(&field.name, OptionsValue::Blocks(Vec::new()));
            }
            let sub_blocks = match block.get_mut(&field.name) {
                Some(OptionsValue::Blocks(b)) => b,
                Some(v) => return Err(holds_wrong_kind(field, v)),
                None => return Err(holds_nothing(field)),
            };
            let sub_block = find_or_create(sub_blocks, fields, identity, id);
            if rest.len() > 1 {
                return decompile_statement(
                    sub_block,
                    fields,
                    context,
                    &rest[1..],
                    statement,
                    pass,
                );
            }
        }
    }
    Ok(Dispatch::Assigned)
}

fn find_or_create<'a>(
    blocks: &'a mut Vec<OptionsBlock>,
    model: &BlockModel,
    identity: &str,
    id: ScalarValue,
) -> &'a mut OptionsBlock {
    let pos = match blocks
        .iter()
        .position(|b| b.get_scalar(identity) == Some(&id))
    {
        Some(p) => p,
        None => {
            let mut new_block = model.new_block();
            new_block.set(identity, id);
            blocks.push(new_block);
            blocks.len() - 1
        }
    };
    &mut blocks[pos]
}

// Longest keyword wins. Fields whose variant guard is known to reject the
// current discriminant are not candidates. While deferring, a candidate
// guarded by a sibling field not assigned yet postpones the whole statement.
fn find_field<'a>(
    block: &OptionsBlock,
    model: &'a BlockModel,
    context: &CodecContext,
    tokens: &[String],
    pass: &mut Pass,
) -> Lookup<'a> {
    let candidates: Vec<&FieldModel> = model
        .fields
        .iter()
        .filter(|f| tokens.starts_with(f.keyword.as_slice()))
        .collect();
    if let Pass::Defer { holding } = pass {
        let hold = if *holding {
            candidates.iter().any(|f| f.variant.is_some())
        } else {
            candidates.iter().any(|f| is_guard_pending(block, model, f))
        };
        if hold {
            *holding = true;
            return Lookup::Deferred;
        }
    }
    match candidates
        .into_iter()
        .filter(|f| match f.variant.as_ref() {
            Some(guard) => {
                match discriminant_value(
                    block,
                    model,
                    context,
                    &guard.discriminant,
                ) {
                    Some(cur) => guard.values.iter().any(|v| v == &cur),
                    None => true,
                }
            }
            None => true,
        })
        .max_by_key(|f| f.keyword.len())
    {
        Some(f) => Lookup::Found(f),
        None => Lookup::NotFound,
    }
}

fn is_guard_pending(
    block: &OptionsBlock,
    model: &BlockModel,
    field: &FieldModel,
) -> bool {
    field
        .variant
        .as_ref()
        .and_then(|guard| model.field(&guard.discriminant))
        .map(|discriminant| !is_field_set(block, discriminant))
        .unwrap_or_default()
}

fn parse_scalar(
    field: &FieldModel,
    scalar_type: ScalarType,
    tokens: &[String],
    statement: &Statement,
) -> Result<ScalarValue, DevConfError> {
    let raw = tokens.join(" ");
    match scalar_type {
        ScalarType::String => Ok(ScalarValue::Str(raw)),
        ScalarType::Int => match raw.parse::<i64>() {
            Ok(i) => Ok(ScalarValue::Int(i)),
            Err(e) => {
                let e = DevConfError::new_statement_error(
                    ErrorKind::ConversionError,
                    format!(
                        "Failed to convert '{raw}' to integer for field \
                        {}: {e}",
                        field.name
                    ),
                    &statement.to_string(),
                );
                log::error!("{}", e);
                Err(e)
            }
        },
        ScalarType::Flag => match raw.as_str() {
            "true" | "enable" => Ok(ScalarValue::Bool(true)),
            "false" | "disable" => Ok(ScalarValue::Bool(false)),
            _ => {
                let e = DevConfError::new_statement_error(
                    ErrorKind::ConversionError,
                    format!(
                        "Failed to convert '{raw}' to boolean for field {}",
                        field.name
                    ),
                    &statement.to_string(),
                );
                log::error!("{}", e);
                Err(e)
            }
        },
    }
}

fn holds_wrong_kind(field: &FieldModel, value: &OptionsValue) -> DevConfError {
    let e = DevConfError::new(
        ErrorKind::Bug,
        format!(
            "BUG: field {} holds a {} value which does not match its model",
            field.name,
            value.kind_name()
        ),
    );
    log::error!("{}", e);
    e
}

fn holds_nothing(field: &FieldModel) -> DevConfError {
    let e = DevConfError::new(
        ErrorKind::Bug,
        format!("BUG: failed to materialize block {}", field.name),
    );
    log::error!("{}", e);
    e
}
