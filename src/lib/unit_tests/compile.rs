// SPDX-License-Identifier: Apache-2.0

use crate::{
    compile, compile_batch,
    unit_tests::testlib::{interface_model, load_tree, ssh_model},
    BlockModel, CodecContext, ErrorKind, FieldModel, OptionsBlock,
    OptionsValue, ScalarType, Statement,
};

fn to_strings(statements: &[Statement]) -> Vec<String> {
    statements.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_compile_skip_sentinel_but_emit_zero() {
    let model =
        BlockModel::new(vec![FieldModel::int("count").default_value(-1)]);
    let ctx = CodecContext::new();

    let mut tree = model.new_block();
    assert_eq!(tree.get_int("count"), Some(-1));
    assert!(compile(&tree, &model, &ctx).unwrap().is_empty());

    tree.set("count", 0);
    assert_eq!(
        to_strings(&compile(&tree, &model, &ctx).unwrap()),
        vec!["count 0"]
    );
}

#[test]
fn test_compile_declaration_order() {
    let feature = ssh_model();
    let tree = load_tree(
        &feature,
        r#"---
tcp_forwarding: true
ciphers:
  - chacha20-poly1305@openssh.com
  - aes256-ctr
root_login: deny
protocol_version:
  - v2
  - v1
port: 2222
"#,
    );
    let statements =
        compile(&tree, &feature.fields, &CodecContext::new()).unwrap();

    assert_eq!(
        to_strings(&statements),
        vec![
            "port 2222",
            "protocol-version v1",
            "protocol-version v2",
            "root-login deny",
            "ciphers chacha20-poly1305@openssh.com",
            "ciphers aes256-ctr",
            "tcp-forwarding",
        ]
    );
}

#[test]
fn test_compile_is_deterministic() {
    let feature = interface_model();
    let tree = load_tree(
        &feature,
        r#"---
name: ge-0/0/1
description: uplink to core
unit:
  - number: 100
    vlan_id: 100
  - number: 0
    family_inet:
      address:
        - cidr: 192.0.2.1/24
        - cidr: 198.51.100.1/24
          preferred: true
"#,
    );
    let ctx = CodecContext::new();
    let first = compile_batch(&feature, &tree, &ctx).unwrap();
    let second = compile_batch(&feature, &tree, &ctx).unwrap();
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(
        first.to_lines(),
        vec![
            "set interfaces ge-0/0/1 description \"uplink to core\"",
            "set interfaces ge-0/0/1 unit 100 vlan-id 100",
            "set interfaces ge-0/0/1 unit 0 family inet address 192.0.2.1/24",
            "set interfaces ge-0/0/1 unit 0 family inet address \
             198.51.100.1/24 preferred",
        ]
    );
}

#[test]
fn test_compile_object_without_option_emit_its_path() {
    let feature = interface_model();
    let tree = feature.new_tree("ge-0/0/2");
    let batch = compile_batch(&feature, &tree, &CodecContext::new()).unwrap();
    assert_eq!(batch.to_lines(), vec!["set interfaces ge-0/0/2"]);
}

#[test]
fn test_compile_batch_require_identity() {
    let feature = interface_model();
    let tree = load_tree(&feature, "mtu: 9000");
    let result = compile_batch(&feature, &tree, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
    }
}

#[test]
fn test_compile_empty_block_emit_bare_path() {
    let model = BlockModel::new(vec![
        FieldModel::block(
            "auto_negotiation",
            BlockModel::new(vec![FieldModel::int("speed").default_value(-1)]),
        )
        .keyword("auto-negotiation"),
        FieldModel::block(
            "no_marker",
            BlockModel::new(vec![FieldModel::string("comment")]),
        )
        .marker(false),
    ]);
    let ctx = CodecContext::new();

    let mut tree = model.new_block();
    assert!(compile(&tree, &model, &ctx).unwrap().is_empty());

    tree.set("auto_negotiation", OptionsBlock::new());
    tree.set("no_marker", OptionsBlock::new());
    assert_eq!(
        to_strings(&compile(&tree, &model, &ctx).unwrap()),
        vec!["auto-negotiation"]
    );
}

#[test]
fn test_compile_exclusive_fields() {
    let feature = ssh_model();
    let tree = load_tree(
        &feature,
        r#"---
port: 22
tcp_forwarding: true
no_tcp_forwarding: true
"#,
    );
    let result = compile(&tree, &feature.fields, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ExclusivityViolation);
        assert!(e.msg().contains("no_tcp_forwarding"));
        assert!(e.msg().contains("tcp_forwarding"));
    }
}

#[test]
fn test_compile_exclusive_fields_one_at_default() {
    let feature = ssh_model();
    let tree = load_tree(
        &feature,
        r#"---
tcp_forwarding: false
no_tcp_forwarding: true
"#,
    );
    let statements =
        compile(&tree, &feature.fields, &CodecContext::new()).unwrap();
    assert_eq!(to_strings(&statements), vec!["no-tcp-forwarding"]);
}

#[test]
fn test_compile_unmet_dependency() {
    let feature = ssh_model();
    let tree = load_tree(&feature, "rate_limit: 10");
    let result = compile(&tree, &feature.fields, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::DependencyError);
        assert!(e.msg().contains("connection_limit"));
    }

    let tree = load_tree(&feature, "rate_limit: 10\nconnection_limit: 0");
    assert_eq!(
        to_strings(
            &compile(&tree, &feature.fields, &CodecContext::new()).unwrap()
        ),
        vec!["connection-limit 0", "rate-limit 10"]
    );
}

fn relay_model() -> BlockModel {
    BlockModel::new(vec![
        FieldModel::string("version"),
        FieldModel::flag("relay_option_82")
            .keyword("relay-option-82")
            .variant("version", &["v4"]),
        FieldModel::flag("relay_agent_interface_id")
            .keyword("relay-agent-interface-id")
            .variant("version", &["v6"]),
    ])
}

#[test]
fn test_compile_variant_from_context() {
    let model = relay_model();
    let mut tree = model.new_block();
    tree.set("relay_agent_interface_id", true);

    let mut ctx = CodecContext::new();
    ctx.set_discriminant("version", "v6");
    assert_eq!(
        to_strings(&compile(&tree, &model, &ctx).unwrap()),
        vec!["relay-agent-interface-id"]
    );

    ctx.set_discriminant("version", "v4");
    let result = compile(&tree, &model, &ctx);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::IncompatibleVariant);
        assert!(e.msg().contains("relay_agent_interface_id"));
    }
}

#[test]
fn test_compile_variant_sibling_win_over_context() {
    let model = relay_model();
    let mut tree = model.new_block();
    tree.set("version", "v4").set("relay_option_82", true);

    let mut ctx = CodecContext::new();
    ctx.set_discriminant("version", "v6");
    assert_eq!(
        to_strings(&compile(&tree, &model, &ctx).unwrap()),
        vec!["version v4", "relay-option-82"]
    );
}

#[test]
fn test_compile_variant_unset_discriminant() {
    let model = relay_model();
    let mut tree = model.new_block();
    tree.set("relay_option_82", true);

    let result = compile(&tree, &model, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::IncompatibleVariant);
        assert!(e.msg().contains("unset"));
    }
}

#[test]
fn test_compile_duplicate_identity() {
    let feature = interface_model();
    let tree = load_tree(
        &feature,
        r#"---
name: ge-0/0/1
unit:
  - number: 0
    description: first
  - number: 1
  - number: 0
    description: second
"#,
    );
    let result = compile_batch(&feature, &tree, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::DuplicateIdentity);
        assert!(e.msg().contains("multiple blocks with the same name 0"));
    }
}

#[test]
fn test_compile_sub_block_without_identity() {
    let feature = interface_model();
    let tree = load_tree(
        &feature,
        r#"---
name: ge-0/0/1
unit:
  - description: no number
"#,
    );
    let result = compile_batch(&feature, &tree, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
    }
}

#[test]
fn test_compile_required_field() {
    let model = BlockModel::new(vec![
        FieldModel::string("server").required(),
        FieldModel::int("port").default_value(-1),
    ]);
    let mut tree = model.new_block();
    tree.set("port", 1812);
    let result = compile(&tree, &model, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
        assert!(e.msg().contains("server"));
    }
}

#[test]
fn test_compile_wrong_value_kind() {
    let feature = ssh_model();
    let mut tree = feature.fields.new_block();
    tree.set("port", "twenty-two");
    let result = compile(&tree, &feature.fields, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
    }

    let mut tree = feature.fields.new_block();
    tree.set("ciphers", OptionsValue::Block(OptionsBlock::new()));
    let result = compile(&tree, &feature.fields, &CodecContext::new());
    assert!(result.is_err());
}

#[test]
fn test_compile_unknown_field() {
    let model =
        BlockModel::new(vec![FieldModel::list("ciphers", ScalarType::String)]);
    let mut tree = model.new_block();
    tree.set("cipher", "aes256-ctr");
    let result = compile(&tree, &model, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::InvalidArgument);
        assert!(e.msg().contains("ciphers"));
    }
}

#[test]
fn test_compile_error_report_block_path() {
    let feature = interface_model();
    let tree = load_tree(
        &feature,
        r#"---
name: ge-0/0/1
unit:
  - number: 5
    family_inet:
      address:
        - cidr: 192.0.2.1/24
        - cidr: 192.0.2.1/24
"#,
    );
    let result = compile_batch(&feature, &tree, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::DuplicateIdentity);
        assert_eq!(e.statement(), "unit 5 family inet");
    }
}
