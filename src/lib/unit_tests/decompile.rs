// SPDX-License-Identifier: Apache-2.0

use crate::{
    compile, compile_batch, decompile, decompile_text,
    unit_tests::testlib::{
        interface_model, load_tree, parse_statements, ssh_model,
    },
    BatchEntry, BlockModel, CodecContext, ErrorKind, FieldModel,
    OptionsBlock, OptionsValue, ScalarType, ScalarValue, Statement,
};

fn login_model() -> BlockModel {
    BlockModel::new(vec![FieldModel::block(
        "block",
        BlockModel::new(vec![
            FieldModel::string("host_name"),
            FieldModel::int("idle_timeout").default_value(-1),
        ]),
    )])
}

#[test]
fn test_decompile_block_from_two_statements() {
    let model = login_model();
    let statements = parse_statements(&[
        r#"block host_name "my server""#,
        "block idle_timeout 30",
    ]);
    let tree = decompile(&statements, &model, &CodecContext::new()).unwrap();

    let block = tree.get_block("block").unwrap();
    assert_eq!(block.get_str("host_name"), Some("my server"));
    assert_eq!(block.get_int("idle_timeout"), Some(30));
}

#[test]
fn test_decompile_missing_field_keep_sentinel() {
    let model = login_model();
    let statements = parse_statements(&["block host_name router1"]);
    let tree = decompile(&statements, &model, &CodecContext::new()).unwrap();

    let block = tree.get_block("block").unwrap();
    assert_eq!(block.get_int("idle_timeout"), Some(-1));
}

#[test]
fn test_decompile_nothing_give_new_block() {
    let feature = ssh_model();
    let tree = decompile(&[], &feature.fields, &CodecContext::new()).unwrap();
    assert_eq!(tree, feature.fields.new_block());
    assert_eq!(tree.get_int("port"), Some(-1));
    assert_eq!(tree.get_bool("tcp_forwarding"), Some(false));
    assert_eq!(tree.get("ciphers"), Some(&OptionsValue::List(Vec::new())));
}

#[test]
fn test_decompile_identity_blocks_not_contiguous() {
    let feature = interface_model();
    let statements = parse_statements(&[
        "unit 0 description mgmt",
        "unit 10 vlan-id 10",
        "mtu 9192",
        "unit 0 family inet address 192.0.2.1/24",
        "unit 10 description \"user vlan\"",
        "unit 0 family inet address 192.0.2.1/24 preferred",
    ]);
    let tree =
        decompile(&statements, &feature.fields, &CodecContext::new()).unwrap();

    assert_eq!(tree.get_int("mtu"), Some(9192));
    let units = tree.get_blocks("unit");
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].get_int("number"), Some(0));
    assert_eq!(units[0].get_str("description"), Some("mgmt"));
    assert_eq!(units[0].get_int("vlan_id"), Some(-1));
    assert_eq!(units[1].get_int("number"), Some(10));
    assert_eq!(units[1].get_int("vlan_id"), Some(10));
    assert_eq!(units[1].get_str("description"), Some("user vlan"));

    let addresses = units[0]
        .get_block("family_inet")
        .unwrap()
        .get_blocks("address");
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].get_str("cidr"), Some("192.0.2.1/24"));
    assert_eq!(addresses[0].get_bool("preferred"), Some(true));
}

#[test]
fn test_decompile_longest_keyword_wins() {
    let model = BlockModel::new(vec![
        FieldModel::string("name"),
        FieldModel::string("name_server").keyword("name server"),
    ]);
    let statements =
        parse_statements(&["name server 192.0.2.53", "name dns1"]);
    let tree = decompile(&statements, &model, &CodecContext::new()).unwrap();
    assert_eq!(tree.get_str("name_server"), Some("192.0.2.53"));
    assert_eq!(tree.get_str("name"), Some("dns1"));
}

#[test]
fn test_decompile_string_join_remaining_tokens() {
    let model = BlockModel::new(vec![FieldModel::string("message")]);
    let statements = vec![Statement::from(&["message", "hello", "world"][..])];
    let tree = decompile(&statements, &model, &CodecContext::new()).unwrap();
    assert_eq!(tree.get_str("message"), Some("hello world"));
}

#[test]
fn test_decompile_invalid_integer() {
    let feature = ssh_model();
    let statements = parse_statements(&["port twenty-two"]);
    let result = decompile(&statements, &feature.fields, &CodecContext::new());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::ConversionError);
        assert!(e.msg().contains("port"));
        assert_eq!(e.statement(), "port twenty-two");
    }
}

#[test]
fn test_decompile_unknown_statement_permissive() {
    let feature = ssh_model();
    let statements =
        parse_statements(&["port 22", "log-key-changes", "root-login allow"]);
    let tree =
        decompile(&statements, &feature.fields, &CodecContext::new()).unwrap();
    assert_eq!(tree.get_int("port"), Some(22));
    assert_eq!(tree.get_str("root_login"), Some("allow"));
}

#[test]
fn test_decompile_unknown_statement_strict() {
    let feature = ssh_model();
    let statements =
        parse_statements(&["port 22", "log-key-changes", "tcp-forwarding 1"]);
    let mut ctx = CodecContext::new();
    ctx.set_strict(true);
    let result = decompile(&statements, &feature.fields, &ctx);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::UnrecognizedStatement);
        assert!(e.msg().starts_with("2 statement(s)"));
        assert!(e.msg().contains("'log-key-changes'"));
        assert!(e.msg().contains("'tcp-forwarding 1'"));
        assert_eq!(e.statement(), "log-key-changes");
    }
}

#[test]
fn test_decompile_variant_pick_matching_field() {
    let model = BlockModel::new(vec![
        FieldModel::string("version"),
        FieldModel::string("server_v4")
            .keyword("server")
            .variant("version", &["v4"]),
        FieldModel::string("server_v6")
            .keyword("relay server")
            .variant("version", &["v6"]),
    ]);
    let mut ctx = CodecContext::new();
    ctx.set_discriminant("version", "v4");
    let statements = parse_statements(&["relay server 2001:db8::1"]);

    let tree = decompile(&statements, &model, &ctx).unwrap();
    assert_eq!(tree.get("server_v6"), None);
    assert_eq!(tree.get_str("server_v4"), None);

    ctx.set_discriminant("version", "v6");
    let tree = decompile(&statements, &model, &ctx).unwrap();
    assert_eq!(tree.get_str("server_v6"), Some("2001:db8::1"));
}

fn relay_model() -> BlockModel {
    BlockModel::new(vec![
        FieldModel::flag("relay_option_82")
            .keyword("relay-option-82")
            .variant("version", &["v4"]),
        FieldModel::string("version"),
    ])
}

#[test]
fn test_decompile_variant_declared_before_discriminant() {
    let model = relay_model();
    let mut tree = model.new_block();
    tree.set("relay_option_82", true);
    tree.set("version", "v4");
    let mut ctx = CodecContext::new();
    ctx.set_discriminant("version", "v6");

    let statements = compile(&tree, &model, &ctx).unwrap();
    assert_eq!(
        statements,
        parse_statements(&["relay-option-82", "version v4"])
    );
    let round = decompile(&statements, &model, &ctx).unwrap();
    assert_eq!(round, tree);
}

#[test]
fn test_decompile_variant_rejected_by_later_discriminant() {
    let model = relay_model();
    let mut ctx = CodecContext::new();
    ctx.set_discriminant("version", "v4");
    let statements = parse_statements(&["relay-option-82", "version v6"]);

    let tree = decompile(&statements, &model, &ctx).unwrap();
    assert_eq!(tree.get_str("version"), Some("v6"));
    assert_eq!(
        tree.get("relay_option_82"),
        model.new_block().get("relay_option_82")
    );

    ctx.set_strict(true);
    let result = decompile(&statements, &model, &ctx);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::UnrecognizedStatement);
        assert_eq!(e.statement(), "relay-option-82");
    }
}

#[test]
fn test_decompile_variant_list_keep_order() {
    let model = BlockModel::new(vec![
        FieldModel::list("server", ScalarType::String)
            .variant("version", &["v4"]),
        FieldModel::string("version"),
    ]);
    let statements = parse_statements(&[
        "server 192.0.2.1",
        "version v4",
        "server 192.0.2.2",
    ]);
    let tree = decompile(&statements, &model, &CodecContext::new()).unwrap();
    assert_eq!(
        tree.get("server"),
        Some(&OptionsValue::List(vec![
            ScalarValue::from("192.0.2.1"),
            ScalarValue::from("192.0.2.2"),
        ]))
    );
}

#[test]
fn test_decompile_text_strip_framing() {
    let feature = ssh_model();
    let text = "\n<configuration-output>\n\
                set port 2200\n\
                set protocol-version v2\n\
                # generated on device\n\
                set tcp-forwarding\n\
                </configuration-output>\n";
    let tree =
        decompile_text(text, &feature.fields, &CodecContext::new()).unwrap();
    assert_eq!(tree.get_int("port"), Some(2200));
    assert_eq!(
        tree.get("protocol_version"),
        Some(&OptionsValue::Set(
            [ScalarValue::from("v2")].into_iter().collect()
        ))
    );
    assert_eq!(tree.get_bool("tcp_forwarding"), Some(true));
}

#[test]
fn test_decompile_text_empty_output() {
    let feature = ssh_model();
    let tree = decompile_text(
        "<configuration-output>\n</configuration-output>\n",
        &feature.fields,
        &CodecContext::new(),
    )
    .unwrap();
    assert!(feature.is_absent(&tree));
}

#[test]
fn test_compile_then_decompile_give_same_tree() {
    let feature = interface_model();
    let tree = load_tree(
        &feature,
        r#"---
description: "uplink; to \"core\""
mtu: 0
vlan_tagging: true
unit:
  - number: 0
    family_inet:
      address:
        - cidr: 192.0.2.1/24
  - number: 20
    vlan_id: 20
    family_inet: {}
"#,
    );
    let ctx = CodecContext::new();
    let statements = compile(&tree, &feature.fields, &ctx).unwrap();
    let mut round = decompile(&statements, &feature.fields, &ctx).unwrap();
    assert_eq!(round, tree);

    // Statements rendered as text then parsed back give the same tree too
    let text: Vec<String> = statements.iter().map(|s| s.to_string()).collect();
    let lines: Vec<&str> = text.iter().map(String::as_str).collect();
    round = decompile(&parse_statements(&lines), &feature.fields, &ctx)
        .unwrap();
    assert_eq!(round, tree);
}

#[test]
fn test_compile_batch_then_decompile_object() {
    let feature = interface_model();
    let mut tree = feature.new_tree("ge-0/0/3");
    tree.set("description", "spare");
    let ctx = CodecContext::new();
    let batch = compile_batch(&feature, &tree, &ctx).unwrap();
    assert_eq!(
        batch.to_lines(),
        vec!["set interfaces ge-0/0/3 description spare"]
    );

    let object_path = feature.object_path("ge-0/0/3");
    let relative: Vec<Statement> = batch
        .entries()
        .iter()
        .filter_map(|e| match e {
            BatchEntry::Set(s) => Some(Statement::new(
                s.tokens()[object_path.len()..].to_vec(),
            )),
            BatchEntry::Delete(_) => None,
        })
        .collect();
    let mut round = decompile(&relative, &feature.fields, &ctx).unwrap();
    round.set("name", "ge-0/0/3");
    assert_eq!(round, tree);
}

#[test]
fn test_decompile_empty_block_present() {
    let model = BlockModel::new(vec![FieldModel::block(
        "auto_negotiation",
        BlockModel::new(vec![FieldModel::int("speed").default_value(-1)]),
    )
    .keyword("auto-negotiation")]);
    let statements = parse_statements(&["auto-negotiation"]);
    let tree = decompile(&statements, &model, &CodecContext::new()).unwrap();

    let mut expected = OptionsBlock::new();
    let mut sub = OptionsBlock::new();
    sub.set("speed", -1);
    expected.set("auto_negotiation", sub);
    assert_eq!(tree, expected);
}
