// SPDX-License-Identifier: Apache-2.0

use crate::{gen_diff, unit_tests::testlib::parse_statements};

#[test]
fn test_diff_identical() {
    let current = parse_statements(&["port 22", "ciphers aes256-ctr"]);
    let diff = gen_diff(&current, &current);
    assert!(diff.is_empty());
    assert_eq!(diff.to_string(), "");
}

#[test]
fn test_diff_added_and_removed() {
    let current = parse_statements(&["port 22", "root-login allow"]);
    let desired =
        parse_statements(&["port 22", "root-login deny", "ciphers a"]);
    let diff = gen_diff(&current, &desired);
    assert!(!diff.is_empty());
    assert!(!diff.reordered);
    assert_eq!(
        diff.to_string(),
        "- root-login allow\n+ root-login deny\n+ ciphers a\n"
    );
}

#[test]
fn test_diff_reordered_list() {
    let current = parse_statements(&["ciphers b", "ciphers a"]);
    let desired = parse_statements(&["ciphers a", "ciphers b"]);
    let diff = gen_diff(&current, &desired);
    assert!(diff.removed.is_empty());
    assert!(diff.added.is_empty());
    assert!(diff.reordered);
    assert!(!diff.is_empty());
}
