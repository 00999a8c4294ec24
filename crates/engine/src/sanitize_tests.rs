// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn strips_html_like_tags() {
    assert_eq!(sanitize_text("hello <script>alert(1)</script> world"), "hello alert(1) world");
}

#[test]
fn strips_control_characters_but_keeps_newline_and_tab() {
    let raw = "line one\n\tindented\u{0007}bell\u{001b}escape";
    assert_eq!(sanitize_text(raw), "line one\n\tindentedbellescape");
}

#[test]
fn trims_leading_and_trailing_whitespace() {
    assert_eq!(sanitize_text("  padded text  "), "padded text");
}

#[test]
fn leaves_clean_text_unchanged() {
    assert_eq!(sanitize_text("Nothing to strip here."), "Nothing to strip here.");
}

#[test]
fn strips_self_closing_and_attributed_tags() {
    assert_eq!(sanitize_text("<br/> text <a href=\"x\">link</a>"), " text link");
}
