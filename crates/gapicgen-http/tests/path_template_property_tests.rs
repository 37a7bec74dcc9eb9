use gapicgen_http::{compile_path_template, AccessorError, PathSegment};
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z_][a-z0-9_]{0,8}").unwrap()
}

fn field_expr() -> impl Strategy<Value = String> {
    proptest::collection::vec(ident(), 1..=3).prop_map(|steps| steps.join("."))
}

fn literal() -> impl Strategy<Value = String> {
    // Anything but braces (and `=`, which only matters inside variables).
    proptest::string::string_regex("[a-zA-Z0-9/:._*-]{0,8}").unwrap()
}

fn pattern_parts() -> impl Strategy<Value = Vec<(String, String)>> {
    proptest::collection::vec((literal(), field_expr()), 0..5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn compiled_template_renders_back_to_pattern(parts in pattern_parts(), tail in literal()) {
        let mut pattern = String::new();
        for (lit, var) in &parts {
            pattern.push_str(lit);
            pattern.push('{');
            pattern.push_str(var);
            pattern.push('}');
        }
        pattern.push_str(&tail);

        let t = compile_path_template(&pattern).expect("compile");
        prop_assert_eq!(t.to_string(), pattern);
        prop_assert_eq!(t.field_refs().count(), parts.len());
        for segment in t.segments() {
            if let PathSegment::Literal(text) = segment {
                prop_assert!(!text.is_empty());
            }
        }
    }

    #[test]
    fn any_value_pattern_is_rejected(prefix in literal(), var in field_expr(), value in "[a-z*/]{1,8}") {
        let pattern = format!("{prefix}{{{var}={value}}}");
        let err = compile_path_template(&pattern).expect_err("should error");
        let is_unsupported = matches!(
            err.accessor_error(),
            Some(AccessorError::UnsupportedPattern { .. })
        );
        prop_assert!(is_unsupported, "err={}", err);
    }
}
