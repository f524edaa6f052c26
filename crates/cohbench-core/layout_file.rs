//! Parser for `COHBENCH_LAYOUT_RS` files.
//!
//! Shared by `build.rs` and the crate's unit tests. Only lines of the form
//! `pub const NAME: TYPE = VALUE;` are read; everything else is skipped.

/// Every `(NAME, VALUE)` pair in `content`, in file order.
pub fn parse_layout(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("pub const "))
        .filter_map(parse_const_line)
        .collect()
}

/// Parse a single const line and return (name, value)
pub fn parse_const_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("pub const ")?.trim();

    let colon_pos = rest.find(':')?;
    let name = rest[..colon_pos].trim().to_string();

    let eq_pos = rest.find('=')?;
    let semi_pos = rest.rfind(';').unwrap_or(rest.len());
    if semi_pos <= eq_pos || colon_pos > eq_pos {
        return None;
    }

    let value = rest[eq_pos + 1..semi_pos].trim().to_string();

    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_const_line() {
        let result = parse_const_line("pub const MAX_RESULTS: usize = 1000;");
        assert_eq!(result, Some(("MAX_RESULTS".into(), "1000".into())));

        let result = parse_const_line("pub const REGION_SIZE: usize = 0x1_0000;");
        assert_eq!(result, Some(("REGION_SIZE".into(), "0x1_0000".into())));

        let result = parse_const_line("pub const MAX_PAYLOAD: usize = 4 * 1024;");
        assert_eq!(result, Some(("MAX_PAYLOAD".into(), "4 * 1024".into())));

        assert_eq!(parse_const_line("pub const BROKEN = 3;"), None);
        assert_eq!(parse_const_line("pub const X: usize;"), None);
    }

    #[test]
    fn test_parse_layout_skips_comments() {
        let user_layout = r#"
            // TCM build
            pub const REGION_SIZE: usize = 0x1_0000;
            // pub const MAX_RESULTS: usize = 5;
            const PRIVATE: usize = 1;
            pub const RESULTS_OFFSET: usize = 0x2000;
        "#;

        assert_eq!(
            parse_layout(user_layout),
            vec![
                ("REGION_SIZE".to_string(), "0x1_0000".to_string()),
                ("RESULTS_OFFSET".to_string(), "0x2000".to_string()),
            ]
        );
    }
}
