use tree_sitter::{Node, Tree};

use crate::model::{StaticUsageRecord, DYNAMIC_FLAGS, DYNAMIC_PATTERN};

/// String methods whose single argument the host language implicitly coerces
/// to a regex.
const COERCING_METHODS: [&str; 3] = ["search", "match", "matchAll"];

/// Walks the tree and yields a record for every regex-construction or
/// implicit-regex-use site.
///
/// Three site shapes are recognized, each evaluated independently at every
/// node, so a single line can contribute multiple records:
/// 1. regex literals (`/ab+c/gi`),
/// 2. `new RegExp(pattern, flags?)` constructor calls,
/// 3. one-argument `search`/`match`/`matchAll` member calls.
///
/// An empty result is a valid outcome, not an error.
pub fn harvest_sites(tree: &Tree, source: &str, source_file: &str) -> Vec<StaticUsageRecord> {
    let mut records = Vec::new();
    collect(tree.root_node(), source.as_bytes(), source_file, &mut records);
    records
}

fn collect(node: Node, source: &[u8], file: &str, out: &mut Vec<StaticUsageRecord>) {
    match node.kind() {
        "regex" => harvest_literal(node, source, file, out),
        "new_expression" => harvest_constructor(node, source, file, out),
        "call_expression" => harvest_coercion(node, source, file, out),
        _ => {}
    }

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect(child, source, file, out);
        }
    }
}

/// Literal regex syntax: pattern and flags taken verbatim from the literal.
fn harvest_literal(node: Node, source: &[u8], file: &str, out: &mut Vec<StaticUsageRecord>) {
    let Some(pattern_node) = node.child_by_field_name("pattern") else {
        return;
    };
    let Some(pattern) = node_text(pattern_node, source) else {
        return;
    };
    let flags = node
        .child_by_field_name("flags")
        .and_then(|flags| node_text(flags, source))
        .unwrap_or_default();

    out.push(record(file, pattern, flags, node));
}

/// Explicit constructor invocation: `new RegExp(pattern)` or
/// `new RegExp(pattern, flags)`. Non-literal arguments become sentinels.
fn harvest_constructor(node: Node, source: &[u8], file: &str, out: &mut Vec<StaticUsageRecord>) {
    let Some(constructor) = node.child_by_field_name("constructor") else {
        return;
    };
    if constructor.kind() != "identifier"
        || node_text(constructor, source).as_deref() != Some("RegExp")
    {
        return;
    }

    let args = match node.child_by_field_name("arguments") {
        Some(arguments) => argument_nodes(arguments),
        None => Vec::new(),
    };
    if args.is_empty() || args.len() > 2 {
        return;
    }

    let pattern = string_value(args[0], source).unwrap_or_else(|| DYNAMIC_PATTERN.to_string());
    let flags = match args.get(1) {
        Some(arg) => string_value(*arg, source).unwrap_or_else(|| DYNAMIC_FLAGS.to_string()),
        None => String::new(),
    };

    out.push(record(file, pattern, flags, node));
}

/// Implicit coercion: a one-argument `search`/`match`/`matchAll` member call.
/// Implicit construction never carries flags.
fn harvest_coercion(node: Node, source: &[u8], file: &str, out: &mut Vec<StaticUsageRecord>) {
    let Some(callee) = node.child_by_field_name("function") else {
        return;
    };
    if callee.kind() != "member_expression" {
        return;
    }
    let Some(property) = callee.child_by_field_name("property") else {
        return;
    };
    let Some(method) = node_text(property, source) else {
        return;
    };
    if !COERCING_METHODS.contains(&method.as_str()) {
        return;
    }

    let Some(arguments) = node.child_by_field_name("arguments") else {
        return;
    };
    // Tagged templates also appear as call_expression; only argument lists count.
    if arguments.kind() != "arguments" {
        return;
    }
    let args = argument_nodes(arguments);
    if args.len() != 1 {
        return;
    }

    let pattern = string_value(args[0], source).unwrap_or_else(|| DYNAMIC_PATTERN.to_string());
    out.push(record(file, pattern, String::new(), node));
}

fn record(file: &str, pattern: String, flags: String, node: Node) -> StaticUsageRecord {
    StaticUsageRecord {
        source_file: file.to_string(),
        pattern,
        line_no: node.start_position().row as u32 + 1,
        flags,
    }
}

fn argument_nodes<'t>(arguments: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn node_text(node: Node, source: &[u8]) -> Option<String> {
    node.utf8_text(source).ok().map(str::to_string)
}

/// Cooked value of a string literal: quotes stripped, escape sequences
/// decoded. `None` for anything that is not a plain string literal.
fn string_value(node: Node, source: &[u8]) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }

    let mut value = String::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "string_fragment" => value.push_str(child.utf8_text(source).ok()?),
            "escape_sequence" => value.push_str(&decode_escape(child.utf8_text(source).ok()?)),
            _ => {}
        }
    }
    Some(value)
}

fn decode_escape(text: &str) -> String {
    let mut chars = text.chars();
    if chars.next() != Some('\\') {
        return text.to_string();
    }
    match chars.next() {
        Some('n') => '\n'.to_string(),
        Some('t') => '\t'.to_string(),
        Some('r') => '\r'.to_string(),
        Some('b') => '\u{0008}'.to_string(),
        Some('f') => '\u{000C}'.to_string(),
        Some('v') => '\u{000B}'.to_string(),
        Some('0') => '\0'.to_string(),
        Some('x') => decode_code_point(chars.as_str()).unwrap_or_else(|| text.to_string()),
        Some('u') => {
            let rest = chars.as_str();
            let hex = rest
                .strip_prefix('{')
                .and_then(|inner| inner.strip_suffix('}'))
                .unwrap_or(rest);
            decode_code_point(hex).unwrap_or_else(|| text.to_string())
        }
        // \\, \', \", \` and any other escaped character map to themselves.
        Some(other) => other.to_string(),
        None => text.to_string(),
    }
}

fn decode_code_point(hex: &str) -> Option<String> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .map(|c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::SourceParser;

    fn harvest(source: &str) -> Vec<StaticUsageRecord> {
        let mut parser = SourceParser::new().unwrap();
        let tree = parser.parse(source).expect("test source should parse");
        harvest_sites(&tree, source, "test.js")
    }

    #[test]
    fn literal_regex_site() {
        let records = harvest("const r = /ab+c/gi;\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pattern, "ab+c");
        assert_eq!(records[0].flags, "gi");
        assert_eq!(records[0].line_no, 1);
        assert_eq!(records[0].source_file, "test.js");
    }

    #[test]
    fn literal_without_flags() {
        let records = harvest("const r = /end$/;\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pattern, "end$");
        assert_eq!(records[0].flags, "");
    }

    #[test]
    fn constructor_with_literal_arguments() {
        let records = harvest(r#"const r = new RegExp('a\\d+', 'g');"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pattern, r"a\d+");
        assert_eq!(records[0].flags, "g");
    }

    #[test]
    fn constructor_with_dynamic_pattern() {
        let records = harvest("const r = new RegExp(userInput);\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pattern, DYNAMIC_PATTERN);
        assert_eq!(records[0].flags, "");
    }

    #[test]
    fn constructor_with_computed_pattern_is_dynamic() {
        let records = harvest(r#"const r = new RegExp("a" + suffix);"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pattern, DYNAMIC_PATTERN);
    }

    #[test]
    fn constructor_with_dynamic_flags() {
        let records = harvest(r#"const r = new RegExp('a', flagVar);"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pattern, "a");
        assert_eq!(records[0].flags, DYNAMIC_FLAGS);
    }

    #[test]
    fn constructor_without_flags_argument() {
        let records = harvest(r#"const r = new RegExp('a');"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].flags, "");
    }

    #[test]
    fn other_constructors_are_ignored() {
        let records = harvest("const m = new Map(entries);\n");
        assert!(records.is_empty());
    }

    #[test]
    fn coercing_methods_with_string_argument() {
        let records = harvest(
            "s.search('needle');\ns.match('ab');\ns.matchAll('cd');\n",
        );
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].pattern, "needle");
        assert_eq!(records[1].pattern, "ab");
        assert_eq!(records[2].pattern, "cd");
        assert!(records.iter().all(|r| r.flags.is_empty()));
        assert_eq!(records[0].line_no, 1);
        assert_eq!(records[1].line_no, 2);
        assert_eq!(records[2].line_no, 3);
    }

    #[test]
    fn coercing_method_with_non_literal_argument() {
        let records = harvest("s.match(someRegex);\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pattern, DYNAMIC_PATTERN);
        assert_eq!(records[0].flags, "");
    }

    #[test]
    fn coercing_method_needs_exactly_one_argument() {
        let records = harvest("s.match(a, b);\ns.search();\n");
        assert!(records.is_empty());
    }

    #[test]
    fn non_coercing_methods_are_ignored() {
        let records = harvest("s.split('x');\ns.replace('a', 'b');\n");
        assert!(records.is_empty());
    }

    #[test]
    fn one_line_can_contribute_multiple_records() {
        let records = harvest("if (/a/.test(s) && s.match('b')) {}\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pattern, "a");
        assert_eq!(records[1].pattern, "b");
        assert_eq!(records[0].line_no, 1);
        assert_eq!(records[1].line_no, 1);
    }

    #[test]
    fn repeated_sites_are_not_deduplicated() {
        let records = harvest("const a = /x/;\nconst b = /x/;\n");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn line_numbers_are_one_based_source_positions() {
        let source = "\n\nconst a = /first/;\nconst b = new RegExp('second');\n";
        let records = harvest(source);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pattern, "first");
        assert_eq!(records[0].line_no, 3);
        assert_eq!(records[1].pattern, "second");
        assert_eq!(records[1].line_no, 4);
    }

    #[test]
    fn string_escapes_are_decoded() {
        let records = harvest(r#"const r = new RegExp('\nA\\w');"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pattern, "\nA\\w");
    }

    #[test]
    fn zero_sites_is_a_valid_result() {
        let records = harvest("const x = 1 + 2;\n");
        assert!(records.is_empty());
    }
}
