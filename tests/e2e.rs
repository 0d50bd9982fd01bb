// End-to-end scenarios (§8) driving the full pipeline (lex -> parse ->
// resolve identifiers -> resolve types -> evaluate) from source text,
// the same code path the CLI itself uses (`nlc::driver::compile`).

use nlc::ast::StatementKind;
use nlc::driver::compile;
use nlc::ids::IdentifierStorage;
use nlc::types::{IntTag, Variant};

fn const_value(file: &nlc::ast::File, storage: &IdentifierStorage, name: &str) -> Variant {
    for stmt in &file.statements {
        if let StatementKind::Constant(c) = &stmt.kind {
            if c.name == name {
                let id = c.identifier.borrow().expect("scouted");
                return storage.get(id).value.borrow().clone().expect("folded");
            }
        }
    }
    panic!("no constant named {}", name);
}

#[test]
fn builtin_arithmetic() {
    let result = compile(b"const a: i4 = 1 + 2;", 0);
    assert!(result.succeeded());
    let i4 = IntTag::from_name("i4").unwrap();
    assert_eq!(const_value(&result.file, &result.storage, "a"), Variant::Integer(3, i4));
}

#[test]
fn peer_resolution_with_ct_int() {
    let result = compile(b"const a: i4 = 1 + 2ct;", 0);
    assert!(result.succeeded());
    let i4 = IntTag::from_name("i4").unwrap();
    assert_eq!(const_value(&result.file, &result.storage, "a"), Variant::Integer(3, i4));
}

#[test]
fn overshadowing_declaration() {
    let result = compile(b"const a = 1; const a = 2;", 0);
    assert!(!result.succeeded());
    let messages = result.diagnostics.messages();
    let errors: Vec<_> = messages.iter().filter(|m| m.kind == nlc::diagnostics::Kind::Error).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].text.contains("overshadows a previous declaration"));
}

#[test]
fn forward_reference_resolves_in_two_passes() {
    let result = compile(b"const a = b; const b = 3;", 0);
    assert!(result.succeeded());
    assert_eq!(
        const_value(&result.file, &result.storage, "a"),
        Variant::Integer(3, IntTag::CT_INT)
    );
}

#[test]
fn self_reference_is_invalid_recursion() {
    let result = compile(b"const a = a;", 0);
    assert!(!result.succeeded());
    assert!(!result.fully_resolved);
    let messages = result.diagnostics.messages();
    assert!(messages.iter().any(|m| m.text.contains("Invalid recursive use of 'a'")));
}

#[test]
fn operator_mismatch_reports_coercion_failure() {
    let result = compile(b"const a: bool = 1 + 2;", 0);
    assert!(!result.succeeded());
    let messages = result.diagnostics.messages();
    assert!(messages.iter().any(|m| m.text.contains("cannot be coerced to")));
}

#[test]
fn empty_file_has_no_statements_and_no_diagnostics() {
    let result = compile(b"", 0);
    assert!(result.succeeded());
    assert!(result.file.statements.is_empty());
    assert!(result.diagnostics.messages().is_empty());
}

#[test]
fn lone_unterminated_string_yields_exactly_one_lexical_error() {
    let result = compile(b"const a = \"oops;", 0);
    assert!(!result.succeeded());
    assert_eq!(result.diagnostics.error_count(), 1);
    assert!(result.file.statements.is_empty());
}

#[test]
fn printer_renders_annotated_constant() {
    let result = compile(b"const a = 1 + 2;", 0);
    let text = nlc::printer::print_file(&result.file);
    assert!(text.contains(":ct_int"));
}
