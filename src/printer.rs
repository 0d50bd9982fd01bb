// AST pretty-printer (§4.5, §6 "prints the annotated AST to standard
// output").
//
// A `Visitor` implementation rather than a hand-rolled walk, per §9's
// visitor-with-config design note: every other pass in this crate is
// one too, and the printer's needs (indent on enter, dedent on exit) are
// exactly what the trait's enter/exit pairing was built for. Each
// expression node is rendered as `(tag ...children... :type)`, where
// `:type` and a folded `=value` are only present once the type resolver
// has actually filled them in — an un-annotated tree (if printed before
// resolution) renders with bare tags and no trailing annotations.

use std::fmt::Write;

use crate::ast::{Argument, Constant, Expr, ExprKind, File, Function, Statement, StatementKind};
use crate::visitor::{walk_file, Visitor};

pub fn print_file(file: &File) -> String {
    let mut printer = Printer::default();
    walk_file(&mut printer, file);
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn open(&mut self, head: impl AsRef<str>) {
        self.line(format!("({}", head.as_ref()));
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent -= 1;
        self.line(")");
    }
}

impl Visitor for Printer {
    fn enter_file(&mut self, _file: &File) {
        self.open("file");
    }

    fn exit_file(&mut self, _file: &File) {
        self.close();
    }

    fn enter_statement(&mut self, stmt: &Statement) {
        if let Some(doc) = &stmt.doc {
            for line in doc.lines() {
                self.line(format!(";; {}", line));
            }
        }
        for flag in &stmt.flags {
            self.line(format!("@{:?}", flag).to_lowercase());
        }
    }

    fn exit_statement(&mut self, _stmt: &Statement) {}

    fn enter_constant(&mut self, c: &Constant) {
        self.open(format!("const {}", c.name));
    }

    fn exit_constant(&mut self, _c: &Constant) {
        self.close();
    }

    fn enter_function(&mut self, f: &Function) {
        let mut head = format!("proc {}", f.name);
        if f.meta.recursive {
            head.push_str(" recursive");
        }
        if f.meta.entry_point {
            head.push_str(" entry-point");
        }
        self.open(head);
    }

    fn exit_function(&mut self, f: &Function) {
        if let Some(ty) = &*f.resolved_return_type.borrow() {
            self.line(format!("returns {}", ty));
        }
        self.close();
    }

    fn enter_argument(&mut self, a: &Argument) {
        let marker = if a.mutable { "param mut" } else { "param" };
        self.open(format!("{} {}", marker, a.name));
    }

    fn exit_argument(&mut self, _a: &Argument) {
        self.close();
    }

    fn enter_expr(&mut self, e: &Expr) {
        let head = match &e.kind {
            ExprKind::Identifier(_) => return, // rendered by visit_identifier_usage
            ExprKind::Integer { .. } => return, // rendered by visit_integer
            ExprKind::Str(_) => return,         // rendered by visit_string
            ExprKind::Binary(op, ..) => format!("{:?}", op).to_lowercase(),
            ExprKind::Unary(op, _) => format!("{:?}", op).to_lowercase(),
            ExprKind::Call(..) => "call".to_string(),
            ExprKind::Group(_) => "group".to_string(),
            ExprKind::FieldAccess(_, segment) => format!("field-access {}", segment),
            ExprKind::Cond(..) => "cond".to_string(),
        };
        self.open(head);
    }

    fn exit_expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Identifier(name) => self.annotate_leaf(e, name),
            ExprKind::Integer { digits, type_flag } => {
                let label = match type_flag {
                    Some(flag) => format!("{}{}", digits, flag),
                    None => digits.clone(),
                };
                self.annotate_leaf(e, &label);
            }
            ExprKind::Str(text) => self.annotate_leaf(e, &format!("{:?}", text)),
            _ => self.close(),
        }
    }

    fn visit_identifier_usage(&mut self, _e: &Expr, _name: &str) {}

    fn visit_integer(&mut self, _e: &Expr, _digits: &str, _type_flag: Option<&str>) {}

    fn visit_string(&mut self, _e: &Expr, _text: &str) {}
}

impl Printer {
    // Leaf nodes (identifier/integer/string) don't get an enter_expr
    // opening paren — print the whole `(tag text :type =value)` form
    // here, in `exit_expr`, once the leaf's own text is known.
    fn annotate_leaf(&mut self, e: &Expr, text: &str) {
        let cache = e.cache.borrow();
        let mut rendered = format!("({}", text);
        if let Some(ty) = &cache.ty {
            let _ = write!(rendered, " :{}", ty);
        }
        if let Some(value) = &cache.value {
            let _ = write!(rendered, " ={:?}", value);
        }
        rendered.push(')');
        self.line(rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::ids::IdentifierStorage;
    use crate::resolver::IdentifierResolver;
    use crate::typecheck::TypeResolver;

    fn compile(src: &str) -> File {
        let mut diagnostics = Diagnostics::new();
        let file = crate::parser::parse(src.as_bytes(), 0, &mut diagnostics);
        let mut storage = IdentifierStorage::new();
        IdentifierResolver::new(&mut storage, &mut diagnostics).resolve_file(&file);
        TypeResolver::new(&mut storage, &mut diagnostics).resolve_file(&file);
        file
    }

    #[test]
    fn prints_a_resolved_constant_with_its_type_and_value() {
        let file = compile("const a = 1 + 2;");
        let text = print_file(&file);
        assert!(text.contains("(const a"));
        assert!(text.contains(":ct_int"));
        assert!(text.contains("=Integer"));
    }

    #[test]
    fn prints_function_metadata() {
        let file = compile("proc recursive f(param x: i4) returns i4 is begin return f x; end");
        let text = print_file(&file);
        assert!(text.contains("proc f recursive"));
        assert!(text.contains("param x"));
    }

    #[test]
    fn doc_comment_renders_as_a_leading_line_comment() {
        let file = compile("/// explains a\nconst a = 1;");
        let text = print_file(&file);
        assert!(text.contains(";; explains a"));
    }
}
