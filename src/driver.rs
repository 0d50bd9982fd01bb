// Pipeline orchestration and diagnostic rendering for the CLI (§6).
//
// `compile` wires the phases together in the one-way order §2 describes
// (lex inside the parser, then identifier resolution, then type
// resolution) and stops early the moment an earlier phase fails, per §7's
// "a phase that returns failure prevents downstream phases from
// running". `render_diagnostics` fulfils the external renderer contract
// of §6 well enough for a CLI to use directly: `path:line:col: kind:
// message`, followed by the covered source line with the span
// underlined. A GUI or editor integration wanting color or multi-line
// gutters would still implement its own renderer against the same
// `Diagnostics` data; this one only needs to be good enough for a
// terminal.

use std::fmt::Write as _;

use crate::ast::File;
use crate::diagnostics::{Diagnostics, Kind};
use crate::ids::IdentifierStorage;
use crate::resolver::IdentifierResolver;
use crate::source::{FileId, Sources, Span};
use crate::typecheck::TypeResolver;

pub struct CompileResult {
    pub file: File,
    pub storage: IdentifierStorage,
    pub diagnostics: Diagnostics,
    // Identifier resolution and type resolution both ran (lexing and
    // parsing, being purely accumulative, always "run" as far as this
    // flag is concerned). `false` means identifier resolution itself
    // failed and the tree's types were never even attempted.
    pub fully_resolved: bool,
}

impl CompileResult {
    // §6: "Exit code 0 on success, nonzero if any diagnostic of kind
    // `error` was emitted."
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

pub fn compile(bytes: &[u8], file_id: FileId) -> CompileResult {
    let mut diagnostics = Diagnostics::new();
    log::debug!("parsing file {}", file_id);
    let file = crate::parser::parse(bytes, file_id, &mut diagnostics);

    let mut storage = IdentifierStorage::new();
    log::debug!("resolving identifiers");
    let fully_resolved = IdentifierResolver::new(&mut storage, &mut diagnostics).resolve_file(&file);
    if fully_resolved {
        log::debug!("resolving types");
        TypeResolver::new(&mut storage, &mut diagnostics).resolve_file(&file);
    } else {
        log::debug!("identifier resolution failed; skipping type resolution");
    }

    CompileResult { file, storage, diagnostics, fully_resolved }
}

// Render every accumulated diagnostic, in insertion order, against the
// loaded source text in `sources`. Colors are explicitly out of scope
// (§6: "Colors are optional"); this renderer never emits any.
pub fn render_diagnostics(sources: &Sources, diagnostics: &Diagnostics) -> String {
    let mut out = String::new();
    for message in diagnostics.messages() {
        render_one(&mut out, sources, message.kind, &message.text, message.span, message.primary);
    }
    out
}

fn render_one(out: &mut String, sources: &Sources, kind: Kind, text: &str, span: Span, primary: bool) {
    let file = sources.get(span.start.file);
    let _ = writeln!(out, "{}:{}: {}: {}", file.path_display(), span.start, kind, text);

    let lines = file.lines();
    let line_no = span.start.line as usize;
    if let Some(line) = lines.get(line_no) {
        let gutter = if primary { "  " } else { "    " };
        let _ = writeln!(out, "{}{}", gutter, line);
        let underline_start = span.start.column as usize;
        let underline_len = if span.end.line == span.start.line {
            (span.end.column as usize).saturating_sub(underline_start).max(1)
        } else {
            line.len().saturating_sub(underline_start).max(1)
        };
        let marker = if primary { '^' } else { '-' };
        let _ = writeln!(out, "{}{}{}", gutter, " ".repeat(underline_start), marker.to_string().repeat(underline_len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_compile_has_no_errors() {
        let result = compile(b"const a: i4 = 1 + 2;", 0);
        assert!(result.succeeded());
        assert!(result.fully_resolved);
    }

    #[test]
    fn identifier_failure_skips_type_resolution() {
        let result = compile(b"const a = a;", 0);
        assert!(!result.succeeded());
        assert!(!result.fully_resolved);
    }

    #[test]
    fn render_diagnostics_includes_path_and_line() {
        let mut sources = Sources::new();
        let id = sources.add_blob("<test>", b"const a = a;".to_vec());
        let result = compile(b"const a = a;", id);
        let rendered = render_diagnostics(&sources, &result.diagnostics);
        assert!(rendered.contains("<test>:1:"));
        assert!(rendered.contains("error:"));
    }
}
