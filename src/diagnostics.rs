// Append-only diagnostics sink (§4.1).
//
// Every phase of the pipeline shares one `Diagnostics` instance and
// only ever appends to it. Ordering is insertion order; the renderer
// (an external collaborator per §6) is free to re-group messages by
// source range but must preserve relative order within a range.

use std::fmt;

use crate::source::Span;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Error,
    Warning,
    Note,
    Verbose,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Kind::Error => "error",
            Kind::Warning => "warning",
            Kind::Note => "note",
            Kind::Verbose => "verbose",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug)]
pub struct Message {
    pub kind: Kind,
    pub text: String,
    // Secondary notes (e.g. "previous declaration here") render with a
    // narrower gutter than a `primary` message.
    pub primary: bool,
    pub span: Span,
}

#[derive(Default)]
pub struct Diagnostics {
    messages: Vec<Message>,
    errors: usize,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics { messages: Vec::new(), errors: 0 }
    }

    pub fn push_error(&mut self, span: Span, text: impl Into<String>) {
        let text = text.into();
        log::debug!("diagnostic error at {}: {}", span.start, text);
        self.errors += 1;
        self.messages.push(Message { kind: Kind::Error, text, primary: true, span });
    }

    pub fn push_note(&mut self, span: Span, text: impl Into<String>) {
        self.messages.push(Message { kind: Kind::Note, text: text.into(), primary: false, span });
    }

    pub fn push_warning(&mut self, span: Span, text: impl Into<String>) {
        self.messages.push(Message { kind: Kind::Warning, text: text.into(), primary: true, span });
    }

    pub fn push_verbose(&mut self, span: Span, text: impl Into<String>) {
        self.messages.push(Message { kind: Kind::Verbose, text: text.into(), primary: false, span });
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;

    fn span() -> Span {
        let loc = Location { file: 0, index: 0, line: 0, column: 0 };
        Span::new(loc, loc)
    }

    #[test]
    fn counts_only_errors() {
        let mut d = Diagnostics::new();
        d.push_warning(span(), "a warning");
        d.push_note(span(), "a note");
        assert_eq!(d.error_count(), 0);
        assert!(!d.has_errors());
        d.push_error(span(), "an error");
        assert_eq!(d.error_count(), 1);
        assert!(d.has_errors());
        assert_eq!(d.messages().len(), 3);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut d = Diagnostics::new();
        d.push_error(span(), "first");
        d.push_note(span(), "second");
        d.push_warning(span(), "third");
        let texts: Vec<&str> = d.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }
}
