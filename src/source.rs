// Source location tracking and file storage.
//
// A `Location` is a (file, byte index, line, column) tuple. Line and
// column are stored 0-based and displayed 1-based (see `Location::fmt`
// in diagnostics rendering). Locations are always paired as `[start,
// end)` ranges on tokens, AST nodes, and diagnostics.
//
// `Sources` is a process-lifetime table from `FileId` to file content.
// A file starts out either as an in-memory blob or as an unloaded path
// on disk; loading a path-backed file is one-way (loaded files never
// return to unloaded). Adding a file for a path that is already known
// is an error — the driver is expected to look up an existing `FileId`
// instead of re-adding it.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

pub type FileId = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: FileId,
    pub index: usize,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn start(file: FileId) -> Location {
        Location { file, index: 0, line: 0, column: 0 }
    }
}

impl fmt::Display for Location {
    // Lines and columns are stored 0-based; displayed 1-based.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

// A located, half-open `[start, end)` span.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub fn new(start: Location, end: Location) -> Span {
        debug_assert!(start.index <= end.index);
        Span { start, end }
    }

    // True iff `self` lies entirely within `other`, inclusive of equal
    // bounds. Used to check the parent/child range invariant (§8.2).
    pub fn contains(&self, other: &Span) -> bool {
        self.start.index <= other.start.index && other.end.index <= self.end.index
    }
}

enum Contents {
    Blob(Vec<u8>),
    Unloaded(PathBuf),
    Loaded(PathBuf, Vec<u8>),
}

pub struct SourceFile {
    path_display: String,
    contents: Contents,
}

impl SourceFile {
    // Bytes of the file, if it has been loaded (or was always a blob).
    // Returns `None` for a path-backed file that has not yet been
    // loaded by `Sources::load`.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Blob(b) => Some(b),
            Contents::Unloaded(_) => None,
            Contents::Loaded(_, b) => Some(b),
        }
    }

    pub fn path_display(&self) -> &str {
        &self.path_display
    }

    // The source text, split into lines, for diagnostic rendering.
    // Loading strips no characters: `\r` stays embedded in the line
    // (it is whitespace, not a line break, per §4.2).
    pub fn lines(&self) -> Vec<&str> {
        match self.bytes() {
            Some(bytes) => {
                let text = std::str::from_utf8(bytes).unwrap_or("");
                text.split('\n').collect()
            }
            None => Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct Sources {
    files: Vec<SourceFile>,
    by_path: HashMap<PathBuf, FileId>,
}

impl Sources {
    pub fn new() -> Sources {
        Sources { files: Vec::new(), by_path: HashMap::new() }
    }

    // Register an in-memory source blob (e.g. for tests). Never fails:
    // blobs have no path to collide on.
    pub fn add_blob(&mut self, display_name: impl Into<String>, contents: Vec<u8>) -> FileId {
        let id = self.files.len() as FileId;
        self.files.push(SourceFile {
            path_display: display_name.into(),
            contents: Contents::Blob(contents),
        });
        id
    }

    // Register a path on disk without reading it yet. Fails (returns
    // `None`) if the path has already been added.
    pub fn add_path(&mut self, path: PathBuf) -> Option<FileId> {
        if self.by_path.contains_key(&path) {
            return None;
        }
        let id = self.files.len() as FileId;
        let display = path.display().to_string();
        self.by_path.insert(path.clone(), id);
        self.files.push(SourceFile { path_display: display, contents: Contents::Unloaded(path) });
        Some(id)
    }

    // Transition a path-backed file from unloaded to loaded. A no-op
    // (returns the existing bytes) if already loaded; not applicable
    // to blob-backed files.
    pub fn load(&mut self, id: FileId) -> std::io::Result<&[u8]> {
        let file = &mut self.files[id as usize];
        if let Contents::Unloaded(path) = &file.contents {
            let bytes = std::fs::read(path)?;
            file.contents = Contents::Loaded(path.clone(), bytes);
        }
        Ok(file.bytes().unwrap_or(&[]))
    }

    pub fn get(&self, id: FileId) -> &SourceFile {
        &self.files[id as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_is_immediately_available() {
        let mut sources = Sources::new();
        let id = sources.add_blob("<test>", b"const a = 1;".to_vec());
        assert_eq!(sources.get(id).bytes(), Some(&b"const a = 1;"[..]));
    }

    #[test]
    fn adding_same_path_twice_fails() {
        let mut sources = Sources::new();
        let path = PathBuf::from("/tmp/does-not-exist.nl");
        assert!(sources.add_path(path.clone()).is_some());
        assert!(sources.add_path(path).is_none());
    }

    #[test]
    fn span_contains_respects_half_open_bounds() {
        let file = 0;
        let loc = |index: usize| Location { file, index, line: 0, column: index as u32 };
        let outer = Span::new(loc(0), loc(10));
        let inner = Span::new(loc(2), loc(10));
        assert!(outer.contains(&inner));
        let escapes = Span::new(loc(2), loc(11));
        assert!(!outer.contains(&escapes));
    }
}
