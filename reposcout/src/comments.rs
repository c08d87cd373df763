use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

use crate::filters::normalized_extension;

/// Comment syntax of one file type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSyntax {
    /// Markers that comment out the rest of the line
    pub single_line: &'static [&'static str],
    /// (start, end) token pairs of block comments
    pub multi_line: &'static [(&'static str, &'static str)],
}

impl CommentSyntax {
    pub fn is_empty(&self) -> bool {
        self.single_line.is_empty() && self.multi_line.is_empty()
    }
}

const C_STYLE: CommentSyntax = CommentSyntax {
    single_line: &["//"],
    multi_line: &[("/*", "*/")],
};

const HASH_ONLY: CommentSyntax = CommentSyntax {
    single_line: &["#"],
    multi_line: &[],
};

const MARKUP: CommentSyntax = CommentSyntax {
    single_line: &[],
    multi_line: &[("<!--", "-->")],
};

const NONE: CommentSyntax = CommentSyntax {
    single_line: &[],
    multi_line: &[],
};

static COMMENT_SYNTAX: Lazy<HashMap<&'static str, CommentSyntax>> = Lazy::new(|| {
    HashMap::from([
        (
            ".py",
            CommentSyntax {
                single_line: &["#"],
                multi_line: &[("\"\"\"", "\"\"\""), ("'''", "'''")],
            },
        ),
        (".java", C_STYLE),
        (".js", C_STYLE),
        (".jsx", C_STYLE),
        (".ts", C_STYLE),
        (".tsx", C_STYLE),
        (".c", C_STYLE),
        (".h", C_STYLE),
        (".cpp", C_STYLE),
        (".hpp", C_STYLE),
        (".cs", C_STYLE),
        (".go", C_STYLE),
        (".rs", C_STYLE),
        (".swift", C_STYLE),
        (".kt", C_STYLE),
        (".scala", C_STYLE),
        (
            ".php",
            CommentSyntax {
                single_line: &["//", "#"],
                multi_line: &[("/*", "*/")],
            },
        ),
        (
            ".css",
            CommentSyntax {
                single_line: &[],
                multi_line: &[("/*", "*/")],
            },
        ),
        (
            ".sql",
            CommentSyntax {
                single_line: &["--"],
                multi_line: &[("/*", "*/")],
            },
        ),
        (".html", MARKUP),
        (".xml", MARKUP),
        (
            ".jsp",
            CommentSyntax {
                single_line: &[],
                multi_line: &[("<%--", "--%>"), ("<!--", "-->")],
            },
        ),
        (".sh", HASH_ONLY),
        (".yaml", HASH_ONLY),
        (".yml", HASH_ONLY),
        (".toml", HASH_ONLY),
        (
            ".rb",
            CommentSyntax {
                single_line: &["#"],
                multi_line: &[("=begin", "=end")],
            },
        ),
        (".txt", NONE),
    ])
});

/// Looks up the comment syntax for a dot-prefixed, lower-cased extension.
///
/// Unknown extensions and extensions without any comment syntax yield None.
pub fn syntax_for_extension(ext: &str) -> Option<&'static CommentSyntax> {
    COMMENT_SYNTAX
        .get(ext.to_lowercase().as_str())
        .filter(|syntax| !syntax.is_empty())
}

/// Looks up the comment syntax for a file
pub fn syntax_for_path(path: &Path) -> Option<&'static CommentSyntax> {
    normalized_extension(path).and_then(|ext| syntax_for_extension(&ext))
}

/// What is left of a physical line once comments are removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Whitespace only, outside any comment
    Blank,
    /// Nothing but comment text
    Comment,
    /// Code remaining after comment removal
    Code(String),
}

impl LineClass {
    pub fn is_comment(&self) -> bool {
        matches!(self, LineClass::Comment)
    }

    /// The remaining code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            LineClass::Code(code) => Some(code),
            _ => None,
        }
    }
}

/// Finds the earliest single-line marker that is not inside a quoted string.
///
/// Tracks single/double quote state and backslash escapes. When several markers start at
/// the same offset, the longest one wins.
pub fn first_unquoted_marker(line: &str, markers: &[&'static str]) -> Option<(usize, &'static str)> {
    if markers.is_empty() {
        return None;
    }

    let mut in_squote = false;
    let mut in_dquote = false;
    let mut escape = false;

    for (i, ch) in line.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => {
                escape = true;
                continue;
            }
            '\'' if !in_dquote => {
                in_squote = !in_squote;
                continue;
            }
            '"' if !in_squote => {
                in_dquote = !in_dquote;
                continue;
            }
            _ => {}
        }

        if !in_squote && !in_dquote {
            let rest = &line[i..];
            if let Some(marker) = markers
                .iter()
                .filter(|m| rest.starts_with(**m))
                .max_by_key(|m| m.len())
            {
                return Some((i, *marker));
            }
        }
    }
    None
}

/// Per-file comment stripping state machine.
///
/// Lines must be fed in order: an unterminated block comment carries over to the following
/// lines until the end token of that same block shows up.
#[derive(Debug, Clone)]
pub struct CommentFilter {
    syntax: Option<&'static CommentSyntax>,
    open_block_end: Option<&'static str>,
}

impl CommentFilter {
    pub fn new(syntax: Option<&'static CommentSyntax>) -> Self {
        Self {
            syntax,
            open_block_end: None,
        }
    }

    /// Creates a filter for the comment syntax of `path`
    pub fn for_path(path: &Path) -> Self {
        Self::new(syntax_for_path(path))
    }

    /// Whether an unterminated block comment is open
    pub fn in_block(&self) -> bool {
        self.open_block_end.is_some()
    }

    /// Classifies the next physical line (without its line terminator)
    pub fn classify(&mut self, line: &str) -> LineClass {
        let Some(syntax) = self.syntax else {
            return if line.trim().is_empty() {
                LineClass::Blank
            } else {
                LineClass::Code(line.to_string())
            };
        };

        let mut text = line;
        if let Some(end) = self.open_block_end {
            match text.find(end) {
                Some(pos) => {
                    text = &text[pos + end.len()..];
                    self.open_block_end = None;
                }
                None => return LineClass::Comment,
            }
        } else if line.trim().is_empty() {
            return LineClass::Blank;
        }

        let code = self.strip(text, syntax);
        let remaining = code.trim();
        if remaining.is_empty() {
            return LineClass::Comment;
        }
        if matches!(first_unquoted_marker(remaining, syntax.single_line), Some((0, _))) {
            return LineClass::Comment;
        }
        LineClass::Code(code)
    }

    /// Removes block spans and the single-line tail from `text`, opening a block when one
    /// does not close on this line.
    fn strip(&mut self, text: &str, syntax: &'static CommentSyntax) -> String {
        let mut text = text.to_string();

        loop {
            let single = first_unquoted_marker(&text, syntax.single_line).map(|(pos, _)| pos);
            let block = earliest_block_start(&text, syntax);

            match (single, block) {
                (Some(s), Some((b, _, _))) if s < b => {
                    text.truncate(s);
                    break;
                }
                (Some(s), None) => {
                    text.truncate(s);
                    break;
                }
                (_, Some((b, start, end))) => {
                    let search_from = b + start.len();
                    match text[search_from..].find(end) {
                        Some(rel) => {
                            let close = search_from + rel + end.len();
                            text.replace_range(b..close, "");
                        }
                        None => {
                            text.truncate(b);
                            self.open_block_end = Some(end);
                            break;
                        }
                    }
                }
                (None, None) => break,
            }
        }

        text
    }
}

/// Earliest block start in `text`; ties keep table order.
///
/// In languages with line comments, starts inside a quoted string are skipped. Tokens made
/// of quote characters (Python docstrings) and markup comments use a plain search.
fn earliest_block_start(
    text: &str,
    syntax: &CommentSyntax,
) -> Option<(usize, &'static str, &'static str)> {
    let mut earliest: Option<(usize, &'static str, &'static str)> = None;
    for &(start, end) in syntax.multi_line {
        let quote_aware = !syntax.single_line.is_empty() && !start.starts_with(['\'', '"']);
        let found = if quote_aware {
            first_unquoted_marker(text, &[start]).map(|(pos, _)| pos)
        } else {
            text.find(start)
        };
        if let Some(pos) = found {
            if earliest.map_or(true, |(best, _, _)| pos < best) {
                earliest = Some((pos, start, end));
            }
        }
    }
    earliest
}
