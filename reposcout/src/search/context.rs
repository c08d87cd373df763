use crate::comments::LineClass;
use crate::config::ContextConfig;

/// Builds the context window ("subscan") around a matching line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextExtractor {
    before: usize,
    after: usize,
}

impl ContextExtractor {
    pub fn new(before: usize, after: usize) -> Self {
        Self { before, after }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        let (before, after) = config.window();
        Self::new(before, after)
    }

    pub fn before(&self) -> usize {
        self.before
    }

    pub fn after(&self) -> usize {
        self.after
    }

    /// Assembles the window around `lines[idx]`.
    ///
    /// `lines` hold the raw file lines including their terminators. When `classes` is
    /// given, comment-only lines are left out and do not take up a window slot. A lone
    /// `\r` terminator becomes `\n`; other terminators are kept. Only trailing whitespace
    /// at the end of the block is trimmed.
    pub fn extract(&self, lines: &[&str], classes: Option<&[LineClass]>, idx: usize) -> String {
        if idx >= lines.len() {
            return String::new();
        }
        let is_content = |i: usize| classes.map_or(true, |c| !c.get(i).is_some_and(LineClass::is_comment));

        let mut before: Vec<usize> = (0..idx)
            .rev()
            .filter(|&i| is_content(i))
            .take(self.before)
            .collect();
        before.reverse();

        let after = (idx + 1..lines.len())
            .filter(|&i| is_content(i))
            .take(self.after);

        let mut block = String::new();
        for i in before.into_iter().chain(std::iter::once(idx)).chain(after) {
            match lines[i].strip_suffix('\r') {
                Some(body) => {
                    block.push_str(body);
                    block.push('\n');
                }
                None => block.push_str(lines[i]),
            }
        }
        block.truncate(block.trim_end().len());
        block
    }
}
