use pulldown_cmark::{Event, Parser, Tag};

/// Flatten markdown into plain printable lines.
///
/// Paragraphs, headings and code lines become one line each; list items get
/// a bullet or their number; line breaks inside a paragraph are kept.
pub fn to_plain_lines(text: &str) -> Vec<String> {
    let mut out = LineBuffer::default();
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut in_code = false;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::Paragraph)
            | Event::End(Tag::Paragraph)
            | Event::Start(Tag::Heading(..))
            | Event::End(Tag::Heading(..))
            | Event::End(Tag::Item) => out.flush(),
            Event::Start(Tag::List(start)) => {
                out.flush();
                lists.push(start);
            }
            Event::End(Tag::List(_)) => {
                out.flush();
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                out.flush();
                let indent = "  ".repeat(lists.len().saturating_sub(1));
                let marker = match lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                out.prefix = Some(format!("{indent}{marker}"));
            }
            Event::Start(Tag::CodeBlock(_)) => {
                out.flush();
                in_code = true;
            }
            Event::End(Tag::CodeBlock(_)) => {
                out.flush();
                in_code = false;
            }
            Event::Text(t) if in_code => {
                let mut parts = t.split('\n').peekable();
                while let Some(part) = parts.next() {
                    out.push(part);
                    if parts.peek().is_some() {
                        out.flush();
                    }
                }
            }
            Event::Text(t) | Event::Code(t) => out.push(&t),
            Event::SoftBreak | Event::HardBreak => out.flush(),
            Event::Rule => {
                out.flush();
                out.lines.push("----------".to_string());
            }
            Event::TaskListMarker(done) => out.push(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }
    out.flush();
    out.lines
}

#[derive(Default)]
struct LineBuffer {
    lines: Vec<String>,
    current: String,
    /// List marker waiting for the item's first text.
    prefix: Option<String>,
}

impl LineBuffer {
    fn push(&mut self, text: &str) {
        if self.current.is_empty() {
            if let Some(prefix) = self.prefix.take() {
                self.current.push_str(&prefix);
            }
        }
        self.current.push_str(text);
    }

    fn flush(&mut self) {
        let line = self.current.trim_end();
        if !line.trim().is_empty() {
            self.lines.push(line.to_string());
        }
        self.current.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_become_lines() {
        assert_eq!(
            to_plain_lines("first paragraph\n\nsecond paragraph"),
            vec!["first paragraph", "second paragraph"]
        );
    }

    #[test]
    fn line_breaks_inside_paragraph_are_kept() {
        assert_eq!(to_plain_lines("a = 1\nb = 2"), vec!["a = 1", "b = 2"]);
    }

    #[test]
    fn emphasis_is_flattened() {
        assert_eq!(to_plain_lines("**정답**: 3"), vec!["정답: 3"]);
        assert_eq!(to_plain_lines("use `x + 1` here"), vec!["use x + 1 here"]);
    }

    #[test]
    fn bullet_and_numbered_lists() {
        assert_eq!(to_plain_lines("- a\n- b"), vec!["• a", "• b"]);
        assert_eq!(to_plain_lines("1. x\n2. y"), vec!["1. x", "2. y"]);
        assert_eq!(to_plain_lines("3. x\n4. y"), vec!["3. x", "4. y"]);
    }

    #[test]
    fn loose_list_items_keep_marker() {
        assert_eq!(to_plain_lines("- a\n\n- b"), vec!["• a", "• b"]);
    }

    #[test]
    fn nested_list_indents() {
        assert_eq!(
            to_plain_lines("- outer\n  - inner"),
            vec!["• outer", "  • inner"]
        );
    }

    #[test]
    fn headings_and_code_blocks() {
        assert_eq!(
            to_plain_lines("# 풀이\n\n```\nx = 1\ny = 2\n```"),
            vec!["풀이", "x = 1", "y = 2"]
        );
    }

    #[test]
    fn choice_markers_survive() {
        assert_eq!(
            to_plain_lines("Pick one\n(1) 2\n(2) 3"),
            vec!["Pick one", "(1) 2", "(2) 3"]
        );
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(to_plain_lines("").is_empty());
        assert!(to_plain_lines("   \n\n").is_empty());
    }
}
