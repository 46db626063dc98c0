//! Template data model: statements, nodes, tests, and text segments.
//!
//! A [`Template`] is an ordered list of [`TemplateNode`]s. Each node carries
//! a [`Test`] deciding whether it joins the merged statement, and its text
//! pre-split into [`Segment`]s: literal SQL, `#{name}` bind parameters, and
//! `${name}`/`{name}` inline substitutions. Splitting happens once when the
//! node is built, not at every merge.

use crate::error::{OrmError, OrmResult};

/// The statement kind a template renders, from its root element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl TemplateKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "select" => Some(Self::Select),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Inclusion test for one node.
///
/// Presence tests treat JSON `null`, a missing path, and an empty array as
/// absent; the emptiness tests additionally treat `""` as empty. Equality
/// tests stringify the resolved value first.
#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    /// Unconditional; plain text nodes.
    Always,
    IsNull(String),
    IsNotNull(String),
    IsEmpty(String),
    IsNotEmpty(String),
    Equals { property: String, literal: String },
    NotEquals { property: String, literal: String },
}

/// One pre-split piece of a node's text.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    /// `#{path}`: consumes placeholder slots and binds the resolved value.
    Bind(String),
    /// `${path}` or `{path}`: substituted into the SQL text, no binding.
    Inline(String),
}

/// A conditional piece of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    pub test: Test,
    pub segments: Vec<Segment>,
}

impl TemplateNode {
    /// A node gated by `test`.
    pub fn new(test: Test, sql: impl AsRef<str>) -> Self {
        Self {
            test,
            segments: parse_segments(sql.as_ref()),
        }
    }

    /// An unconditional text node.
    pub fn text(sql: impl AsRef<str>) -> Self {
        Self::new(Test::Always, sql)
    }
}

/// A named statement template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: String,
    pub kind: TemplateKind,
    pub nodes: Vec<TemplateNode>,
}

impl Template {
    pub fn new(
        id: impl Into<String>,
        kind: TemplateKind,
        nodes: Vec<TemplateNode>,
    ) -> OrmResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(OrmError::statement("template id must not be empty"));
        }
        Ok(Self { id, kind, nodes })
    }
}

/// Split node text into literal, bind, and inline segments.
///
/// A placeholder name is a dotted path of identifier characters; braces
/// around anything else stay literal text.
pub(crate) fn parse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let (open, bind) = match bytes[i] {
            b'#' if bytes.get(i + 1) == Some(&b'{') => (i + 1, true),
            b'$' if bytes.get(i + 1) == Some(&b'{') => (i + 1, false),
            b'{' => (i, false),
            _ => {
                let Some(ch) = text[i..].chars().next() else {
                    break;
                };
                literal.push(ch);
                i += ch.len_utf8();
                continue;
            }
        };
        let name_end = text[open + 1..].find('}').map(|off| open + 1 + off);
        match name_end {
            Some(end) if is_path(text[open + 1..end].trim()) => {
                let name = text[open + 1..end].trim().to_owned();
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(if bind {
                    Segment::Bind(name)
                } else {
                    Segment::Inline(name)
                });
                i = end + 1;
            }
            _ => {
                // Not a placeholder; emit the opener as literal text.
                literal.push(bytes[i] as char);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

fn is_path(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_bind_and_literal_segments() {
        let segments = parse_segments("WHERE id = #{id} AND org = #{org}");
        assert_eq!(
            segments,
            vec![
                Segment::Literal("WHERE id = ".into()),
                Segment::Bind("id".into()),
                Segment::Literal(" AND org = ".into()),
                Segment::Bind("org".into()),
            ]
        );
    }

    #[test]
    fn dollar_and_bare_braces_substitute_inline() {
        assert_eq!(
            parse_segments("ORDER BY ${col}"),
            vec![
                Segment::Literal("ORDER BY ".into()),
                Segment::Inline("col".into()),
            ]
        );
        assert_eq!(
            parse_segments("FROM {table}"),
            vec![
                Segment::Literal("FROM ".into()),
                Segment::Inline("table".into()),
            ]
        );
    }

    #[test]
    fn dotted_paths_are_placeholder_names() {
        assert_eq!(
            parse_segments("#{user.id}"),
            vec![Segment::Bind("user.id".into())]
        );
    }

    #[test]
    fn malformed_braces_stay_literal() {
        assert_eq!(
            parse_segments("a { b"),
            vec![Segment::Literal("a { b".into())]
        );
        assert_eq!(
            parse_segments("#{unclosed"),
            vec![Segment::Literal("#{unclosed".into())]
        );
        assert_eq!(
            parse_segments("{not a path}"),
            vec![Segment::Literal("{not a path}".into())]
        );
    }

    #[test]
    fn plain_text_is_one_literal() {
        assert_eq!(
            parse_segments("SELECT 1"),
            vec![Segment::Literal("SELECT 1".into())]
        );
        assert_eq!(parse_segments(""), Vec::<Segment>::new());
    }
}
