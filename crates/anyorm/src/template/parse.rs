//! Loading templates from their markup source.
//!
//! The source format is deliberately small: `<select>`, `<insert>`,
//! `<update>` and `<delete>` roots carrying an `id` attribute, containing
//! literal SQL text and the conditional children `<if test="...">`,
//! `<isNull property="...">`, `<isNotNull property="...">`,
//! `<isEqual property="..." value="...">` and
//! `<isNotEqual property="..." value="...">`. An `if` test supports only
//! `==` and `!=` against a literal or the keyword `null`. Markup characters
//! inside SQL text are written as entities (`&lt;`, `&gt;`, `&amp;`,
//! `&quot;`, `&apos;`).
//!
//! The grammar is closed, so the whole thing is read by a small
//! character-level parser instead of an XML dependency. Parse once at
//! startup; the resulting [`TemplateSet`] is immutable and shareable.
//!
//! # Example
//!
//! ```ignore
//! let templates = TemplateSet::parse(
//!     r#"<select id="find_users">
//!            SELECT * FROM users
//!            <isNotNull property="name">WHERE name like #{name}</isNotNull>
//!        </select>"#,
//! )?;
//! let stmt = template::build(&data, templates.get("find_users").unwrap(), placeholder)?;
//! ```

use std::collections::HashMap;

use crate::error::{OrmError, OrmResult};
use crate::template::node::{Template, TemplateKind, TemplateNode, Test};

/// An immutable collection of parsed templates, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    /// Parse every root element in the source.
    pub fn parse(source: &str) -> OrmResult<Self> {
        let mut parser = Parser::new(source);
        let mut templates = HashMap::new();
        loop {
            parser.skip_misc()?;
            if parser.at_end() {
                break;
            }
            let template = parser.parse_root()?;
            if templates.contains_key(&template.id) {
                return Err(OrmError::statement(format!(
                    "duplicate template id '{}'",
                    template.id
                )));
            }
            templates.insert(template.id.clone(), template);
        }
        Ok(Self { templates })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

// ==================== Parser ====================

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn skip_ws(&mut self) {
        while let Some(byte) = self.peek() {
            if byte.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Skip whitespace, prologs, and comments between root elements.
    fn skip_misc(&mut self) -> OrmResult<()> {
        loop {
            self.skip_ws();
            if self.rest().starts_with("<?") {
                let Some(at) = self.rest().find("?>") else {
                    return Err(OrmError::statement("unterminated prolog in template source"));
                };
                self.pos += at + 2;
                continue;
            }
            if self.rest().starts_with("<!--") {
                self.skip_comment()?;
                continue;
            }
            return Ok(());
        }
    }

    fn skip_comment(&mut self) -> OrmResult<()> {
        self.pos += 4;
        let Some(at) = self.rest().find("-->") else {
            return Err(OrmError::statement("unterminated comment in template source"));
        };
        self.pos += at + 3;
        Ok(())
    }

    fn expect(&mut self, byte: u8) -> OrmResult<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(OrmError::statement(format!(
                "expected '{}' at offset {} in template source",
                byte as char, self.pos
            )))
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_alphanumeric() || byte == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.text[start..self.pos]
    }

    /// Decode one entity reference, if the cursor sits on a known one.
    fn entity(&mut self) -> Option<char> {
        const TABLE: [(&str, char); 5] = [
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&amp;", '&'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ];
        for (name, ch) in TABLE {
            if self.rest().starts_with(name) {
                self.pos += name.len();
                return Some(ch);
            }
        }
        None
    }

    /// Text run up to the next `<`, with entities decoded.
    fn read_text(&mut self) -> String {
        let mut out = String::new();
        while let Some(byte) = self.peek() {
            if byte == b'<' {
                break;
            }
            if byte == b'&'
                && let Some(decoded) = self.entity()
            {
                out.push(decoded);
                continue;
            }
            let Some(ch) = self.rest().chars().next() else {
                break;
            };
            out.push(ch);
            self.pos += ch.len_utf8();
        }
        out
    }

    fn read_quoted(&mut self, quote: u8) -> OrmResult<String> {
        let mut out = String::new();
        loop {
            let Some(byte) = self.peek() else {
                return Err(OrmError::statement(
                    "unterminated attribute value in template source",
                ));
            };
            if byte == quote {
                self.pos += 1;
                return Ok(out);
            }
            if byte == b'&'
                && let Some(decoded) = self.entity()
            {
                out.push(decoded);
                continue;
            }
            let Some(ch) = self.rest().chars().next() else {
                return Err(OrmError::statement(
                    "unterminated attribute value in template source",
                ));
            };
            out.push(ch);
            self.pos += ch.len_utf8();
        }
    }

    fn parse_attrs(&mut self) -> OrmResult<Vec<(String, String)>> {
        let mut attrs = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'>' | b'/') | None => return Ok(attrs),
                _ => {}
            }
            let name = self.read_name();
            if name.is_empty() {
                return Err(OrmError::statement(format!(
                    "malformed attribute at offset {} in template source",
                    self.pos
                )));
            }
            self.skip_ws();
            self.expect(b'=')?;
            self.skip_ws();
            let quote = match self.peek() {
                Some(q @ (b'"' | b'\'')) => q,
                _ => {
                    return Err(OrmError::statement(format!(
                        "attribute '{name}' value must be quoted"
                    )));
                }
            };
            self.pos += 1;
            let value = self.read_quoted(quote)?;
            attrs.push((name.to_owned(), value));
        }
    }

    fn parse_root(&mut self) -> OrmResult<Template> {
        self.expect(b'<')?;
        let name = self.read_name();
        let Some(kind) = TemplateKind::from_name(name) else {
            return Err(OrmError::statement(format!(
                "unknown template root <{name}>"
            )));
        };
        let attrs = self.parse_attrs()?;
        let id = attr_value(&attrs, "id").ok_or_else(|| {
            OrmError::statement(format!("<{name}> requires an id attribute"))
        })?;
        self.expect(b'>')?;

        let mut nodes = Vec::new();
        loop {
            if self.at_end() {
                return Err(OrmError::statement(format!("unclosed <{name}> element")));
            }
            if self.rest().starts_with("</") {
                self.pos += 2;
                let close = self.read_name();
                if close != name {
                    return Err(OrmError::statement(format!(
                        "expected </{name}>, found </{close}>"
                    )));
                }
                self.skip_ws();
                self.expect(b'>')?;
                break;
            }
            if self.rest().starts_with("<!--") {
                self.skip_comment()?;
                continue;
            }
            if self.peek() == Some(b'<') {
                self.pos += 1;
                nodes.push(self.parse_child()?);
                continue;
            }
            let text = self.read_text();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                nodes.push(TemplateNode::text(trimmed));
            }
        }
        Template::new(id, kind, nodes)
    }

    /// One conditional child; the cursor sits just past its `<`.
    /// Children hold text only, no further nesting.
    fn parse_child(&mut self) -> OrmResult<TemplateNode> {
        let name = self.read_name().to_owned();
        let attrs = self.parse_attrs()?;
        let test = child_test(&name, &attrs)?;
        if self.rest().starts_with("/>") {
            self.pos += 2;
            return Ok(TemplateNode::new(test, ""));
        }
        self.expect(b'>')?;
        let text = self.read_text();
        if !self.rest().starts_with("</") {
            return Err(OrmError::statement(format!(
                "unexpected element inside <{name}>"
            )));
        }
        self.pos += 2;
        let close = self.read_name();
        if close != name {
            return Err(OrmError::statement(format!(
                "expected </{name}>, found </{close}>"
            )));
        }
        self.skip_ws();
        self.expect(b'>')?;
        Ok(TemplateNode::new(test, text.trim()))
    }
}

fn attr_value(attrs: &[(String, String)], key: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
}

fn child_test(name: &str, attrs: &[(String, String)]) -> OrmResult<Test> {
    let required = |key: &str| -> OrmResult<String> {
        attr_value(attrs, key).ok_or_else(|| {
            OrmError::statement(format!("<{name}> requires a {key} attribute"))
        })
    };
    match name {
        "if" => parse_test(&required("test")?),
        "isNull" => Ok(Test::IsNull(required("property")?)),
        "isNotNull" => Ok(Test::IsNotNull(required("property")?)),
        "isEqual" => Ok(Test::Equals {
            property: required("property")?,
            literal: required("value")?,
        }),
        "isNotEqual" => Ok(Test::NotEquals {
            property: required("property")?,
            literal: required("value")?,
        }),
        other => Err(OrmError::statement(format!(
            "unknown template element <{other}>"
        ))),
    }
}

/// An `if` test: `property == literal` or `property != literal`; the
/// unquoted keyword `null` turns equality into a presence check.
fn parse_test(expr: &str) -> OrmResult<Test> {
    let (property, right, negated) = if let Some((left, right)) = expr.split_once("!=") {
        (left, right, true)
    } else if let Some((left, right)) = expr.split_once("==") {
        (left, right, false)
    } else {
        return Err(OrmError::statement(format!(
            "unsupported test expression '{expr}': only == and != are recognized"
        )));
    };
    let property = property.trim();
    if property.is_empty() {
        return Err(OrmError::statement(format!(
            "test expression '{expr}' has no property"
        )));
    }
    let (literal, quoted) = strip_quotes(right.trim());
    if !quoted && literal == "null" {
        return Ok(if negated {
            Test::IsNotNull(property.to_owned())
        } else {
            Test::IsNull(property.to_owned())
        });
    }
    Ok(if negated {
        Test::NotEquals {
            property: property.to_owned(),
            literal: literal.to_owned(),
        }
    } else {
        Test::Equals {
            property: property.to_owned(),
            literal: literal.to_owned(),
        }
    })
}

fn strip_quotes(text: &str) -> (&str, bool) {
    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return (&text[1..text.len() - 1], true);
        }
    }
    (text, false)
}
