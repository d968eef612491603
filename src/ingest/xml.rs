// src/ingest/xml.rs
//! Namespace-aware element tree built in one pass over a feed document.
//! Both feed parsers query the same tree.

use anyhow::{anyhow, bail, Context, Result};
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::OnceCell;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use regex::Regex;
use std::borrow::Cow;

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Resolved namespace URI, `None` when unqualified.
    pub ns: Option<String>,
    pub name: String, // local name
    pub attrs: Vec<(String, String)>,
    /// Direct text and CDATA content, concatenated, untrimmed.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Clark notation: `{ns}name`, or just `name`.
    pub fn tag(&self) -> String {
        match &self.ns {
            Some(ns) => format!("{{{ns}}}{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn is(&self, ns: Option<&str>, name: &str) -> bool {
        self.name == name && self.ns.as_deref() == ns
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, ns: Option<&str>, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(ns, name))
    }

    pub fn children_named<'a>(
        &'a self,
        ns: Option<&'a str>,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.is(ns, name))
    }

    /// Trimmed text of the first `name` child, empty when absent.
    pub fn child_text(&self, ns: Option<&str>, name: &str) -> String {
        self.child(ns, name)
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default()
    }

    /// Trimmed text of the first candidate child whose raw text is non-empty.
    pub fn first_text(&self, ns: Option<&str>, names: &[&str]) -> String {
        names
            .iter()
            .filter_map(|n| self.child(ns, n))
            .find(|c| !c.text.is_empty())
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default()
    }
}

/// Encoding named in the `<?xml ... encoding="..."?>` prolog, if any.
fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"^\s*<\?xml[^>]*?\bencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
            .expect("xml encoding regex")
    });
    let head = &bytes[..bytes.len().min(256)];
    // the prolog is ASCII in every ASCII-compatible encoding
    let head: String = head.iter().map(|&b| b as char).collect();
    re.captures(&head)
        .and_then(|c| Encoding::for_label(c[1].as_bytes()))
}

/// Decode feed bytes to text: a BOM wins, then the declared encoding,
/// then UTF-8. Undecodable bytes become U+FFFD.
pub fn decode_document(bytes: &[u8]) -> Cow<'_, str> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((enc, bom_len)) => (enc, &bytes[bom_len..]),
        // a UTF-16 label in an ASCII prolog means UTF-8
        None => (
            declared_encoding(bytes).map_or(UTF_8, Encoding::output_encoding),
            bytes,
        ),
    };
    let (text, _had_errors) = encoding.decode_without_bom_handling(body);
    text
}

/// Parse raw feed bytes into the document root.
pub fn parse_document(bytes: &[u8]) -> Result<Element> {
    let text = scrub_html_entities_for_xml(&decode_document(bytes));
    let mut reader = NsReader::from_str(&text);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        let (resolved, event) = reader.read_resolved_event().context("parsing feed xml")?;
        match event {
            Event::Start(e) => stack.push(open_element(resolved, &e)?),
            Event::Empty(e) => {
                let el = open_element(resolved, &e)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().context("unescaping xml text")?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        bail!("unexpected end of document inside <{}>", open.name);
    }
    root.ok_or_else(|| anyhow!("document has no root element"))
}

fn open_element(resolved: ResolveResult<'_>, e: &BytesStart<'_>) -> Result<Element> {
    let ns = match resolved {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    };
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a.context("reading xml attribute")?;
        let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
        let value = a.unescape_value().context("unescaping xml attribute")?;
        attrs.push((key, value.into_owned()));
    }
    Ok(Element {
        ns,
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        attrs,
        ..Element::default()
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => bail!("multiple root elements"),
    }
    Ok(())
}

/// Feeds regularly leak HTML entities that XML does not define.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_latin1_is_decoded() {
        let mut xml =
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<rss><channel><item><title>Caf"
                .to_vec();
        xml.push(0xE9);
        xml.extend_from_slice(b" news</title></item></channel></rss>");
        let root = parse_document(&xml).unwrap();
        let item = root
            .child(None, "channel")
            .and_then(|c| c.child(None, "item"))
            .unwrap();
        assert_eq!(item.child_text(None, "title"), "Café news");
    }

    #[test]
    fn decoding_prefers_bom_then_declaration_then_utf8() {
        assert_eq!(decode_document("<a>é</a>".as_bytes()), "<a>é</a>");
        let doc = "<?xml version='1.0' encoding='latin1'?><a>é</a>";
        let with_bom = [&[0xEF, 0xBB, 0xBF][..], doc.as_bytes()].concat();
        assert_eq!(decode_document(&with_bom), doc);
        assert_eq!(
            decode_document(b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><a>\x93q\x94</a>"),
            "<?xml version=\"1.0\" encoding=\"windows-1252\"?><a>\u{201C}q\u{201D}</a>"
        );
        let utf16: Vec<u8> = [0xFF, 0xFE]
            .into_iter()
            .chain("<a>é</a>".encode_utf16().flat_map(u16::to_le_bytes))
            .collect();
        assert_eq!(decode_document(&utf16), "<a>é</a>");
        // unknown label falls back to UTF-8
        assert_eq!(
            decode_document("<?xml version=\"1.0\" encoding=\"x-nope\"?><a>é</a>".as_bytes()),
            "<?xml version=\"1.0\" encoding=\"x-nope\"?><a>é</a>"
        );
    }

    #[test]
    fn resolves_default_and_prefixed_namespaces() {
        let xml = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <entry>
    <title>  Hello  </title>
    <arxiv:comment>c</arxiv:comment>
    <link href="https://a.test/x" rel="alternate"/>
  </entry>
</feed>"#;
        let root = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(root.tag(), "{http://www.w3.org/2005/Atom}feed");
        let entry = root.child(Some(ATOM_NS), "entry").unwrap();
        assert_eq!(entry.child_text(Some(ATOM_NS), "title"), "Hello");
        assert!(entry.child(Some(ATOM_NS), "comment").is_none());
        assert_eq!(
            entry.child(Some(ATOM_NS), "link").and_then(|l| l.attr("href")),
            Some("https://a.test/x")
        );
    }

    #[test]
    fn cdata_entities_and_html_leaks() {
        let xml = "<rss><channel><item><title>A &amp; B&nbsp;C</title>\
                   <description><![CDATA[<p>hi</p>]]></description></item></channel></rss>";
        let root = parse_document(xml.as_bytes()).unwrap();
        let item = root
            .child(None, "channel")
            .and_then(|c| c.child(None, "item"))
            .unwrap();
        assert_eq!(item.child_text(None, "title"), "A & B C");
        assert_eq!(item.child_text(None, "description"), "<p>hi</p>");
    }

    #[test]
    fn first_text_skips_missing_and_empty_candidates() {
        let xml = "<e><summary/><content> body </content></e>";
        let root = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(root.first_text(None, &["missing", "summary", "content"]), "body");
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(parse_document(b"<rss><channel></rss>").is_err());
        assert!(parse_document(b"<rss>").is_err());
        assert!(parse_document(b"just text").is_err());
    }
}
