use crate::error::ParseError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One element of a parsed XML document with namespaces already resolved.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

/// Namespace declarations introduced by a single element.
type Scope = Vec<(Option<String>, String)>;

#[derive(Debug)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut open: Vec<XmlElement> = Vec::new();
        let mut scopes: Vec<Scope> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|e| xml_error(position, e))?;
            match event {
                Event::Start(start) => {
                    let (element, scope) = open_element(&start, &scopes, position)?;
                    scopes.push(scope);
                    open.push(element);
                }
                Event::Empty(start) => {
                    let (element, _) = open_element(&start, &scopes, position)?;
                    attach(element, &mut open, &mut root, position)?;
                }
                Event::End(_) => {
                    let element = open.pop().ok_or_else(|| ParseError::Xml {
                        position,
                        message: "closing tag without matching opening tag".into(),
                    })?;
                    scopes.pop();
                    attach(element, &mut open, &mut root, position)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| xml_error(position, e))?;
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(ParseError::Xml {
                position: reader.buffer_position() as u64,
                message: format!("unexpected end of document inside <{}>", unclosed.name),
            });
        }

        root.map(|root| Self { root }).ok_or(ParseError::MissingRoot)
    }

    /// Namespace of the root element, applied to every lookup made through `root()`.
    pub fn namespace(&self) -> Option<&str> {
        self.root.namespace.as_deref()
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            element: &self.root,
            ns: self.namespace(),
        }
    }

    /// Fail unless the root element has the given local name.
    pub fn expect_root(&self, name: &str) -> Result<(), ParseError> {
        if self.root.name == name {
            Ok(())
        } else {
            Err(ParseError::UnexpectedRoot {
                expected: name.to_string(),
                found: self.root.name.clone(),
            })
        }
    }
}

fn xml_error(position: u64, err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml {
        position,
        message: err.to_string(),
    }
}

fn open_element(
    start: &BytesStart<'_>,
    scopes: &[Scope],
    position: u64,
) -> Result<(XmlElement, Scope), ParseError> {
    let mut scope = Scope::new();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(position, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(position, e))?
            .into_owned();

        if key == "xmlns" {
            scope.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.push((Some(prefix.to_string()), value));
        } else {
            let local = key.rsplit(':').next().unwrap_or(&key).to_string();
            attributes.push((local, value));
        }
    }

    let prefix = start
        .name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
    let namespace = resolve(prefix.as_deref(), &scope, scopes);
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    Ok((
        XmlElement {
            namespace,
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        },
        scope,
    ))
}

fn resolve(prefix: Option<&str>, own: &Scope, outer: &[Scope]) -> Option<String> {
    std::iter::once(own)
        .chain(outer.iter().rev())
        .flat_map(|scope| scope.iter())
        .find(|(p, _)| p.as_deref() == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty())
}

fn attach(
    element: XmlElement,
    open: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    position: u64,
) -> Result<(), ParseError> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(ParseError::Xml {
            position,
            message: "more than one root element".into(),
        })
    }
}

/// Borrowed view of an element that resolves names within the document namespace.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    element: &'a XmlElement,
    ns: Option<&'a str>,
}

impl<'a> Node<'a> {
    pub fn name(&self) -> &'a str {
        &self.element.name
    }

    fn matches(&self, element: &XmlElement, name: &str) -> bool {
        element.name == name && element.namespace.as_deref() == self.ns
    }

    fn wrap(&self, element: &'a XmlElement) -> Node<'a> {
        Node { element, ns: self.ns }
    }

    /// Trimmed, non-empty attribute value.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Trimmed, non-empty text content.
    pub fn text(&self) -> Option<&'a str> {
        let text = self.element.text.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn child(&self, name: &str) -> Option<Node<'a>> {
        self.element
            .children
            .iter()
            .find(|c| self.matches(c, name))
            .map(|c| self.wrap(c))
    }

    pub fn children(&self, name: &str) -> Vec<Node<'a>> {
        self.element
            .children
            .iter()
            .filter(|c| self.matches(c, name))
            .map(|c| self.wrap(c))
            .collect()
    }

    /// Follow a `/`-separated path of direct children, taking the first match at each step.
    pub fn find(&self, path: &str) -> Option<Node<'a>> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(*self, |node, segment| node.child(segment))
    }

    /// All elements reached by a `/`-separated path, fanning out at every step.
    pub fn find_all(&self, path: &str) -> Vec<Node<'a>> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .fold(vec![*self], |nodes, segment| {
                nodes.iter().flat_map(|n| n.children(segment)).collect()
            })
    }

    /// Every element below this one with the given name, in document order.
    pub fn descendants(&self, name: &str) -> Vec<Node<'a>> {
        let mut found = Vec::new();
        let mut stack: Vec<&'a XmlElement> = self.element.children.iter().rev().collect();
        while let Some(element) = stack.pop() {
            if self.matches(element, name) {
                found.push(self.wrap(element));
            }
            stack.extend(element.children.iter().rev());
        }
        found
    }

    /// Text of the element at `path`.
    pub fn child_text(&self, path: &str) -> Option<&'a str> {
        self.find(path).and_then(|n| n.text())
    }

    /// Text of the first descendant named `name` that carries any.
    pub fn descendant_text(&self, name: &str) -> Option<&'a str> {
        self.descendants(name).into_iter().find_map(|n| n.text())
    }

    /// A field that upstream encodes either as an attribute or as a child element.
    pub fn value(&self, name: &str) -> Option<&'a str> {
        self.attr(name).or_else(|| self.child_text(name))
    }
}
