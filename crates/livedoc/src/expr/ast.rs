use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(Arc<str>),
    Bool(bool),
    Reference(Reference),
    Tuple(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Arc<str>,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// All references in evaluation order.
    pub fn references(&self) -> Vec<&Reference> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a Reference>) {
        match self {
            Self::Number(_) | Self::Text(_) | Self::Bool(_) => {}
            Self::Reference(reference) => {
                found.push(reference);
                for index in reference
                    .component_indices
                    .iter()
                    .chain(&reference.prop_indices)
                {
                    index.collect_references(found);
                }
            }
            Self::Tuple(items) => items.iter().for_each(|item| item.collect_references(found)),
            Self::Unary { operand, .. } => operand.collect_references(found),
            Self::Binary { left, right, .. } => {
                left.collect_references(found);
                right.collect_references(found);
            }
            Self::Call { args, .. } => args.iter().for_each(|arg| arg.collect_references(found)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

/// `$name`, `$(a/b)`, `$(/abs)` or `$(../x)`, optionally indexed and
/// projected: `$m[2].value[1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub path: RefPath,
    /// Indices into the target's active children, before the property.
    pub component_indices: Vec<Expr>,
    pub prop: Option<Arc<str>>,
    /// Indices into the property value.
    pub prop_indices: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefPath {
    pub absolute: bool,
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Name(Arc<str>),
    Parent,
}

impl RefPath {
    pub fn name(name: &str) -> Self {
        Self {
            absolute: false,
            segments: vec![PathSegment::Name(name.into())],
        }
    }

    /// Parses a plain path attribute such as `p1`, `a/b`, `/a` or `../x`.
    /// A leading `$` is accepted.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix('$').unwrap_or(text);
        let text = text
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
            .unwrap_or(text);
        let (absolute, rest) = match text.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let mut segments = Vec::new();
        for part in rest.split('/') {
            match part {
                ".." => segments.push(PathSegment::Parent),
                name if is_identifier(name) => segments.push(PathSegment::Name(name.into())),
                _ => return None,
            }
        }
        segments
            .iter()
            .any(|segment| matches!(segment, PathSegment::Name(_)))
            .then_some(Self { absolute, segments })
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        }
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                f.write_str("/")?;
            }
            match segment {
                PathSegment::Name(name) => f.write_str(name)?,
                PathSegment::Parent => f.write_str("..")?,
            }
        }
        Ok(())
    }
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|rest| rest.is_ascii_alphanumeric() || rest == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths() {
        let path = RefPath::parse("a/b").unwrap();
        assert!(!path.absolute);
        assert_eq!(path.to_string(), "a/b");

        let path = RefPath::parse("$(/top)").unwrap();
        assert!(path.absolute);
        assert_eq!(path.segments, vec![PathSegment::Name("top".into())]);

        let path = RefPath::parse("../x").unwrap();
        assert_eq!(path.segments[0], PathSegment::Parent);

        assert_eq!(RefPath::parse(""), None);
        assert_eq!(RefPath::parse(".."), None);
        assert_eq!(RefPath::parse("a b"), None);
    }
}
