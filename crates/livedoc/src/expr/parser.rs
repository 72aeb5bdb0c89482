use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use ariadne::{Config, Label, Report, ReportKind, Source};
use chumsky::{pratt::*, prelude::*};

use super::ast::{BinaryOp, Expr, PathSegment, RefPath, Reference, UnaryOp};

pub type ParseError<'src> = Rich<'src, char>;
type Extra<'src> = extra::Err<ParseError<'src>>;

/// Piece of a text child: literal text or a `$reference` macro.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    /// Source text of the reference, parsed again by the copy it becomes.
    Macro(String),
}

pub fn parse_expression(source: &str) -> Result<Expr, ParseFailure> {
    expression()
        .padded()
        .then_ignore(end())
        .parse(source)
        .into_result()
        .map_err(|errors| ParseFailure::new(source, errors))
}

pub fn parse_reference(source: &str) -> Result<Reference, ParseFailure> {
    reference(expression())
        .padded()
        .then_ignore(end())
        .parse(source)
        .into_result()
        .map_err(|errors| ParseFailure::new(source, errors))
}

pub fn parse_template(source: &str) -> Result<Vec<TemplatePart>, ParseFailure> {
    let parts = template()
        .parse(source)
        .into_result()
        .map_err(|errors| ParseFailure::new(source, errors))?;
    // Merge neighbouring literals, e.g. "cost " + "$" + "5"
    let mut merged: Vec<TemplatePart> = Vec::with_capacity(parts.len());
    for part in parts {
        match (merged.last_mut(), part) {
            (Some(TemplatePart::Literal(previous)), TemplatePart::Literal(text)) => {
                previous.push_str(&text)
            }
            (_, part) => merged.push(part),
        }
    }
    Ok(merged)
}

fn identifier<'src>() -> impl Parser<'src, &'src str, &'src str, Extra<'src>> + Clone {
    any()
        .filter(|character: &char| character.is_ascii_alphabetic() || *character == '_')
        .then(
            any()
                .filter(|character: &char| character.is_ascii_alphanumeric() || *character == '_')
                .repeated(),
        )
        .to_slice()
}

fn word<'src>(keyword: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    identifier()
        .filter(move |found: &&str| *found == keyword)
        .ignored()
        .padded()
}

fn path<'src>() -> impl Parser<'src, &'src str, RefPath, Extra<'src>> + Clone {
    let segment = just("..")
        .to(PathSegment::Parent)
        .or(identifier().map(|name: &str| PathSegment::Name(name.into())));

    let nested = just('/')
        .or_not()
        .then(
            segment
                .separated_by(just('/'))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .delimited_by(just('('), just(')'))
        .map(|(root, segments)| RefPath {
            absolute: root.is_some(),
            segments,
        });

    let simple = identifier().map(RefPath::name);

    nested.or(simple)
}

fn reference<'src, P>(expression: P) -> impl Parser<'src, &'src str, Reference, Extra<'src>> + Clone
where
    P: Parser<'src, &'src str, Expr, Extra<'src>> + Clone,
{
    let index = expression
        .padded()
        .delimited_by(just('['), just(']'));

    just('$')
        .ignore_then(path())
        .then(index.clone().repeated().collect::<Vec<_>>())
        .then(
            just('.')
                .ignore_then(identifier())
                .then(index.repeated().collect::<Vec<_>>())
                .or_not(),
        )
        .map(|((path, component_indices), projection)| {
            let (prop, prop_indices) = match projection {
                Some((name, indices)) => (Some(Arc::<str>::from(name)), indices),
                None => (None, Vec::new()),
            };
            Reference {
                path,
                component_indices,
                prop,
                prop_indices,
            }
        })
}

pub fn expression<'src>() -> impl Parser<'src, &'src str, Expr, Extra<'src>> + Clone {
    recursive(|expression| {
        let number = text::int(10)
            .then(just('.').then(text::digits(10)).or_not())
            .to_slice()
            .from_str()
            .unwrapped()
            .map(Expr::Number);

        let quoted = |quote: char| {
            just(quote)
                .ignore_then(none_of(quote).repeated().to_slice())
                .then_ignore(just(quote))
        };
        let string = quoted('\'')
            .or(quoted('"'))
            .map(|text: &str| Expr::Text(text.into()));

        let call = identifier()
            .then(
                expression
                    .clone()
                    .separated_by(just(','))
                    .collect::<Vec<_>>()
                    .delimited_by(just('(').padded(), just(')')),
            )
            .map(|(function, args): (&str, Vec<Expr>)| Expr::Call {
                function: function.into(),
                args,
            });

        let boolean = identifier().try_map(|found: &str, span| match found {
            "true" => Ok(Expr::Bool(true)),
            "false" => Ok(Expr::Bool(false)),
            _ => Err(Rich::custom(span, format!("unexpected word `{found}`"))),
        });

        let group = expression
            .clone()
            .separated_by(just(','))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just('(').padded(), just(')'))
            .map(|mut items: Vec<Expr>| {
                if items.len() == 1 {
                    items.remove(0)
                } else {
                    Expr::Tuple(items)
                }
            });

        let atom = choice((
            number,
            string,
            reference(expression.clone()).map(Expr::Reference),
            call,
            boolean,
            group,
        ))
        .padded();

        let comparison = choice((
            just("==").to(BinaryOp::Equal),
            just("!=").to(BinaryOp::NotEqual),
            just("<=").to(BinaryOp::LessOrEqual),
            just(">=").to(BinaryOp::GreaterOrEqual),
            just('<').to(BinaryOp::Less),
            just('>').to(BinaryOp::Greater),
            just('=').to(BinaryOp::Equal),
        ))
        .padded();
        let additive = just('+')
            .to(BinaryOp::Add)
            .or(just('-').to(BinaryOp::Subtract))
            .padded();
        let multiplicative = just('*')
            .to(BinaryOp::Multiply)
            .or(just('/').to(BinaryOp::Divide))
            .padded();

        atom.pratt((
            infix(left(1), word("or"), |l, _, r, _| Expr::binary(BinaryOp::Or, l, r)),
            infix(left(2), word("and"), |l, _, r, _| Expr::binary(BinaryOp::And, l, r)),
            prefix(3, word("not"), |_, operand, _| Expr::unary(UnaryOp::Not, operand)),
            infix(left(4), comparison, |l, op, r, _| Expr::binary(op, l, r)),
            infix(left(5), additive, |l, op, r, _| Expr::binary(op, l, r)),
            infix(left(6), multiplicative, |l, op, r, _| Expr::binary(op, l, r)),
            prefix(7, just('-').padded(), |_, operand, _| {
                Expr::unary(UnaryOp::Negate, operand)
            }),
            infix(right(8), just('^').padded(), |l, _, r, _| {
                Expr::binary(BinaryOp::Power, l, r)
            }),
        ))
    })
}

fn template<'src>() -> impl Parser<'src, &'src str, Vec<TemplatePart>, Extra<'src>> {
    let reference_macro = reference(expression())
        .to_slice()
        .map(|source: &str| TemplatePart::Macro(source.to_string()));
    let literal = none_of('$')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|text: &str| TemplatePart::Literal(text.to_string()));
    let dollar = just('$').to(TemplatePart::Literal("$".to_string()));

    choice((reference_macro, literal, dollar))
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Located syntax error inside an attribute or text child.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub span: Range<usize>,
    pub message: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub source: String,
    pub errors: Vec<SyntaxError>,
}

impl ParseFailure {
    fn new(source: &str, errors: Vec<ParseError<'_>>) -> Self {
        let errors = errors
            .into_iter()
            .map(|error| SyntaxError {
                span: error.span().into_range(),
                message: error.to_string(),
                label: match error.found() {
                    Some(found) => format!("unexpected `{found}`"),
                    None => "unexpected end of input".to_string(),
                },
            })
            .collect();
        Self {
            source: source.to_string(),
            errors,
        }
    }

    /// Renders every error against its source, without colors.
    pub fn render(&self, filename: &str) -> String {
        let mut out = Vec::new();
        for error in &self.errors {
            let written = Report::build(ReportKind::Error, (filename, error.span.clone()))
                .with_config(Config::default().with_color(false))
                .with_message(&error.message)
                .with_label(Label::new((filename, error.span.clone())).with_message(&error.label))
                .finish()
                .write((filename, Source::from(self.source.as_str())), &mut out);
            if written.is_err() {
                out.extend_from_slice(error.message.as_bytes());
                out.push(b'\n');
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(error) => write!(f, "`{}`: {}", self.source, error.message),
            None => write!(f, "`{}`: invalid syntax", self.source),
        }
    }
}

impl std::error::Error for ParseFailure {}
