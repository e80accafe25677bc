//! Newick parser built on `nom`.
//!
//! Numeric labels of internal nodes are read as support values; any other
//! label, and every quoted label, is a name. Bracketed comments are skipped.

use super::error::TreeError;
use super::node::NodeId;
use super::tree::Tree;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{char, digit1, multispace0},
    combinator::{cut, map, map_res, opt, recognize, value},
    error::{context, ContextError, ErrorKind, FromExternalError, ParseError},
    multi::{fold_many0, many1, separated_list1},
    sequence::{delimited, preceded},
    IResult, Offset, Parser,
};

#[derive(Clone, Debug, PartialEq)]
pub enum DetailedErrorKind {
    Context(&'static str),
    Nom(ErrorKind),
}

/// nom error collecting the contexts it passed through, innermost first.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailedError<'a> {
    pub errors: Vec<(&'a str, DetailedErrorKind)>,
}

impl<'a> ParseError<&'a str> for DetailedError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        DetailedError {
            errors: vec![(input, DetailedErrorKind::Nom(kind))],
        }
    }

    fn append(input: &'a str, kind: ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, DetailedErrorKind::Nom(kind)));
        other
    }
}

impl<'a> ContextError<&'a str> for DetailedError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, DetailedErrorKind::Context(ctx)));
        other
    }
}

impl<'a, E> FromExternalError<&'a str, E> for DetailedError<'a> {
    fn from_external_error(input: &'a str, kind: ErrorKind, _e: E) -> Self {
        DetailedError {
            errors: vec![(input, DetailedErrorKind::Nom(kind))],
        }
    }
}

type PResult<'a, O> = IResult<&'a str, O, DetailedError<'a>>;

/// Recursive form of a node, flattened into the arena once parsing succeeds.
#[derive(Debug, Default)]
struct ParsedNode {
    label: Option<Label>,
    length: Option<f64>,
    children: Vec<ParsedNode>,
}

#[derive(Debug, Clone, PartialEq)]
struct Label {
    text: String,
    quoted: bool,
}

impl ParsedNode {
    fn into_tree(self, tree: &mut Tree) -> NodeId {
        let id = tree.add_node();
        let is_internal = !self.children.is_empty();
        for child in self.children {
            let child_id = child.into_tree(tree);
            // Both ids were just created and the child is detached
            tree.add_child(id, child_id).unwrap();
        }

        if let Some(node) = tree.get_node_mut(id) {
            node.length = self.length;
            if let Some(label) = self.label {
                match label.text.parse::<f64>() {
                    Ok(support) if is_internal && !label.quoted => node.support = Some(support),
                    _ => node.name = Some(label.text),
                }
            }
        }
        id
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

// 'O''Brien' -> O'Brien
fn quoted<'a>(quote: char) -> impl Parser<&'a str, Output = String, Error = DetailedError<'a>> {
    let (body, doubled) = if quote == '\'' { ("'", "''") } else { ("\"", "\"\"") };
    delimited(
        char(quote),
        fold_many0(
            alt((is_not(body), value(body, tag(doubled)))),
            String::new,
            |mut acc: String, s: &str| {
                acc.push_str(s);
                acc
            },
        ),
        char(quote),
    )
}

fn parse_label(input: &str) -> PResult<'_, Option<Label>> {
    let unquoted = map(take_while(|c: char| !"():;,[]'\"".contains(c)), |s: &str| {
        let text = s.trim();
        if text.is_empty() {
            None
        } else {
            Some(Label {
                text: text.to_string(),
                quoted: false,
            })
        }
    });
    let quoted_label = map(alt((quoted('\''), quoted('"'))), |text| {
        Some(Label { text, quoted: true })
    });

    context("label", alt((ws(quoted_label), unquoted))).parse(input)
}

// ":0.123", ":.5", ":-1e-3"
fn parse_length(input: &str) -> PResult<'_, f64> {
    context(
        "length",
        preceded(
            ws(char(':')),
            cut(map_res(
                recognize((
                    opt(char('-')),
                    alt((
                        recognize((digit1, opt((char('.'), digit1)))),
                        recognize((char('.'), digit1)),
                    )),
                    opt((
                        alt((char('e'), char('E'))),
                        opt(alt((char('+'), char('-')))),
                        digit1,
                    )),
                )),
                |s: &str| s.parse::<f64>(),
            )),
        ),
    )
    .parse(input)
}

fn skip_comments(input: &str) -> PResult<'_, ()> {
    fold_many0(
        ws(delimited(char('['), take_while(|c| c != ']'), char(']'))),
        || (),
        |_, _| (),
    )
    .parse(input)
}

// (child,child,...)label:length, comments allowed around the length
fn parse_subtree(input: &str) -> PResult<'_, ParsedNode> {
    let (input, children) = context(
        "children",
        opt(delimited(
            ws(char('(')),
            separated_list1(ws(char(',')), parse_subtree),
            ws(char(')')),
        )),
    )
    .parse(input)?;

    let (input, label) = parse_label(input)?;
    let (input, _) = skip_comments(input)?;
    let (input, length) = opt(parse_length).parse(input)?;
    let (input, _) = skip_comments(input)?;

    let node = ParsedNode {
        label,
        length,
        children: children.unwrap_or_default(),
    };
    Ok((input, node))
}

fn finish(root: ParsedNode) -> Tree {
    let mut tree = Tree::new();
    let root_id = root.into_tree(&mut tree);
    tree.set_root(root_id);
    tree
}

/// Parse exactly one `;`-terminated tree.
pub fn parse_newick(input: &str) -> Result<Tree, TreeError> {
    let mut parser = (ws(parse_subtree), ws(char(';')));

    match parser.parse(input) {
        Ok((rest, (root, _))) if rest.trim().is_empty() => Ok(finish(root)),
        Ok((rest, _)) => Err(position_error(input, rest, "trailing data after the tree\n")),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(make_tree_error(input, e)),
        Err(nom::Err::Incomplete(_)) => Err(position_error(input, "", "incomplete input\n")),
    }
}

/// Parse one or more trees. Top-level `[...]` blocks between trees are ignored.
pub fn parse_newick_multi(input: &str) -> Result<Vec<Tree>, TreeError> {
    let valid_tree = map((ws(parse_subtree), ws(char(';'))), |(root, _)| Some(root));
    let garbage = map(
        ws(delimited(char('['), take_while(|c| c != ']'), char(']'))),
        |_| None,
    );
    let mut parser = many1(alt((valid_tree, garbage)));

    match parser.parse(input) {
        Ok((rest, roots)) if rest.trim().is_empty() => {
            Ok(roots.into_iter().flatten().map(finish).collect())
        }
        Ok((rest, _)) => Err(position_error(input, rest, "unexpected text between trees\n")),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(make_tree_error(input, e)),
        Err(nom::Err::Incomplete(_)) => Err(position_error(input, "", "incomplete input\n")),
    }
}

// An empty `remaining` is the end of input
fn position_error(input: &str, remaining: &str, message: &str) -> TreeError {
    let offset = if remaining.is_empty() {
        input.len()
    } else {
        input.offset(remaining)
    };
    let prefix = &input[..offset];
    let line = prefix.chars().filter(|&c| c == '\n').count() + 1;
    let last_newline = prefix.rfind('\n').map(|p| p + 1).unwrap_or(0);

    TreeError::ParseError {
        message: message.to_string(),
        line,
        column: offset - last_newline + 1,
        snippet: remaining.chars().take(50).collect(),
    }
}

fn make_tree_error(input: &str, e: DetailedError) -> TreeError {
    let remaining = e.errors.first().map(|(r, _)| *r).unwrap_or("");

    let mut msg = String::new();
    for (_, kind) in e.errors.iter().rev() {
        match kind {
            DetailedErrorKind::Context(ctx) => msg.push_str(&format!("while parsing {}:\n", ctx)),
            DetailedErrorKind::Nom(k) => msg.push_str(&format!("  error: {:?}\n", k)),
        }
    }

    position_error(input, remaining, &msg)
}

impl Tree {
    /// Parse a single Newick tree.
    ///
    /// ```
    /// use wintree::libs::phylo::Tree;
    ///
    /// let tree = Tree::from_newick("((A:0.1,B:0.2)90:0.05,C:0.3);").unwrap();
    /// assert_eq!(tree.len(), 5);
    /// assert_eq!(tree.get_leaves().len(), 3);
    ///
    /// assert!(Tree::from_newick("(A,B:invalid)C;").is_err());
    /// ```
    pub fn from_newick(input: &str) -> Result<Self, TreeError> {
        parse_newick(input)
    }

    pub fn from_newick_multi(input: &str) -> Result<Vec<Self>, TreeError> {
        parse_newick_multi(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_child(tree: &Tree, i: usize) -> &crate::libs::phylo::Node {
        let root = tree.get_node(tree.get_root().unwrap()).unwrap();
        tree.get_node(root.children[i]).unwrap()
    }

    #[test]
    fn test_parser_lengths() {
        let tree = Tree::from_newick("(A:0.1, B:0.2e-1)Root:100;").unwrap();

        let root = tree.get_node(tree.get_root().unwrap()).unwrap();
        assert_eq!(root.name.as_deref(), Some("Root"));
        assert_eq!(root.length, Some(100.0));
        assert_eq!(root_child(&tree, 0).length, Some(0.1));
        assert_eq!(root_child(&tree, 1).length, Some(0.02));
    }

    #[test]
    fn test_parser_support() {
        let tree = Tree::from_newick("((A,B)95:0.1,(C,D)'17':0.2,(E,F)0.88);").unwrap();

        let ab = root_child(&tree, 0);
        assert_eq!(ab.support, Some(95.0));
        assert_eq!(ab.name, None);
        assert_eq!(ab.length, Some(0.1));

        // Quoted labels stay names
        let cd = root_child(&tree, 1);
        assert_eq!(cd.support, None);
        assert_eq!(cd.name.as_deref(), Some("17"));

        assert_eq!(root_child(&tree, 2).support, Some(0.88));

        // Numeric leaves are names
        let tree = Tree::from_newick("(1,2);").unwrap();
        assert_eq!(root_child(&tree, 0).name.as_deref(), Some("1"));
    }

    #[test]
    fn test_parser_multiline_and_comments() {
        let input = "
        (
            (
                'Human' : 0.1    [Comment on Human],
                'Chimp' : 0.12
            )Hominidae : 0.5,
            Gorilla [&&NHX:S=gorilla] : 0.6
        )Hominoidea;
        ";
        let tree = Tree::from_newick(input).unwrap();
        assert_eq!(tree.len(), 5);

        let hominidae = root_child(&tree, 0);
        assert_eq!(hominidae.name.as_deref(), Some("Hominidae"));
        assert_eq!(hominidae.children.len(), 2);

        let gorilla = root_child(&tree, 1);
        assert_eq!(gorilla.name.as_deref(), Some("Gorilla"));
        assert_eq!(gorilla.length, Some(0.6));
    }

    #[test]
    fn test_parser_quoted() {
        let tree = Tree::from_newick("('Homo sapiens':0.1,\"Mus musculus\":0.2,'O''Brien');").unwrap();
        assert_eq!(root_child(&tree, 0).name.as_deref(), Some("Homo sapiens"));
        assert_eq!(root_child(&tree, 1).name.as_deref(), Some("Mus musculus"));
        assert_eq!(root_child(&tree, 2).name.as_deref(), Some("O'Brien"));

        // Spaces inside quotes are kept, outside are trimmed
        let tree = Tree::from_newick("(' A ',  B  );").unwrap();
        assert_eq!(root_child(&tree, 0).name.as_deref(), Some(" A "));
        assert_eq!(root_child(&tree, 1).name.as_deref(), Some("B"));
    }

    #[test]
    fn test_parser_fraction_length() {
        let tree = Tree::from_newick("(A:.5,B:1,C:-.25e-1);").unwrap();
        assert_eq!(root_child(&tree, 0).length, Some(0.5));
        assert_eq!(root_child(&tree, 1).length, Some(1.0));
        assert_eq!(root_child(&tree, 2).length, Some(-0.025));
        assert!(Tree::from_newick("(A:.,B);").is_err());
    }

    #[test]
    fn test_parser_multi() {
        let trees = Tree::from_newick_multi("[header]\n(A,B);\n((A,B),C);\n").unwrap();
        assert_eq!(trees.len(), 2);
        assert!(Tree::from_newick_multi("(A,B);(C").is_err());
    }

    #[test]
    fn test_parser_error() {
        match Tree::from_newick("(A,B)C") {
            Err(TreeError::ParseError { line, column, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(column, 7);
            }
            other => panic!("Expected ParseError, got {:?}", other),
        }

        match Tree::from_newick("(A,B:invalid)C;") {
            Err(TreeError::ParseError { message, .. }) => assert!(message.contains("length")),
            other => panic!("Expected ParseError, got {:?}", other),
        }

        assert!(Tree::from_newick("(A,B);(C,D);").is_err());
    }
}
