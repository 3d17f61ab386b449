//! Nom-based parser for macro expressions
//!
//! The grammar is a small XPath-flavoured subset:
//!
//! ```text
//! or       := and ("or" and)*
//! and      := equality ("and" equality)*
//! equality := relation (("=" | "!=") relation)*
//! relation := additive (("<=" | ">=" | "<" | ">") additive)*
//! additive := term (("+" | "-") term)*
//! term     := unary (("*" | "div" | "mod") unary)*
//! unary    := "-" unary | primary
//! primary  := string | number | "$" name | "(" or ")" | qname "(" args ")" | path
//! path     := step ("/" step)*      step := "." | name
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, cut, map, not, opt, peek, recognize, value},
    error::{
        context, convert_error, ContextError, ErrorKind, ParseError as NomParseError,
        VerboseError, VerboseErrorKind,
    },
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use super::ast::{BinaryOp, Expr};
use crate::error::ExpressionError;

/// Deepest nesting of parentheses, function arguments and unary minus accepted.
/// Each operator in a chain also counts, as its left operand nests inside it
pub const MAX_DEPTH: usize = 64;

const TOO_DEEP: &str = "expression nested too deeply";

// ============================================================================
// Public API
// ============================================================================

/// Parse an expression from source text
///
/// Expressions nested deeper than [`MAX_DEPTH`] are rejected.
///
/// # Example
/// ```
/// use openvpms_macro::expr::{parse_expression, Expr};
///
/// let expr = parse_expression("concat('a', $b)").unwrap();
/// assert!(matches!(expr, Expr::Call { .. }));
/// ```
pub fn parse_expression(input: &str) -> Result<Expr, ExpressionError> {
    match all_consuming(delimited(
        multispace0,
        |i| or_expr::<VerboseError<&str>>(i, 0),
        multispace0,
    ))(input)
    {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ExpressionError::Parse {
            expression: input.to_string(),
            message: if too_deep(&e) {
                TOO_DEEP.to_string()
            } else {
                convert_error(input, e)
            },
        }),
        Err(nom::Err::Incomplete(_)) => Err(ExpressionError::Parse {
            expression: input.to_string(),
            message: "Incomplete input".to_string(),
        }),
    }
}

fn too_deep(error: &VerboseError<&str>) -> bool {
    error
        .errors
        .iter()
        .any(|(_, kind)| matches!(kind, VerboseErrorKind::Context(c) if *c == TOO_DEEP))
}

// ============================================================================
// Operators
// ============================================================================

type Operand<'a, E> = fn(&'a str, usize) -> IResult<&'a str, Expr, E>;
type Operator<'a, E> = fn(&'a str) -> IResult<&'a str, BinaryOp, E>;

/// Parse a left-associative chain of `operand (operator operand)*`
fn chain<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
    operand: Operand<'a, E>,
    operator: Operator<'a, E>,
) -> IResult<&'a str, Expr, E> {
    let (mut input, mut left) = operand(input, depth)?;
    let mut depth = depth;
    loop {
        match preceded(multispace0, operator)(input) {
            Ok((rest, op)) => {
                depth += 1;
                let (rest, right) = preceded(
                    multispace0,
                    cut(context("operand", |i| operand(i, depth))),
                )(rest)?;
                left = Expr::binary(op, left, right);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, left)),
            Err(e) => return Err(e),
        }
    }
}

fn or_expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    chain(input, depth, and_expr, or_op)
}

fn and_expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    chain(input, depth, equality_expr, and_op)
}

fn equality_expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    chain(input, depth, relational_expr, equality_op)
}

fn relational_expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    chain(input, depth, additive_expr, relational_op)
}

fn additive_expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    chain(input, depth, multiplicative_expr, additive_op)
}

fn multiplicative_expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    chain(input, depth, unary_expr, multiplicative_op)
}

fn or_op<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, BinaryOp, E> {
    value(BinaryOp::Or, keyword("or"))(input)
}

fn and_op<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, BinaryOp, E> {
    value(BinaryOp::And, keyword("and"))(input)
}

fn equality_op<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, BinaryOp, E> {
    alt((value(BinaryOp::Ne, tag("!=")), value(BinaryOp::Eq, char('='))))(input)
}

fn relational_op<'a, E: NomParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, BinaryOp, E> {
    alt((
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, char('<')),
        value(BinaryOp::Gt, char('>')),
    ))(input)
}

fn additive_op<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, BinaryOp, E> {
    alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-'))))(input)
}

fn multiplicative_op<'a, E: NomParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, BinaryOp, E> {
    alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, keyword("div")),
        value(BinaryOp::Mod, keyword("mod")),
    ))(input)
}

/// Match a word that is not the prefix of a longer name
fn keyword<'a, E: NomParseError<&'a str>>(
    word: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    terminated(tag(word), not(satisfy(is_name_char)))
}

// ============================================================================
// Primaries
// ============================================================================

fn unary_expr<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    if depth > MAX_DEPTH {
        let error = E::from_error_kind(input, ErrorKind::TooLarge);
        return Err(nom::Err::Failure(E::add_context(input, TOO_DEEP, error)));
    }
    alt((
        map(
            preceded(pair(char('-'), multispace0), |i| unary_expr(i, depth + 1)),
            |e| Expr::Negate(Box::new(e)),
        ),
        |i| primary(i, depth),
    ))(input)
}

fn primary<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    alt((
        string_literal,
        number,
        variable,
        |i| parenthesized(i, depth),
        |i| function_call(i, depth),
        path,
    ))(input)
}

fn string_literal<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Expr, E> {
    map(
        alt((
            delimited(
                char('\''),
                take_while(|c| c != '\''),
                cut(context("closing quote", char('\''))),
            ),
            delimited(
                char('"'),
                take_while(|c| c != '"'),
                cut(context("closing quote", char('"'))),
            ),
        )),
        |s: &str| Expr::Literal(s.to_string()),
    )(input)
}

fn number<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    map(
        preceded(peek(satisfy(|c| c.is_ascii_digit() || c == '.')), double),
        Expr::Number,
    )(input)
}

fn variable<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Expr, E> {
    map(
        preceded(char('$'), cut(context("variable name", variable_name))),
        |name: &str| Expr::Variable(name.to_string()),
    )(input)
}

fn parenthesized<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    delimited(
        pair(char('('), multispace0),
        |i| or_expr(i, depth + 1),
        pair(multispace0, cut(context("closing parenthesis", char(')')))),
    )(input)
}

fn function_call<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
    depth: usize,
) -> IResult<&'a str, Expr, E> {
    let (input, (first, second)) = pair(name, opt(preceded(char(':'), name)))(input)?;
    let (input, _) = preceded(multispace0, char('('))(input)?;
    let (input, args) = separated_list0(
        preceded(multispace0, char(',')),
        preceded(multispace0, |i| or_expr(i, depth + 1)),
    )(input)?;
    let (input, _) = preceded(
        multispace0,
        cut(context("closing parenthesis", char(')'))),
    )(input)?;

    let expr = match second {
        Some(local) => Expr::call(Some(first), local, args),
        None => Expr::call(None, first, args),
    };
    Ok((input, expr))
}

fn path<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Expr, E> {
    let (input, first) = step(input)?;
    let (input, rest) = many0(preceded(char('/'), step))(input)?;

    let steps = std::iter::once(first)
        .chain(rest)
        .flatten()
        .map(str::to_string)
        .collect();
    Ok((input, Expr::Path(steps)))
}

/// A path step. `.` refers to the current node and contributes nothing
fn step<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Option<&'a str>, E> {
    alt((map(name, Some), value(None, char('.'))))(input)
}

fn name<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(pair(satisfy(is_name_start), take_while(is_name_char)))(input)
}

fn variable_name<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(pair(
        satisfy(is_name_start),
        take_while(|c: char| is_name_char(c) || c == '.'),
    ))(input)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}
