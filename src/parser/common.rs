use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{alpha1, char, multispace0, multispace1},
    combinator::{map, recognize},
    error::{Error, ErrorKind},
    sequence::{delimited, pair},
    IResult,
};

pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        |s: &str| s.to_string(),
    )(input)
}

pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('\''), take_while1(|c| c != '\''), char('\'')),
        |s: &str| s.to_string(),
    )(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, String> {
    alt((
        map(
            delimited(char('`'), take_while1(|c| c != '`'), char('`')),
            |s: &str| s.to_string(),
        ),
        map(
            delimited(char('"'), take_while1(|c| c != '"'), char('"')),
            |s: &str| s.to_string(),
        ),
    ))(input)
}

/// Имя объекта: `name`, `'name'`, `"name"` или `` `name` ``
pub fn object_name(input: &str) -> IResult<&str, String> {
    alt((identifier, string_literal, quoted_identifier))(input)
}

/// Последовательность ключевых слов через любые пробелы: `phrase("ALL TABLES")`
/// принимает и `all   tables`. Последнее слово должно заканчиваться на границе слова.
pub fn phrase<'a, 'p>(words: &'p str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> + 'p {
    move |mut input: &'a str| {
        for (i, word) in words.split_whitespace().enumerate() {
            if i > 0 {
                input = multispace1::<&'a str, Error<&'a str>>(input)?.0;
            }
            input = tag_no_case::<&'p str, &'a str, Error<&'a str>>(word)(input)?.0;
        }
        if input.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
        }
        Ok((input, ()))
    }
}

/// Звездочка `*` как "все объекты"
pub fn star(input: &str) -> IResult<&str, ()> {
    map(ws(char('*')), |_| ())(input)
}
