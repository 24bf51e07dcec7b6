use super::common::{object_name, phrase, star, ws};
use crate::core::{AuthError, NamedKind, ObjectType, TableKind};
use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, value},
    multi::separated_list1,
    sequence::{delimited, preceded, separated_pair, terminated, tuple},
    IResult,
};
use std::fmt;

/// Имя объекта до разрешения в идентификатор: конкретное или "все"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameScope {
    All,
    Named(String),
}

impl fmt::Display for NameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Ссылка на объект в том виде, как ее написал пользователь
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRef {
    /// Права уровня типа (SYSTEM)
    System,
    /// Таблица, представление или материализованное представление.
    /// `database == All` всегда вместе с `table == All`.
    Table {
        kind: TableKind,
        database: NameScope,
        table: NameScope,
    },
    Database(NameScope),
    Catalog(NameScope),
    User(NameScope),
    Named {
        kind: NamedKind,
        name: NameScope,
    },
    Function {
        database: NameScope,
        signature: NameScope,
    },
    GlobalFunction(NameScope),
}

impl ObjectRef {
    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        match self {
            Self::System => ObjectType::System,
            Self::Table { kind, .. } => kind.object_type(),
            Self::Database(_) => ObjectType::Database,
            Self::Catalog(_) => ObjectType::Catalog,
            Self::User(_) => ObjectType::User,
            Self::Named { kind, .. } => kind.object_type(),
            Self::Function { .. } => ObjectType::Function,
            Self::GlobalFunction(_) => ObjectType::GlobalFunction,
        }
    }
}

fn plural(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Table => "TABLES",
        ObjectType::View => "VIEWS",
        ObjectType::MaterializedView => "MATERIALIZED VIEWS",
        ObjectType::Database => "DATABASES",
        ObjectType::Catalog => "CATALOGS",
        ObjectType::User => "USERS",
        ObjectType::ResourceGroup => "RESOURCE GROUPS",
        ObjectType::Resource => "RESOURCES",
        ObjectType::StorageVolume => "STORAGE VOLUMES",
        ObjectType::Function => "FUNCTIONS",
        ObjectType::GlobalFunction => "GLOBAL FUNCTIONS",
        ObjectType::System => "SYSTEM",
    }
}

/// Приводит сигнатуру функции к каноническому виду: `name(INT,VARCHAR)`
#[must_use]
pub fn canonical_signature(name: &str, args: &str) -> String {
    let args: Vec<String> = args
        .split(',')
        .map(|arg| arg.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase())
        .filter(|arg| !arg.is_empty())
        .collect();
    format!("{name}({})", args.join(","))
}

fn signature(input: &str) -> IResult<&str, String> {
    map(
        tuple((
            ws(object_name),
            delimited(char('('), take_while(|c| c != ')'), char(')')),
        )),
        |(name, args)| canonical_signature(&name, args),
    )(input)
}

/// Разбирает сигнатуру функции, записанную пользователем (`my_add(int, int)`)
pub fn parse_signature(text: &str) -> Result<String, AuthError> {
    all_consuming(ws(signature))(text)
        .map(|(_, sig)| sig)
        .map_err(|e| AuthError::ParseError(format!("invalid function signature '{text}': {e}")))
}

/// `ALL <plural> IN ALL DATABASES` | `ALL <plural> IN DATABASE db`
fn in_database<'a>(
    plural: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, NameScope> {
    preceded(
        tuple((phrase("ALL"), multispace1, phrase(plural), multispace1, phrase("IN"), multispace1)),
        alt((
            value(NameScope::All, phrase("ALL DATABASES")),
            map(
                preceded(tuple((phrase("DATABASE"), multispace1)), object_name),
                NameScope::Named,
            ),
        )),
    )
}

fn all_of<'a>(plural: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    preceded(tuple((phrase("ALL"), multispace1)), phrase(plural))
}

fn table_ref<'a>(kind: TableKind) -> impl FnMut(&'a str) -> IResult<&'a str, ObjectRef> {
    let words = plural(kind.object_type());
    move |input: &'a str| {
        let (input, (database, table)) = alt((
            map(in_database(words), |db| (db, NameScope::All)),
            map(separated_pair(star, char('.'), star), |_| {
                (NameScope::All, NameScope::All)
            }),
            map(
                separated_pair(ws(object_name), char('.'), star),
                |(db, ())| (NameScope::Named(db), NameScope::All),
            ),
            map(
                separated_pair(ws(object_name), char('.'), ws(object_name)),
                |(db, tbl)| (NameScope::Named(db), NameScope::Named(tbl)),
            ),
        ))(input)?;
        Ok((
            input,
            ObjectRef::Table {
                kind,
                database,
                table,
            },
        ))
    }
}

/// `ALL <plural>` | `*` | name
fn scope_ref<'a>(plural: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, NameScope> {
    alt((
        value(NameScope::All, ws(all_of(plural))),
        value(NameScope::All, star),
        map(ws(object_name), NameScope::Named),
    ))
}

fn function_ref(input: &str) -> IResult<&str, ObjectRef> {
    let (input, (database, signature)) = alt((
        map(in_database("FUNCTIONS"), |db| (db, NameScope::All)),
        map(separated_pair(star, char('.'), star), |_| {
            (NameScope::All, NameScope::All)
        }),
        map(
            separated_pair(ws(object_name), char('.'), star),
            |(db, ())| (NameScope::Named(db), NameScope::All),
        ),
        map(
            separated_pair(ws(object_name), char('.'), signature),
            |(db, sig)| (NameScope::Named(db), NameScope::Named(sig)),
        ),
    ))(input)?;
    Ok((input, ObjectRef::Function { database, signature }))
}

fn global_function_ref(input: &str) -> IResult<&str, ObjectRef> {
    map(
        alt((
            value(NameScope::All, ws(all_of("GLOBAL FUNCTIONS"))),
            value(NameScope::All, star),
            map(signature, NameScope::Named),
        )),
        ObjectRef::GlobalFunction,
    )(input)
}

fn named_ref<'a>(kind: NamedKind) -> impl FnMut(&'a str) -> IResult<&'a str, ObjectRef> {
    map(scope_ref(plural(kind.object_type())), move |name| ObjectRef::Named {
        kind,
        name,
    })
}

fn one_ref<'a>(object_type: ObjectType) -> impl FnMut(&'a str) -> IResult<&'a str, ObjectRef> {
    move |input: &'a str| {
        let (input, _) = multispace0::<&'a str, nom::error::Error<&'a str>>(input)?;
        match object_type {
            ObjectType::Table => table_ref(TableKind::Table)(input),
            ObjectType::View => table_ref(TableKind::View)(input),
            ObjectType::MaterializedView => table_ref(TableKind::MaterializedView)(input),
            ObjectType::Database => map(scope_ref("DATABASES"), ObjectRef::Database)(input),
            ObjectType::Catalog => map(scope_ref("CATALOGS"), ObjectRef::Catalog)(input),
            ObjectType::User => map(scope_ref("USERS"), ObjectRef::User)(input),
            ObjectType::ResourceGroup => named_ref(NamedKind::ResourceGroup)(input),
            ObjectType::Resource => named_ref(NamedKind::Resource)(input),
            ObjectType::StorageVolume => named_ref(NamedKind::StorageVolume)(input),
            ObjectType::Function => function_ref(input),
            ObjectType::GlobalFunction => global_function_ref(input),
            ObjectType::System => Ok((input, ObjectRef::System)),
        }
    }
}

/// Разбирает список ссылок на объекты одного типа, разделенных запятыми.
///
/// Для SYSTEM допустим только пустой текст.
pub fn parse_object_refs(object_type: ObjectType, text: &str) -> Result<Vec<ObjectRef>, AuthError> {
    if object_type == ObjectType::System {
        if !text.trim().is_empty() {
            return Err(AuthError::ParseError(format!(
                "SYSTEM privileges take no object, got '{}'",
                text.trim()
            )));
        }
        return Ok(vec![ObjectRef::System]);
    }

    all_consuming(terminated(
        separated_list1(char(','), one_ref(object_type)),
        multispace0,
    ))(text)
    .map(|(_, refs)| refs)
    .map_err(|e| {
        AuthError::ParseError(format!("invalid {object_type} reference '{}': {e}", text.trim()))
    })
}

/// Разбирает ровно одну ссылку на объект
pub fn parse_object_ref(object_type: ObjectType, text: &str) -> Result<ObjectRef, AuthError> {
    let mut refs = parse_object_refs(object_type, text)?;
    if refs.len() != 1 {
        return Err(AuthError::ParseError(format!(
            "expected a single {object_type} reference, got {}",
            refs.len()
        )));
    }
    Ok(refs.remove(0))
}
