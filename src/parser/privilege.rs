use super::common::{phrase, ws};
use crate::core::{ActionSet, AuthError, ObjectType, PrivilegeType};
use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, opt, value},
    multi::separated_list1,
    sequence::{pair, preceded},
    IResult,
};

#[derive(Debug, Clone)]
enum ActionItem {
    All,
    Named(String),
}

fn action_item(input: &str) -> IResult<&str, ActionItem> {
    alt((
        value(
            ActionItem::All,
            ws(pair(phrase("ALL"), opt(preceded(multispace1, phrase("PRIVILEGES"))))),
        ),
        map(ws(take_while1(|c: char| c != ',')), |s: &str| {
            ActionItem::Named(s.trim().to_string())
        }),
    ))(input)
}

/// Разбирает тип объекта: `table`, `MATERIALIZED VIEW`, `resource_group`
pub fn parse_object_type(text: &str) -> Result<ObjectType, AuthError> {
    ObjectType::from_name(text)
        .ok_or_else(|| AuthError::ParseError(format!("unknown object type '{}'", text.trim())))
}

/// Разбирает список прав через запятую для данного типа объекта.
///
/// `ALL` (или `ALL PRIVILEGES`) раскрывается во все права, допустимые для типа.
/// Неизвестное имя дает `ParseError`, недопустимое для типа право - `InvalidPrivilege`.
pub fn parse_actions(object_type: ObjectType, text: &str) -> Result<ActionSet, AuthError> {
    let (_, items) = all_consuming(preceded(
        multispace0,
        separated_list1(char(','), action_item),
    ))(text)
    .map_err(|e| AuthError::ParseError(format!("invalid privilege list '{}': {e}", text.trim())))?;

    let mut actions = ActionSet::empty();
    for item in items {
        match item {
            ActionItem::All => actions |= object_type.all_actions(),
            ActionItem::Named(name) => {
                let action = PrivilegeType::from_name(&name)
                    .ok_or_else(|| AuthError::ParseError(format!("unknown privilege '{name}'")))?;
                if !object_type.is_valid_action(action) {
                    return Err(AuthError::InvalidPrivilege {
                        object_type,
                        action: action.to_string(),
                    });
                }
                actions |= action.bit();
            }
        }
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_type() {
        assert_eq!(parse_object_type("table").unwrap(), ObjectType::Table);
        assert_eq!(
            parse_object_type(" materialized_view ").unwrap(),
            ObjectType::MaterializedView
        );
        assert!(matches!(
            parse_object_type("index"),
            Err(AuthError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_actions_list() {
        let actions = parse_actions(ObjectType::Table, "select, insert").unwrap();
        assert_eq!(actions, ActionSet::SELECT | ActionSet::INSERT);

        let actions = parse_actions(ObjectType::Database, "create table,DROP").unwrap();
        assert_eq!(actions, ActionSet::CREATE_TABLE | ActionSet::DROP);
    }

    #[test]
    fn test_all_expands_per_type() {
        assert_eq!(
            parse_actions(ObjectType::Table, "ALL").unwrap(),
            ObjectType::Table.all_actions()
        );
        assert_eq!(
            parse_actions(ObjectType::User, "all privileges").unwrap(),
            ActionSet::IMPERSONATE
        );
    }

    #[test]
    fn test_invalid_actions() {
        assert!(matches!(
            parse_actions(ObjectType::Table, "impersonate"),
            Err(AuthError::InvalidPrivilege { .. })
        ));
        assert!(matches!(
            parse_actions(ObjectType::Table, "fly"),
            Err(AuthError::ParseError(_))
        ));
        assert!(parse_actions(ObjectType::Table, "").is_err());
    }
}
