use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{debug, info};

use super::catalog::CatalogView;
use super::entry::PrivilegeEntry;
use super::error::AuthError;
use super::object::PrivilegeObject;
use super::object_type::ObjectType;
use super::privilege::{ActionSet, PrivilegeType};

/// Права одного пользователя или роли: тип объекта -> упорядоченный список записей.
///
/// Инварианты:
/// - в списке не больше одной записи на пару (объект, with_grant_option);
/// - ни одна запись не хранит пустой набор прав;
/// - пустые списки удаляются из map;
/// - права с grant option не дублируются в записи без grant option.
///
/// Синхронизации внутри нет: владелец держит эксклюзивную блокировку на
/// время grant/revoke/merge/sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrivilegeCollection {
    buckets: BTreeMap<ObjectType, Vec<PrivilegeEntry>>,
}

/// Запись с точно таким же объектом и флагом
fn find_entry(
    list: &[PrivilegeEntry],
    object: Option<&PrivilegeObject>,
    with_grant_option: bool,
) -> Option<usize> {
    list.iter().position(|e| e.is_slot(object, with_grant_option))
}

/// Добавляет права в существующую запись или создает новую на своем месте
fn add_action(
    list: &mut Vec<PrivilegeEntry>,
    object: Option<&PrivilegeObject>,
    with_grant_option: bool,
    actions: ActionSet,
) {
    if actions.is_empty() {
        return;
    }
    if let Some(idx) = find_entry(list, object, with_grant_option) {
        list[idx].actions.insert(actions);
    } else {
        let key = (object, with_grant_option);
        let pos = list.partition_point(|e| (e.object.as_ref(), e.with_grant_option) < key);
        list.insert(
            pos,
            PrivilegeEntry::new(actions, object.cloned(), with_grant_option),
        );
    }
}

/// Убирает права из записи; опустевшая запись удаляется
fn remove_action(list: &mut Vec<PrivilegeEntry>, idx: usize, actions: ActionSet) {
    list[idx].actions.remove(actions);
    if list[idx].actions.is_empty() {
        list.remove(idx);
    }
}

/// Выдача с учетом grant option: право с опцией поглощает то же право без опции
fn grant_object_to_list(
    list: &mut Vec<PrivilegeEntry>,
    actions: ActionSet,
    object: Option<&PrivilegeObject>,
    with_grant_option: bool,
) {
    match find_entry(list, object, !with_grant_option) {
        None => add_action(list, object, with_grant_option, actions),
        Some(opposite) if with_grant_option => {
            remove_action(list, opposite, actions);
            add_action(list, object, true, actions);
        }
        Some(opposite) => {
            // только то, чего еще нет в записи с grant option
            let remaining = actions.difference(list[opposite].actions);
            if !remaining.is_empty() {
                add_action(list, object, false, remaining);
            }
        }
    }
}

fn describe_object(object_type: ObjectType, object: Option<&PrivilegeObject>) -> String {
    match object {
        Some(o) if o.is_fuzzy() => o.to_string(),
        Some(o) => format!("{object_type} {o}"),
        None => object_type.to_string(),
    }
}

fn revoke_object_from_list(
    list: &mut Vec<PrivilegeEntry>,
    object_type: ObjectType,
    actions: ActionSet,
    object: Option<&PrivilegeObject>,
) -> Result<(), AuthError> {
    let plain = find_entry(list, object, false);
    if let Some(idx) = plain {
        remove_action(list, idx, actions);
    }
    // индексы могли сдвинуться, ищем заново
    let granted = find_entry(list, object, true);
    if let Some(idx) = granted {
        remove_action(list, idx, actions);
    }

    if plain.is_none() && granted.is_none() {
        return Err(AuthError::NoSuchGrant {
            object_type,
            object: describe_object(object_type, object),
        });
    }
    Ok(())
}

/// Сохраненный шаблон `stored` включает запрошенный `queried`
fn object_match(stored: Option<&PrivilegeObject>, queried: Option<&PrivilegeObject>) -> bool {
    match (stored, queried) {
        (None, None) => true,
        (Some(stored), Some(queried)) => stored.covers(queried),
        _ => false,
    }
}

impl PrivilegeCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(
        &mut self,
        object_type: ObjectType,
        actions: ActionSet,
        objects: &[Option<PrivilegeObject>],
        with_grant_option: bool,
    ) {
        if actions.is_empty() || objects.is_empty() {
            return;
        }
        let list = self.buckets.entry(object_type).or_default();
        for object in objects {
            grant_object_to_list(list, actions, object.as_ref(), with_grant_option);
        }
    }

    /// Отзывает права по каждому объекту.
    ///
    /// Объекты обрабатываются по одному: при `NoSuchGrant` уже обработанные
    /// объекты остаются измененными.
    pub fn revoke(
        &mut self,
        object_type: ObjectType,
        actions: ActionSet,
        objects: &[Option<PrivilegeObject>],
    ) -> Result<(), AuthError> {
        let Some(list) = self.buckets.get_mut(&object_type) else {
            debug!(%object_type, "revoke on an object type with no grants");
            return Ok(());
        };

        let result = objects
            .iter()
            .try_for_each(|object| revoke_object_from_list(list, object_type, actions, object.as_ref()));

        if list.is_empty() {
            self.buckets.remove(&object_type);
        }
        result
    }

    /// Может ли владелец выполнить `want` над конкретным объектом
    #[must_use]
    pub fn check(
        &self,
        object_type: ObjectType,
        want: PrivilegeType,
        object: Option<&PrivilegeObject>,
    ) -> bool {
        self.entries(object_type).iter().any(|entry| {
            // запись может совпасть по объекту, но не по правам: ищем дальше
            object_match(entry.object.as_ref(), object) && entry.actions.contains_action(want)
        })
    }

    fn search_object(
        &self,
        object_type: ObjectType,
        object: Option<&PrivilegeObject>,
        want: Option<PrivilegeType>,
    ) -> bool {
        self.entries(object_type).iter().any(|entry| {
            // 1. запись `ALL TABLES IN db1` покрывает запрошенную db1.t1
            // 2. запись db1.t1 попадает внутрь запрошенного `ALL TABLES IN db1`
            let matched = object_match(entry.object.as_ref(), object)
                || object_match(object, entry.object.as_ref());
            matched && want.is_none_or(|want| entry.actions.contains_action(want))
        })
    }

    #[must_use]
    pub fn search_any_action_on_object(
        &self,
        object_type: ObjectType,
        object: Option<&PrivilegeObject>,
    ) -> bool {
        self.search_object(object_type, object, None)
    }

    #[must_use]
    pub fn search_action_on_object(
        &self,
        object_type: ObjectType,
        object: Option<&PrivilegeObject>,
        want: PrivilegeType,
    ) -> bool {
        self.search_object(object_type, object, Some(want))
    }

    /// Может ли владелец передать `wanted` на каждый из `objects` дальше.
    ///
    /// Точная запись с grant option, которой не хватает прав, сразу дает отказ:
    /// другой записи для того же точного объекта и флага быть не может.
    #[must_use]
    pub fn allow_grant(
        &self,
        object_type: ObjectType,
        wanted: ActionSet,
        objects: &[Option<PrivilegeObject>],
    ) -> bool {
        let mut unchecked: Vec<Option<&PrivilegeObject>> =
            objects.iter().map(Option::as_ref).collect();
        if unchecked.is_empty() {
            return false;
        }

        for entry in self.entries(object_type).iter().filter(|e| e.with_grant_option) {
            let mut i = 0;
            while i < unchecked.len() {
                if object_match(entry.object.as_ref(), unchecked[i]) {
                    if entry.actions.contains(wanted) {
                        unchecked.swap_remove(i);
                        if unchecked.is_empty() {
                            return true;
                        }
                        continue;
                    }
                    if !entry.is_fuzzy() {
                        return false;
                    }
                }
                i += 1;
            }
        }
        false
    }

    /// Удаляет записи на конкретные объекты, которых больше нет в каталоге.
    /// Возвращает число удаленных записей.
    pub fn remove_invalid_objects(&mut self, view: &dyn CatalogView) -> usize {
        let mut removed = 0;
        for (object_type, list) in &mut self.buckets {
            list.retain(|entry| {
                let stale = entry
                    .object
                    .as_ref()
                    .is_some_and(|o| !o.is_fuzzy() && !o.validate(view));
                if stale {
                    info!(%object_type, ?entry, "found invalid object, removing the entry");
                    removed += 1;
                }
                !stale
            });
        }
        self.buckets.retain(|_, list| !list.is_empty());
        removed
    }

    /// Вливает права `other` (например, роли) через то же правило, что и `grant`
    pub fn merge(&mut self, other: &Self) {
        for (object_type, other_list) in &other.buckets {
            match self.buckets.entry(*object_type) {
                Entry::Vacant(slot) => {
                    slot.insert(other_list.clone());
                }
                Entry::Occupied(mut slot) => {
                    let list = slot.get_mut();
                    for entry in other_list {
                        grant_object_to_list(
                            list,
                            entry.actions,
                            entry.object.as_ref(),
                            entry.with_grant_option,
                        );
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Все разделы коллекции (для сериализации и SHOW GRANTS)
    #[must_use]
    pub const fn buckets(&self) -> &BTreeMap<ObjectType, Vec<PrivilegeEntry>> {
        &self.buckets
    }

    #[must_use]
    pub fn entries(&self, object_type: ObjectType) -> &[PrivilegeEntry] {
        self.buckets
            .get(&object_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
