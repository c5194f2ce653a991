use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde_json::{Map, Value};

use super::Module;

type ColumnMap = BTreeMap<u32, &'static str>;

/// Columns shared by the groupware data modules (contacts, calendar, tasks).
static COMMON: LazyLock<ColumnMap> = LazyLock::new(|| {
    BTreeMap::from([
        (1, "id"),
        (2, "created_by"),
        (3, "modified_by"),
        (4, "creation_date"),
        (5, "last_modified"),
        (20, "folder_id"),
        (100, "categories"),
        (101, "private_flag"),
        (102, "color_label"),
        (104, "number_of_attachments"),
    ])
});

static MAIL: LazyLock<ColumnMap> = LazyLock::new(|| {
    BTreeMap::from([
        (600, "id"),
        (601, "folder_id"),
        (602, "attachment"),
        (603, "from"),
        (604, "to"),
        (605, "cc"),
        (606, "bcc"),
        (607, "subject"),
        (608, "size"),
        (609, "sent_date"),
        (610, "received_date"),
        (611, "flags"),
        (612, "thread_level"),
        (614, "priority"),
    ])
});

static CONTACTS: LazyLock<ColumnMap> = LazyLock::new(|| {
    let mut map = COMMON.clone();
    // Contacts carry no color label.
    map.remove(&102);
    map.extend([
        (500, "display_name"),
        (501, "first_name"),
        (502, "last_name"),
        (505, "title"),
        (506, "street_home"),
        (507, "postal_code_home"),
        (508, "city_home"),
        (511, "birthday"),
        (542, "company"),
        (551, "telephone_business1"),
        (552, "telephone_home1"),
        (555, "email1"),
        (556, "email2"),
        (557, "email3"),
        (606, "image1"),
    ]);
    map
});

static CALENDAR: LazyLock<ColumnMap> = LazyLock::new(|| {
    let mut map = COMMON.clone();
    map.extend([
        (200, "title"),
        (201, "start_date"),
        (202, "end_date"),
        (203, "note"),
        (204, "alarm"),
        (206, "recurrence_id"),
        (207, "recurrence_position"),
        (209, "recurrence_type"),
        (220, "participants"),
        (221, "users"),
        (400, "location"),
        (401, "full_time"),
        (402, "shown_as"),
    ]);
    map
});

static TASKS: LazyLock<ColumnMap> = LazyLock::new(|| {
    let mut map = COMMON.clone();
    // Tasks are never shown with a color label either.
    map.remove(&102);
    map.extend([
        (200, "title"),
        (201, "start_date"),
        (202, "end_date"),
        (203, "note"),
        (300, "status"),
        (301, "percent_completed"),
        (307, "target_duration"),
        (308, "actual_duration"),
        (309, "priority"),
        (317, "date_completed"),
    ]);
    map
});

static FOLDERS: LazyLock<ColumnMap> = LazyLock::new(|| {
    let mut map = COMMON.clone();
    // Inherited content columns that folders do not serve.
    map.remove(&100);
    map.remove(&101);
    map.remove(&102);
    map.remove(&104);
    map.extend([
        (300, "title"),
        (301, "module"),
        (302, "type"),
        (304, "subfolders"),
        (305, "own_rights"),
        (306, "permissions"),
        (308, "subscribed"),
    ]);
    map
});

/// Users are contacts with a handful of extra fields.
static USER: LazyLock<ColumnMap> = LazyLock::new(|| {
    let mut map = CONTACTS.clone();
    map.extend([
        (610, "aliases"),
        (611, "timezone"),
        (612, "locale"),
        (613, "groups"),
        (614, "contact_id"),
    ]);
    map
});

static ACCOUNT: LazyLock<ColumnMap> = LazyLock::new(|| {
    BTreeMap::from([
        (1001, "id"),
        (1002, "name"),
        (1003, "login"),
        (1004, "primary_address"),
        (1005, "mail_server"),
        (1006, "mail_port"),
        (1007, "transport_server"),
        (1008, "transport_port"),
    ])
});

fn module_map(module: Module) -> Option<&'static ColumnMap> {
    match module {
        Module::Mail => Some(&MAIL),
        Module::Contacts => Some(&CONTACTS),
        Module::Calendar => Some(&CALENDAR),
        Module::Tasks => Some(&TASKS),
        Module::Folders => Some(&FOLDERS),
        Module::User => Some(&USER),
        Module::Account => Some(&ACCOUNT),
        Module::Login | Module::Multiple => None,
    }
}

/// All column IDs of a module, ascending. Empty for non-column-mapped modules.
pub fn columns(module: Module) -> Vec<u32> {
    module_map(module)
        .map(|m| m.keys().copied().collect())
        .unwrap_or_default()
}

/// The semantic field name of a numeric column, if the module maps it.
pub fn field_name(module: Module, id: u32) -> Option<&'static str> {
    module_map(module).and_then(|m| m.get(&id).copied())
}

/// Convert one positional row array into a named-field object.
///
/// Position `i` maps to the column at `explicit[i]` when an explicit column
/// list was sent with the request, otherwise to the module's full sorted
/// column list at index `i`. IDs the module does not map keep their numeric
/// value as the field name, so forward-compatible server columns survive.
/// Non-array input (e.g. a scalar from a deletion feed) passes through
/// unchanged.
pub fn row_to_object(module: Module, row: &Value, explicit: Option<&[u32]>) -> Value {
    let cells = match row.as_array() {
        Some(cells) => cells,
        None => return row.clone(),
    };

    let full;
    let ids: &[u32] = match explicit {
        Some(ids) => ids,
        None => {
            full = columns(module);
            &full
        }
    };

    let mut object = Map::new();
    for (i, cell) in cells.iter().enumerate() {
        let Some(&id) = ids.get(i) else {
            log::debug!("{}: row has {} cells but only {} columns", module, cells.len(), ids.len());
            break;
        };
        let name = match field_name(module, id) {
            Some(name) => name.to_string(),
            None => id.to_string(),
        };
        object.insert(name, cell.clone());
    }
    Value::Object(object)
}
