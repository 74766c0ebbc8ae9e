//! Tabular projection of objects and lists (`meta.k8s.io/v1` `Table`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ApiResult;

pub const TABLE_API_VERSION: &str = "meta.k8s.io/v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i32,
}

impl TableColumnDefinition {
    pub fn new(name: &str, type_: &str, description: impl Into<String>) -> Self {
        Self { name: name.to_string(), type_: type_.to_string(), format: String::new(), description: description.into(), priority: 0 }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = format.to_string();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableRow {
    pub cells: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: crate::options::ListMeta,
    pub column_definitions: Vec<TableColumnDefinition>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum IncludeObject {
    None,
    #[default]
    Metadata,
    Object,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableOptions {
    #[serde(default)]
    pub no_headers: bool,
    #[serde(default)]
    pub include_object: IncludeObject,
}

/// Projects a single object or a `<Kind>List` into a table.
pub trait TableConvertor: Send + Sync {
    fn columns(&self) -> Vec<TableColumnDefinition>;

    fn cells(&self, obj: &Value, now: DateTime<Utc>) -> Vec<Value>;

    fn convert_to_table(&self, obj: &Value, opts: &TableOptions) -> ApiResult<Table> { self.convert_at(obj, opts, Utc::now()) }

    fn convert_at(&self, obj: &Value, opts: &TableOptions, now: DateTime<Utc>) -> ApiResult<Table> {
        let (items, continue_token): (Vec<&Value>, Option<String>) = match obj.get("items").and_then(|v| v.as_array()) {
            Some(items) => (
                items.iter().collect(),
                obj.pointer("/metadata/continue").and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(str::to_string),
            ),
            None => (vec![obj], None),
        };
        let rows = items
            .into_iter()
            .map(|it| TableRow { cells: self.cells(it, now), object: row_object(it, opts.include_object) })
            .collect();
        Ok(Table {
            api_version: TABLE_API_VERSION.to_string(),
            kind: "Table".to_string(),
            metadata: crate::options::ListMeta { continue_token, resource_version: None },
            column_definitions: if opts.no_headers { Vec::new() } else { self.columns() },
            rows,
        })
    }
}

fn row_object(obj: &Value, include: IncludeObject) -> Option<Value> {
    match include {
        IncludeObject::None => None,
        IncludeObject::Object => Some(obj.clone()),
        IncludeObject::Metadata => Some(json!({
            "apiVersion": "meta.k8s.io/v1",
            "kind": "PartialObjectMetadata",
            "metadata": obj.get("metadata").cloned().unwrap_or_else(|| json!({})),
        })),
    }
}

/// `Name` + `Age`, the projection every kind gets unless it overrides it.
#[derive(Debug, Clone)]
pub struct DefaultTableConvertor {
    group: String,
    resource: String,
}

impl DefaultTableConvertor {
    pub fn new(group: &str, resource: &str) -> Self { Self { group: group.to_string(), resource: resource.to_string() } }
}

fn name_column(group: &str, resource: &str) -> TableColumnDefinition {
    let qualified = if group.is_empty() { resource.to_string() } else { format!("{}.{}", resource, group) };
    TableColumnDefinition::new("Name", "string", format!("Name of the {} object", qualified)).with_format("name")
}

fn age_column() -> TableColumnDefinition {
    TableColumnDefinition::new("Age", "string", "Time elapsed since the object was created")
}

impl TableConvertor for DefaultTableConvertor {
    fn columns(&self) -> Vec<TableColumnDefinition> { vec![name_column(&self.group, &self.resource), age_column()] }

    fn cells(&self, obj: &Value, now: DateTime<Utc>) -> Vec<Value> {
        vec![Value::String(object_name(obj)), Value::String(object_age(obj, now))]
    }
}

/// An extra column read from the object by JSON pointer.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub definition: TableColumnDefinition,
    pub pointer: String,
}

impl ColumnSpec {
    pub fn new(name: &str, type_: &str, pointer: &str, description: &str) -> Self {
        Self { definition: TableColumnDefinition::new(name, type_, description), pointer: pointer.to_string() }
    }
}

/// `Name`, then the given columns, then `Age`.
#[derive(Debug, Clone)]
pub struct ColumnTableConvertor {
    group: String,
    resource: String,
    extra: Vec<ColumnSpec>,
}

impl ColumnTableConvertor {
    pub fn new(group: &str, resource: &str, extra: Vec<ColumnSpec>) -> Self {
        Self { group: group.to_string(), resource: resource.to_string(), extra }
    }
}

impl TableConvertor for ColumnTableConvertor {
    fn columns(&self) -> Vec<TableColumnDefinition> {
        let mut cols = vec![name_column(&self.group, &self.resource)];
        cols.extend(self.extra.iter().map(|c| c.definition.clone()));
        cols.push(age_column());
        cols
    }

    fn cells(&self, obj: &Value, now: DateTime<Utc>) -> Vec<Value> {
        let mut cells = vec![Value::String(object_name(obj))];
        for c in self.extra.iter() {
            cells.push(render_cell(obj.pointer(&c.pointer), &c.definition.type_));
        }
        cells.push(Value::String(object_age(obj, now)));
        cells
    }
}

fn render_cell(v: Option<&Value>, type_: &str) -> Value {
    match (v, type_) {
        (None | Some(Value::Null), "integer" | "number") => json!(0),
        (None | Some(Value::Null), "boolean") => json!(false),
        (None | Some(Value::Null), _) => Value::String(String::new()),
        (Some(Value::Array(items)), _) => {
            let parts: Vec<String> = items.iter().map(|x| x.as_str().map(str::to_string).unwrap_or_else(|| x.to_string())).collect();
            Value::String(parts.join(","))
        }
        (Some(v @ (Value::Number(_) | Value::Bool(_))), _) => v.clone(),
        (Some(Value::String(s)), _) => Value::String(s.clone()),
        (Some(other), _) => Value::String(other.to_string()),
    }
}

pub fn object_name(obj: &Value) -> String {
    obj.pointer("/metadata/name").and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

pub fn object_age(obj: &Value, now: DateTime<Utc>) -> String {
    let created = obj
        .pointer("/metadata/creationTimestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));
    render_age(created, now)
}

/// Compact elapsed time; an absent timestamp renders `<unknown>`.
pub fn render_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else { return "<unknown>".to_string() };
    let mut secs = (now - created).num_seconds().max(0) as u64;
    let days = secs / 86_400;
    secs %= 86_400;
    let hours = secs / 3600;
    secs %= 3600;
    let mins = secs / 60;
    secs %= 60;
    if days > 0 {
        format!("{}d{}h", days, hours)
    } else if hours > 0 {
        format!("{}h{}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).single().unwrap() }

    #[test]
    fn default_projection_has_name_and_age() {
        let conv = DefaultTableConvertor::new("meta.kubeui.dev", "resourcedescriptors");
        let list = json!({
            "apiVersion": "meta.kubeui.dev/v1alpha1",
            "kind": "ResourceDescriptorList",
            "metadata": {"continue": "2"},
            "items": [
                {"metadata": {"name": "a", "creationTimestamp": "2024-05-01T10:00:00Z"}},
                {"metadata": {"name": "b"}},
            ]
        });
        let t = conv.convert_at(&list, &TableOptions::default(), now()).unwrap();
        let names: Vec<&str> = t.column_definitions.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Name", "Age"]);
        assert_eq!(t.rows[0].cells, vec![json!("a"), json!("1d2h")]);
        assert_eq!(t.rows[1].cells, vec![json!("b"), json!("<unknown>")]);
        assert_eq!(t.metadata.continue_token.as_deref(), Some("2"));
        assert_eq!(t.rows[0].object.as_ref().and_then(|o| o.get("kind")), Some(&json!("PartialObjectMetadata")));
    }

    #[test]
    fn column_projection_reads_pointers() {
        let conv = ColumnTableConvertor::new(
            "meta.kubeui.dev",
            "gatewayinfos",
            vec![
                ColumnSpec::new("Host", "string", "/response/hostName", ""),
                ColumnSpec::new("Ports", "string", "/spec/ports", ""),
            ],
        );
        let obj = json!({"metadata": {"name": "gw"}, "response": {"hostName": "x.example"}, "spec": {"ports": [80, 443]}});
        let t = conv.convert_at(&obj, &TableOptions { no_headers: true, include_object: IncludeObject::None }, now()).unwrap();
        assert!(t.column_definitions.is_empty());
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].cells, vec![json!("gw"), json!("x.example"), json!("80,443"), json!("<unknown>")]);
        assert!(t.rows[0].object.is_none());
    }

    #[test]
    fn age_buckets() {
        let n = now();
        assert_eq!(render_age(Some(n - chrono::Duration::seconds(42)), n), "42s");
        assert_eq!(render_age(Some(n - chrono::Duration::minutes(5)), n), "5m");
        assert_eq!(render_age(Some(n - chrono::Duration::minutes(75)), n), "1h15m");
        assert_eq!(render_age(None, n), "<unknown>");
    }
}
