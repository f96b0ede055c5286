//! Column type model for synthetic tables.
//!
//! A [`Schema`] is an ordered list of [`ColumnMeta`] entries, each carrying a
//! recursive [`DataType`]. The textual form mirrors what users pass on the
//! command line and in YAML configs:
//!
//! - primitive types are plain tokens: `"int"`, `"float"`, `"str"`,
//!   `"largestr"`, `"bool"`
//! - a list is a one-element sequence holding the item type: `["int"]`
//! - a struct is a mapping of field name to type: `{"x": "int", "y": "str"}`
//!
//! Column order is preserved exactly as written since it decides the physical
//! layout of every format written from the table.

use std::{fmt, str::FromStr, sync::Arc};

use arrow::datatypes::{DataType as ArrowDataType, Field, Fields, Schema as ArrowSchema};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
};

use crate::error::{BenchError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Float,
    Str,
    LargeStr,
    Bool,
    List(Box<DataType>),
    Struct(Vec<ColumnMeta>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: DataType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            name: name.into(),
            datatype,
        }
    }
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Str => "str",
            DataType::LargeStr => "largestr",
            DataType::Bool => "bool",
            DataType::List(_) => "list",
            DataType::Struct(_) => "struct",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["int", "float", "str", "largestr", "bool", "[item]", "{field: type}"]
    }

    pub fn to_arrow(&self) -> ArrowDataType {
        match self {
            DataType::Int => ArrowDataType::Int64,
            DataType::Float => ArrowDataType::Float64,
            DataType::Str => ArrowDataType::Utf8,
            DataType::LargeStr => ArrowDataType::LargeUtf8,
            DataType::Bool => ArrowDataType::Boolean,
            DataType::List(item) => {
                ArrowDataType::List(Arc::new(Field::new("item", item.to_arrow(), true)))
            }
            DataType::Struct(fields) => ArrowDataType::Struct(
                fields
                    .iter()
                    .map(|field| Field::new(&field.name, field.datatype.to_arrow(), true))
                    .collect::<Fields>(),
            ),
        }
    }

    pub fn from_arrow(datatype: &ArrowDataType) -> Result<Self> {
        let converted = match datatype {
            ArrowDataType::Int64 => DataType::Int,
            ArrowDataType::Float64 => DataType::Float,
            ArrowDataType::Utf8 => DataType::Str,
            ArrowDataType::LargeUtf8 => DataType::LargeStr,
            ArrowDataType::Boolean => DataType::Bool,
            ArrowDataType::List(item) => {
                DataType::List(Box::new(DataType::from_arrow(item.data_type())?))
            }
            ArrowDataType::Struct(fields) => {
                if fields.is_empty() {
                    return Err(BenchError::Schema("struct without fields".into()));
                }
                let columns = fields
                    .iter()
                    .map(|field| {
                        DataType::from_arrow(field.data_type())
                            .map(|datatype| ColumnMeta::new(field.name(), datatype))
                    })
                    .collect::<Result<Vec<_>>>()?;
                DataType::Struct(columns)
            }
            other => {
                return Err(BenchError::Schema(format!(
                    "Arrow type {other} has no synthetic counterpart"
                )));
            }
        };
        Ok(converted)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::List(item) => write!(f, "[{item}]"),
            DataType::Struct(fields) => {
                write!(f, "{{")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.datatype)?;
                }
                write!(f, "}}")
            }
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl FromStr for DataType {
    type Err = BenchError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(DataType::Int),
            "float" | "double" => Ok(DataType::Float),
            "str" | "string" => Ok(DataType::Str),
            "largestr" | "large_string" => Ok(DataType::LargeStr),
            "bool" | "boolean" => Ok(DataType::Bool),
            _ => Err(BenchError::Schema(format!(
                "Unsupported data type '{value}'. Supported types: {}",
                DataType::variants().join(", ")
            ))),
        }
    }
}

impl Serialize for DataType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DataType::List(item) => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(item.as_ref())?;
                seq.end()
            }
            DataType::Struct(fields) => serialize_columns(fields, serializer),
            other => serializer.serialize_str(other.as_str()),
        }
    }
}

fn serialize_columns<S>(columns: &[ColumnMeta], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(columns.len()))?;
    for column in columns {
        map.serialize_entry(&column.name, &column.datatype)?;
    }
    map.end()
}

struct DataTypeVisitor;

impl<'de> Visitor<'de> for DataTypeVisitor {
    type Value = DataType;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a type name, a one-element list or a mapping of field types")
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<DataType, E>
    where
        E: de::Error,
    {
        DataType::from_str(value).map_err(E::custom)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<DataType, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let item: DataType = seq
            .next_element()?
            .ok_or_else(|| de::Error::custom("list type requires an item type"))?;
        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::custom("list type takes exactly one item type"));
        }
        Ok(DataType::List(Box::new(item)))
    }

    fn visit_map<A>(self, map: A) -> std::result::Result<DataType, A::Error>
    where
        A: MapAccess<'de>,
    {
        collect_columns(map).map(DataType::Struct)
    }
}

fn collect_columns<'de, A>(mut map: A) -> std::result::Result<Vec<ColumnMeta>, A::Error>
where
    A: MapAccess<'de>,
{
    let mut columns: Vec<ColumnMeta> = Vec::new();
    while let Some((name, datatype)) = map.next_entry::<String, DataType>()? {
        if columns.iter().any(|c| c.name == name) {
            return Err(de::Error::custom(format!("duplicate field '{name}'")));
        }
        columns.push(ColumnMeta { name, datatype });
    }
    if columns.is_empty() {
        return Err(de::Error::custom("struct type requires at least one field"));
    }
    Ok(columns)
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DataTypeVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnMeta>) -> Result<Self> {
        if columns.is_empty() {
            return Err(BenchError::Schema("schema requires at least one column".into()));
        }
        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(BenchError::Schema(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Parses the JSON form used on the command line, e.g. `{"a": "int", "c": ["int"]}`.
    pub fn parse_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| BenchError::Schema(err.to_string()))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn to_arrow(&self) -> ArrowSchema {
        ArrowSchema::new(
            self.columns
                .iter()
                .map(|c| Field::new(&c.name, c.datatype.to_arrow(), true))
                .collect::<Vec<_>>(),
        )
    }

    pub fn from_arrow(schema: &ArrowSchema) -> Result<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                DataType::from_arrow(field.data_type())
                    .map(|datatype| ColumnMeta::new(field.name(), datatype))
            })
            .collect::<Result<Vec<_>>>()?;
        Schema::new(columns)
    }
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_columns(&self.columns, serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = Schema;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of column name to data type")
            }

            fn visit_map<A>(self, map: A) -> std::result::Result<Schema, A::Error>
            where
                A: MapAccess<'de>,
            {
                collect_columns(map).map(|columns| Schema { columns })
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", DataType::Struct(self.columns.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_preserves_column_order() {
        let schema = Schema::parse_json(r#"{"z": "int", "b": "str", "a": ["float"]}"#).unwrap();
        assert_eq!(schema.names(), vec!["z", "b", "a"]);
        assert_eq!(
            schema.columns[2].datatype,
            DataType::List(Box::new(DataType::Float))
        );
    }

    #[test]
    fn parse_json_handles_nested_structs() {
        let schema =
            Schema::parse_json(r#"{"s": {"x": "int", "y": ["largestr"]}, "flag": "bool"}"#)
                .unwrap();
        match &schema.columns[0].datatype {
            DataType::Struct(fields) => {
                assert_eq!(fields[0], ColumnMeta::new("x", DataType::Int));
                assert_eq!(
                    fields[1].datatype,
                    DataType::List(Box::new(DataType::LargeStr))
                );
            }
            other => panic!("Expected struct, got {other:?}"),
        }
    }

    #[test]
    fn parse_json_rejects_unknown_and_malformed_types() {
        for text in [
            r#"{"a": "unknown"}"#,
            r#"{"a": []}"#,
            r#"{"a": ["int", "str"]}"#,
            r#"{"a": {}}"#,
            r#"{"a": 1}"#,
        ] {
            let err = Schema::parse_json(text).unwrap_err();
            assert!(matches!(err, BenchError::Schema(_)), "{text}: {err}");
        }
    }

    #[test]
    fn arrow_conversion_round_trips() {
        let schema =
            Schema::parse_json(r#"{"a": "int", "b": "largestr", "c": [{"x": "bool"}]}"#).unwrap();
        let arrow = schema.to_arrow();
        assert_eq!(arrow.field(1).data_type(), &ArrowDataType::LargeUtf8);
        assert_eq!(Schema::from_arrow(&arrow).unwrap(), schema);
    }

    #[test]
    fn from_arrow_rejects_types_without_counterpart() {
        let arrow = ArrowSchema::new(vec![Field::new("d", ArrowDataType::Date32, true)]);
        assert!(matches!(
            Schema::from_arrow(&arrow),
            Err(BenchError::Schema(_))
        ));
    }

    #[test]
    fn serialization_matches_cli_form() {
        let schema = Schema::parse_json(r#"{"a": "int", "c": ["int"]}"#).unwrap();
        let text = serde_json::to_string(&schema).unwrap();
        assert_eq!(text, r#"{"a":"int","c":["int"]}"#);
    }
}
