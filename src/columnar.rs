//! Conversion between [`Table`] and Arrow record batches.

use std::sync::Arc;

use arrow::{
    array::{
        Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, LargeStringArray,
        ListArray, StringArray, StructArray,
    },
    buffer::{NullBuffer, OffsetBuffer},
    datatypes::{Field, Float64Type, Int64Type},
    record_batch::RecordBatch,
};

use crate::{
    data::{Table, Value},
    error::{BenchError, Result},
    schema::{DataType, Schema},
};

static NULL: Value = Value::Null;

pub fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    let schema = Arc::new(table.schema().to_arrow());
    let arrays = table
        .schema()
        .columns
        .iter()
        .zip(table.columns())
        .map(|(meta, column)| {
            let values = column.iter().collect::<Vec<_>>();
            build_array(&meta.datatype, &values)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RecordBatch::try_new(schema, arrays)?)
}

pub fn from_record_batch(batch: &RecordBatch) -> Result<Table> {
    let schema = Schema::from_arrow(batch.schema().as_ref())?;
    let columns = schema
        .columns
        .iter()
        .zip(batch.columns())
        .map(|(meta, array)| read_array(array.as_ref(), &meta.datatype))
        .collect::<Result<Vec<_>>>()?;
    Table::try_new(schema, columns)
}

fn mismatch(datatype: &DataType, value: &Value) -> BenchError {
    BenchError::Schema(format!("value {value} does not match type {datatype}"))
}

fn build_array(datatype: &DataType, values: &[&Value]) -> Result<ArrayRef> {
    let array: ArrayRef = match datatype {
        DataType::Int => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Int(i) => Ok(Some(*i)),
                    Value::Null => Ok(None),
                    other => Err(mismatch(datatype, other)),
                })
                .collect::<Result<Int64Array>>()?,
        ),
        DataType::Float => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Float(f) => Ok(Some(*f)),
                    Value::Null => Ok(None),
                    other => Err(mismatch(datatype, other)),
                })
                .collect::<Result<Float64Array>>()?,
        ),
        DataType::Str => Arc::new(collect_strings(datatype, values)?.into_iter().collect::<StringArray>()),
        DataType::LargeStr => Arc::new(
            collect_strings(datatype, values)?
                .into_iter()
                .collect::<LargeStringArray>(),
        ),
        DataType::Bool => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Bool(b) => Ok(Some(*b)),
                    Value::Null => Ok(None),
                    other => Err(mismatch(datatype, other)),
                })
                .collect::<Result<BooleanArray>>()?,
        ),
        DataType::List(item) => {
            let mut lengths = Vec::with_capacity(values.len());
            let mut validity = Vec::with_capacity(values.len());
            let mut children: Vec<&Value> = Vec::new();
            for value in values {
                match value {
                    Value::List(items) => {
                        lengths.push(items.len());
                        validity.push(true);
                        children.extend(items.iter());
                    }
                    Value::Null => {
                        lengths.push(0);
                        validity.push(false);
                    }
                    other => return Err(mismatch(datatype, other)),
                }
            }
            let child = build_array(item, &children)?;
            let field = Arc::new(Field::new("item", item.to_arrow(), true));
            Arc::new(ListArray::try_new(
                field,
                OffsetBuffer::from_lengths(lengths),
                child,
                null_buffer(validity),
            )?)
        }
        DataType::Struct(fields) => {
            let mut validity = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Struct(items) if items.len() == fields.len() => validity.push(true),
                    Value::Null => validity.push(false),
                    other => return Err(mismatch(datatype, other)),
                }
            }
            let children = fields
                .iter()
                .enumerate()
                .map(|(idx, field)| {
                    let child_values = values
                        .iter()
                        .map(|value| match value {
                            Value::Struct(items) => &items[idx],
                            _ => &NULL,
                        })
                        .collect::<Vec<_>>();
                    build_array(&field.datatype, &child_values)
                })
                .collect::<Result<Vec<_>>>()?;
            let arrow_fields = match datatype.to_arrow() {
                arrow::datatypes::DataType::Struct(fields) => fields,
                other => {
                    return Err(BenchError::Invariant(format!(
                        "struct type converted to {other}"
                    )));
                }
            };
            Arc::new(StructArray::try_new(
                arrow_fields,
                children,
                null_buffer(validity),
            )?)
        }
    };
    Ok(array)
}

fn collect_strings<'a>(datatype: &DataType, values: &[&'a Value]) -> Result<Vec<Option<&'a str>>> {
    values
        .iter()
        .map(|value| match value {
            Value::Str(s) => Ok(Some(s.as_str())),
            Value::Null => Ok(None),
            other => Err(mismatch(datatype, other)),
        })
        .collect()
}

fn null_buffer(validity: Vec<bool>) -> Option<NullBuffer> {
    if validity.iter().all(|valid| *valid) {
        None
    } else {
        Some(NullBuffer::from(validity))
    }
}

fn read_array(array: &dyn Array, datatype: &DataType) -> Result<Vec<Value>> {
    let values = match datatype {
        DataType::Int => array
            .as_primitive::<Int64Type>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Int))
            .collect(),
        DataType::Float => array
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Float))
            .collect(),
        DataType::Str => array
            .as_string::<i32>()
            .iter()
            .map(|v| v.map_or(Value::Null, |s| Value::Str(s.to_string())))
            .collect(),
        DataType::LargeStr => array
            .as_string::<i64>()
            .iter()
            .map(|v| v.map_or(Value::Null, |s| Value::Str(s.to_string())))
            .collect(),
        DataType::Bool => array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        DataType::List(item) => {
            let list = array.as_list::<i32>();
            let mut out = Vec::with_capacity(list.len());
            for idx in 0..list.len() {
                if list.is_null(idx) {
                    out.push(Value::Null);
                } else {
                    let child = list.value(idx);
                    out.push(Value::List(read_array(child.as_ref(), item)?));
                }
            }
            out
        }
        DataType::Struct(fields) => {
            let array = array.as_struct();
            let children = fields
                .iter()
                .enumerate()
                .map(|(idx, field)| read_array(array.column(idx).as_ref(), &field.datatype))
                .collect::<Result<Vec<_>>>()?;
            (0..array.len())
                .map(|row| {
                    if array.is_null(row) {
                        Value::Null
                    } else {
                        Value::Struct(children.iter().map(|child| child[row].clone()).collect())
                    }
                })
                .collect()
        }
    };
    Ok(values)
}
