//! Arrow schema to Delta schema string conversion.

use arrow::datatypes::{DataType, Schema, TimeUnit};
use serde_json::{json, Value};

use crate::error::{DeltaError, Result};

/// Delta primitive type name for an Arrow type.
pub fn delta_type_name(column: &str, data_type: &DataType) -> Result<String> {
    let name = match data_type {
        DataType::Boolean => "boolean".to_string(),
        DataType::Int8 => "byte".to_string(),
        DataType::Int16 => "short".to_string(),
        DataType::Int32 => "integer".to_string(),
        DataType::Int64 => "long".to_string(),
        DataType::Float32 => "float".to_string(),
        DataType::Float64 => "double".to_string(),
        DataType::Utf8 | DataType::LargeUtf8 => "string".to_string(),
        DataType::Binary | DataType::LargeBinary => "binary".to_string(),
        DataType::Date32 => "date".to_string(),
        DataType::Decimal128(precision, scale) => format!("decimal({precision},{scale})"),
        DataType::Timestamp(TimeUnit::Microsecond, Some(_)) => "timestamp".to_string(),
        DataType::Timestamp(TimeUnit::Microsecond, None) => "timestamp_ntz".to_string(),
        other => {
            return Err(DeltaError::UnsupportedType {
                column: column.to_string(),
                data_type: other.to_string(),
            })
        }
    };
    Ok(name)
}

/// Serialize `schema` as a Delta struct type.
pub fn schema_string(schema: &Schema) -> Result<String> {
    let fields = schema
        .fields()
        .iter()
        .map(|field| {
            Ok(json!({
                "name": field.name(),
                "type": delta_type_name(field.name(), field.data_type())?,
                "nullable": field.is_nullable(),
                "metadata": {},
            }))
        })
        .collect::<Result<Vec<Value>>>()?;

    Ok(json!({ "type": "struct", "fields": fields }).to_string())
}
