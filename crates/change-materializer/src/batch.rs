//! Arrow layout of the materialized `products` table.

use std::sync::Arc;

use arrow::array::{ArrayRef, Decimal128Array, Int32Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::envelope::{ProductRow, PRICE_PRECISION, PRICE_SCALE};

const TIMEZONE: &str = "UTC";

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(TIMEZONE.into()))
}

/// Table schema. Every column is nullable, matching the row image.
pub fn product_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, true),
        Field::new("name", DataType::Utf8, true),
        Field::new("description", DataType::Utf8, true),
        Field::new(
            "price",
            DataType::Decimal128(PRICE_PRECISION, PRICE_SCALE as i8),
            true,
        ),
        Field::new("created_at", timestamp_type(), true),
        Field::new("updated_at", timestamp_type(), true),
    ]))
}

/// Build one record batch from row images, preserving their order.
pub fn rows_to_batch(rows: &[ProductRow]) -> Result<RecordBatch, ArrowError> {
    let ids: Int32Array = rows.iter().map(|r| r.id).collect();
    let names: StringArray = rows.iter().map(|r| r.name.as_deref()).collect();
    let descriptions: StringArray = rows.iter().map(|r| r.description.as_deref()).collect();
    let prices = rows
        .iter()
        .map(|r| r.price)
        .collect::<Decimal128Array>()
        .with_precision_and_scale(PRICE_PRECISION, PRICE_SCALE as i8)?;
    let created = rows
        .iter()
        .map(|r| r.created_at)
        .collect::<TimestampMicrosecondArray>()
        .with_timezone(TIMEZONE);
    let updated = rows
        .iter()
        .map(|r| r.updated_at)
        .collect::<TimestampMicrosecondArray>()
        .with_timezone(TIMEZONE);

    let columns: Vec<ArrayRef> = vec![
        Arc::new(ids),
        Arc::new(names),
        Arc::new(descriptions),
        Arc::new(prices),
        Arc::new(created),
        Arc::new(updated),
    ];
    RecordBatch::try_new(product_schema(), columns)
}
