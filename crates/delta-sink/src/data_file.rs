//! Parquet encoding for table data files.

use std::io::Cursor;

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::Result;

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(crate::ENGINE_INFO.to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encode one batch as a snappy-compressed Parquet file.
pub fn encode_parquet(batch: &RecordBatch) -> Result<Bytes> {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, batch.schema(), Some(writer_properties()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Decode every record batch of a Parquet file.
pub fn decode_parquet(bytes: Bytes) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Array, Decimal128Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    #[test]
    fn test_parquet_preserves_values_and_nulls() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("price", DataType::Decimal128(10, 2), true),
        ]));
        let price = Decimal128Array::from(vec![Some(1999), None])
            .with_precision_and_scale(10, 2)
            .unwrap();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![Some(1), Some(2)])),
                Arc::new(StringArray::from(vec![Some("Desk"), None])),
                Arc::new(price),
            ],
        )
        .unwrap();

        let bytes = encode_parquet(&batch).unwrap();
        assert_eq!(&bytes[..4], b"PAR1");

        let decoded = decode_parquet(bytes).unwrap();
        let total: usize = decoded.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(total, 2);

        let out = &decoded[0];
        assert_eq!(out.schema().field(2).data_type(), &DataType::Decimal128(10, 2));
        let names = out.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.value(0), "Desk");
        assert!(names.is_null(1));
        let prices = out.column(2).as_any().downcast_ref::<Decimal128Array>().unwrap();
        assert_eq!(prices.value(0), 1999);
        assert!(prices.is_null(1));
    }
}
