//! Batched INSERT, SELECT and UPDATE statements.
//!
//! Every function takes an open transaction so the caller decides the unit of
//! work; nothing here commits.

use crate::error::PopulatorError;
use crate::models::{NewCustomer, NewOrder, NewProduct, ProductPrice, StockUpdate};
use tokio_postgres::types::ToSql;
use tokio_postgres::Transaction;

/// Default number of rows per multi-row INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// PostgreSQL's limit on bind parameters per statement.
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// Build `($1, $2), ($3, $4), ...` for `rows` rows of `columns` columns.
pub fn values_clause(rows: usize, columns: usize) -> String {
    let mut param_idx = 1;
    let mut placeholders: Vec<String> = Vec::with_capacity(rows);

    for _ in 0..rows {
        let row_placeholders: Vec<String> = (0..columns)
            .map(|_| {
                let p = format!("${param_idx}");
                param_idx += 1;
                p
            })
            .collect();
        placeholders.push(format!("({})", row_placeholders.join(", ")));
    }

    placeholders.join(", ")
}

/// Rows per statement, capped so the bind parameter count stays legal.
fn rows_per_statement(columns: usize) -> usize {
    DEFAULT_BATCH_SIZE.min(MAX_BIND_PARAMS / columns)
}

fn insert_sql(table: &str, columns: &[&str], rows: usize, returning: &str) -> String {
    format!(
        "INSERT INTO \"{}\" ({}) VALUES {} RETURNING {}",
        table,
        columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", "),
        values_clause(rows, columns.len()),
        returning
    )
}

/// Insert customers and return their assigned ids.
pub async fn insert_customers(
    tx: &Transaction<'_>,
    customers: &[NewCustomer],
) -> Result<Vec<i32>, PopulatorError> {
    const COLUMNS: [&str; 3] = ["name", "email", "created_at"];
    let mut ids = Vec::with_capacity(customers.len());

    for chunk in customers.chunks(rows_per_statement(COLUMNS.len())) {
        let sql = insert_sql("customers", &COLUMNS, chunk.len(), "\"id\"");
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * COLUMNS.len());
        for customer in chunk {
            params.push(&customer.name);
            params.push(&customer.email);
            params.push(&customer.created_at);
        }

        for row in tx.query(&sql, &params).await? {
            ids.push(row.try_get(0)?);
        }
    }

    Ok(ids)
}

/// Insert products and return their assigned ids with the stored prices.
pub async fn insert_products(
    tx: &Transaction<'_>,
    products: &[NewProduct],
) -> Result<Vec<ProductPrice>, PopulatorError> {
    const COLUMNS: [&str; 3] = ["name", "price", "stock"];
    let mut stored = Vec::with_capacity(products.len());

    for chunk in products.chunks(rows_per_statement(COLUMNS.len())) {
        let sql = insert_sql("products", &COLUMNS, chunk.len(), "\"id\", \"price\"");
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * COLUMNS.len());
        for product in chunk {
            params.push(&product.name);
            params.push(&product.price);
            params.push(&product.stock);
        }

        for row in tx.query(&sql, &params).await? {
            stored.push(ProductPrice {
                id: row.try_get(0)?,
                price: row.try_get(1)?,
            });
        }
    }

    Ok(stored)
}

/// Insert orders and return their assigned ids.
pub async fn insert_orders(
    tx: &Transaction<'_>,
    orders: &[NewOrder],
) -> Result<Vec<i32>, PopulatorError> {
    const COLUMNS: [&str; 5] = ["customer_id", "product_id", "quantity", "total", "ordered_at"];
    let mut ids = Vec::with_capacity(orders.len());

    for chunk in orders.chunks(rows_per_statement(COLUMNS.len())) {
        let sql = insert_sql("orders", &COLUMNS, chunk.len(), "\"id\"");
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * COLUMNS.len());
        for order in chunk {
            params.push(&order.customer_id);
            params.push(&order.product_id);
            params.push(&order.quantity);
            params.push(&order.total);
            params.push(&order.ordered_at);
        }

        for row in tx.query(&sql, &params).await? {
            ids.push(row.try_get(0)?);
        }
    }

    Ok(ids)
}

/// Insert one customer and return its id.
pub async fn insert_customer(
    tx: &Transaction<'_>,
    customer: &NewCustomer,
) -> Result<i32, PopulatorError> {
    let ids = insert_customers(tx, std::slice::from_ref(customer)).await?;
    ids.into_iter()
        .next()
        .ok_or(PopulatorError::EmptySample("returned customer"))
}

/// Insert one product and return its id and price.
pub async fn insert_product(
    tx: &Transaction<'_>,
    product: &NewProduct,
) -> Result<ProductPrice, PopulatorError> {
    let stored = insert_products(tx, std::slice::from_ref(product)).await?;
    stored
        .into_iter()
        .next()
        .ok_or(PopulatorError::EmptySample("returned product"))
}

/// Insert one order and return its id.
pub async fn insert_order(tx: &Transaction<'_>, order: &NewOrder) -> Result<i32, PopulatorError> {
    let ids = insert_orders(tx, std::slice::from_ref(order)).await?;
    ids.into_iter()
        .next()
        .ok_or(PopulatorError::EmptySample("returned order"))
}

/// All customer ids currently visible to the transaction.
pub async fn select_customer_ids(tx: &Transaction<'_>) -> Result<Vec<i32>, PopulatorError> {
    let rows = tx.query("SELECT \"id\" FROM \"customers\"", &[]).await?;
    rows.iter()
        .map(|row| row.try_get(0).map_err(PopulatorError::from))
        .collect()
}

/// All product ids currently visible to the transaction.
pub async fn select_product_ids(tx: &Transaction<'_>) -> Result<Vec<i32>, PopulatorError> {
    let rows = tx.query("SELECT \"id\" FROM \"products\"", &[]).await?;
    rows.iter()
        .map(|row| row.try_get(0).map_err(PopulatorError::from))
        .collect()
}

/// All (product id, price) pairs currently visible to the transaction.
pub async fn select_product_prices(
    tx: &Transaction<'_>,
) -> Result<Vec<ProductPrice>, PopulatorError> {
    let rows = tx
        .query("SELECT \"id\", \"price\" FROM \"products\"", &[])
        .await?;
    rows.iter()
        .map(|row| -> Result<ProductPrice, PopulatorError> {
            Ok(ProductPrice {
                id: row.try_get(0)?,
                price: row.try_get(1)?,
            })
        })
        .collect()
}

/// Overwrite a product's stock level.
pub async fn update_stock(
    tx: &Transaction<'_>,
    update: &StockUpdate,
) -> Result<u64, PopulatorError> {
    let updated = tx
        .execute(
            "UPDATE \"products\" SET \"stock\" = $1 WHERE \"id\" = $2",
            &[&update.stock, &update.product_id],
        )
        .await?;
    Ok(updated)
}
