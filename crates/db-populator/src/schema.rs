//! DDL for the three generated tables.

/// Customers table name.
pub const CUSTOMERS: &str = "customers";
/// Products table name.
pub const PRODUCTS: &str = "products";
/// Orders table name.
pub const ORDERS: &str = "orders";

/// Tables in creation order (referenced tables first).
pub const TABLES: [&str; 3] = [CUSTOMERS, PRODUCTS, ORDERS];

/// Generate the `CREATE TABLE IF NOT EXISTS` statement for one table.
pub fn generate_create_table(table_name: &str) -> Option<&'static str> {
    match table_name {
        CUSTOMERS => Some(
            "CREATE TABLE IF NOT EXISTS \"customers\" (\
             \"id\" SERIAL PRIMARY KEY, \
             \"name\" VARCHAR NOT NULL, \
             \"email\" VARCHAR NOT NULL, \
             \"created_at\" TIMESTAMP)",
        ),
        PRODUCTS => Some(
            "CREATE TABLE IF NOT EXISTS \"products\" (\
             \"id\" SERIAL PRIMARY KEY, \
             \"name\" VARCHAR NOT NULL, \
             \"price\" NUMERIC(10, 2), \
             \"stock\" INTEGER)",
        ),
        ORDERS => Some(
            "CREATE TABLE IF NOT EXISTS \"orders\" (\
             \"id\" SERIAL PRIMARY KEY, \
             \"customer_id\" INTEGER REFERENCES \"customers\" (\"id\"), \
             \"product_id\" INTEGER REFERENCES \"products\" (\"id\"), \
             \"quantity\" INTEGER, \
             \"total\" NUMERIC(10, 2), \
             \"ordered_at\" TIMESTAMP)",
        ),
        _ => None,
    }
}

/// All DDL statements, in creation order.
pub fn create_all_statements() -> Vec<&'static str> {
    TABLES.iter().filter_map(|t| generate_create_table(t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_create_table_customers() {
        let sql = generate_create_table("customers").unwrap();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS \"customers\""));
        assert!(sql.contains("\"id\" SERIAL PRIMARY KEY"));
        assert!(sql.contains("\"email\" VARCHAR NOT NULL"));
    }

    #[test]
    fn test_generate_create_table_orders_has_foreign_keys() {
        let sql = generate_create_table("orders").unwrap();
        assert!(sql.contains("\"customer_id\" INTEGER REFERENCES \"customers\" (\"id\")"));
        assert!(sql.contains("\"product_id\" INTEGER REFERENCES \"products\" (\"id\")"));
        assert!(sql.contains("\"total\" NUMERIC(10, 2)"));
    }

    #[test]
    fn test_unknown_table() {
        assert!(generate_create_table("invoices").is_none());
    }

    #[test]
    fn test_creation_order_puts_orders_last() {
        let statements = create_all_statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[2].contains("\"orders\""));
    }
}
