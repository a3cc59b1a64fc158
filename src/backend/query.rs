use crate::backend::table::TableSchema;

/// Column that holds each table name in the result of a SHOW_TABLES statement.
pub const TABLE_NAME_COLUMN: &str = "TABLE_NAME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Create,
    Insert,
    Select,
    Drop,
    ShowTables,
}

/// Builds a single statement, terminated by a semicolon.
///
/// `values` are the positional literals of an INSERT, or the projection list of a SELECT
/// (column names or `expr AS alias`). They are placed into the statement as given, so text
/// and dates must already be formatted as literals. CREATE, DROP and SHOW_TABLES ignore them.
///
/// `modifiers` (e.g. `GROUP BY CAFE`) are appended verbatim, separated by spaces.
pub fn build_query<S: AsRef<str>, M: AsRef<str>>(kind: QueryKind, schema: &TableSchema, values: &[S], modifiers: &[M]) -> String {
    let table_name = schema.table_name();
    let joined_values = values.iter().map(|v| v.as_ref()).collect::<Vec<_>>().join(", ");

    let mut query: String = match kind {
        QueryKind::Create => {
            let definitions = schema.columns().iter()
                .map(|c| c.definition())
                .collect::<Vec<_>>()
                .join(", ");
            format!("CREATE TABLE {table_name} ( {definitions} )")
        },
        QueryKind::Insert => {
            format!("INSERT INTO {table_name} VALUES ( {joined_values} )")
        },
        QueryKind::Select => {
            format!("SELECT {joined_values} FROM {table_name}")
        },
        QueryKind::Drop => {
            format!("DROP TABLE {table_name}")
        },
        QueryKind::ShowTables => {
            show_tables_body()
        }
    };

    for modifier in modifiers.iter() {
        let modifier = modifier.as_ref().trim();
        if !modifier.is_empty() {
            query.push(' ');
            query.push_str(modifier);
        }
    }
    query.push(';');
    return query;
}

/// Builds the statement listing every user table, which needs no schema.
pub fn show_tables_query() -> String {
    return format!("{};", show_tables_body());
}

fn show_tables_body() -> String {
    return format!("SELECT name AS {TABLE_NAME_COLUMN} FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::column::Column;
    use crate::backend::column_type::ValueType;

    const NONE: &[&str] = &[];

    fn visit_schema() -> TableSchema {
        return TableSchema::new("VISIT_DATA", vec![
            Column::new("ID", ValueType::Integer).with_constraints(&["PRIMARY KEY", "AUTOINCREMENT", "NOT NULL"]),
            Column::new("CAFE", ValueType::Text),
            Column::new("DATE", ValueType::Date),
            Column::new("VISIT_COUNT", ValueType::Integer).with_constraints(&["NOT NULL"]),
        ]).unwrap();
    }

    #[test]
    fn create_lists_columns_in_declared_order() {
        let schema = TableSchema::new("PAIR", vec![
            Column::new("N1", ValueType::Integer),
            Column::new("N2", ValueType::Text),
        ]).unwrap();
        let query = build_query(QueryKind::Create, &schema, NONE, NONE);
        assert_eq!(query, "CREATE TABLE PAIR ( N1 INTEGER, N2 VARCHAR(255) );");

        let first = query.find("N1 INTEGER").unwrap();
        let second = query.find("N2 VARCHAR(255)").unwrap();
        assert!(first < second);
        assert!(!query.contains(", )"));
    }

    #[test]
    fn create_includes_constraints() {
        let query = build_query(QueryKind::Create, &visit_schema(), NONE, NONE);
        assert_eq!(
            query,
            "CREATE TABLE VISIT_DATA ( ID INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, CAFE VARCHAR(255), DATE DATE, VISIT_COUNT INTEGER NOT NULL );"
        );
    }

    #[test]
    fn insert_places_values_verbatim() {
        let values = ["1", "'X'", "DATE'2024-01-01'", "5"];
        let query = build_query(QueryKind::Insert, &visit_schema(), &values, NONE);
        assert_eq!(query, "INSERT INTO VISIT_DATA VALUES ( 1, 'X', DATE'2024-01-01', 5 );");
    }

    #[test]
    fn select_appends_modifiers_in_order() {
        let query = build_query(
            QueryKind::Select,
            &visit_schema(),
            &["CAFE", "AVG(VISIT_COUNT) AS AVERAGE"],
            &["GROUP BY CAFE", "ORDER BY CAFE"],
        );
        assert_eq!(query, "SELECT CAFE, AVG(VISIT_COUNT) AS AVERAGE FROM VISIT_DATA GROUP BY CAFE ORDER BY CAFE;");
    }

    #[test]
    fn select_without_modifiers() {
        let query = build_query(QueryKind::Select, &visit_schema(), &["ID"], NONE);
        assert_eq!(query, "SELECT ID FROM VISIT_DATA;");
    }

    #[test]
    fn drop_and_show_tables_have_fixed_shape() {
        let schema = visit_schema();
        assert_eq!(build_query(QueryKind::Drop, &schema, &["ignored"], NONE), "DROP TABLE VISIT_DATA;");
        let show = build_query(QueryKind::ShowTables, &schema, NONE, NONE);
        assert!(show.starts_with("SELECT name AS TABLE_NAME FROM sqlite_master"));
        assert!(show.ends_with(';'));
        assert!(!show.contains("VISIT_DATA"));
        assert_eq!(show, show_tables_query());
    }
}
