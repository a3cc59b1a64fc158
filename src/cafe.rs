use std::sync::Arc;
use time::Date;
use tracing::info;
use crate::backend::column::Column;
use crate::backend::column_type::ValueType;
use crate::backend::data::ResultSet;
use crate::backend::db::Executor;
use crate::backend::table::{Table, TableSchema};
use crate::generator::{GeneratorSettings, VisitGenerator};
use crate::util::error;

pub const CAFE_LIST: &str = "CAFE_LIST";
pub const VISIT_DATA: &str = "VISIT_DATA";

/// Result column holding the cafe names of the average query.
pub const CAFE_COLUMN: &str = "CAFE";
/// Result column holding the average visit counts of the average query.
pub const AVERAGE_COLUMN: &str = "AVERAGE";

/// Schema of the list of cafes, populated once at startup.
pub fn cafe_list_schema() -> Result<TableSchema, error::Error> {
    return TableSchema::new(CAFE_LIST, vec![
        Column::new("ID", ValueType::Integer).with_constraints(&["PRIMARY KEY"]),
        Column::new("NAME", ValueType::Text).with_constraints(&["NOT NULL"]),
    ]);
}

/// Schema of the generated visits. CAFE holds a cafe name; no foreign key ties it to CAFE_LIST.
pub fn visit_data_schema() -> Result<TableSchema, error::Error> {
    return TableSchema::new(VISIT_DATA, vec![
        Column::new("ID", ValueType::Integer).with_constraints(&["PRIMARY KEY", "AUTOINCREMENT", "NOT NULL"]),
        Column::new("CAFE", ValueType::Text),
        Column::new("DATE", ValueType::Date),
        Column::new("VISIT_COUNT", ValueType::Integer).with_constraints(&["NOT NULL"]),
    ]);
}

/// The cafe tables and the names of the cafes, shared by the generator and the HTTP handler.
pub struct CafeData {
    cafe_table: Table,
    visit_table: Arc<Table>,
    cafe_names: Vec<String>,
}

impl CafeData {
    /// Recreates both tables, fills the cafe list with `cafe_count` names, and reads the names back.
    pub fn setup(executor: Arc<Executor>, cafe_count: u32, name_prefix: &str) -> Result<CafeData, error::Error> {
        executor.flush_tables()?;

        let cafe_table = Table::new(cafe_list_schema()?, executor.clone());
        let visit_table = Arc::new(Table::new(visit_data_schema()?, executor));
        cafe_table.create();
        visit_table.create();

        // Populate the cafe list
        for i in 1..=cafe_count {
            let row = cafe_table.schema().row()
                .set("ID", i64::from(i))
                .set("NAME", format!("{name_prefix}{i}"))
                .build()?;
            cafe_table.insert(&row)?;
        }

        let mut cafe_data = CafeData {
            cafe_table,
            visit_table,
            cafe_names: Vec::new(),
        };
        cafe_data.cafe_names = cafe_data.load_cafe_names()?;
        if cafe_data.cafe_names.is_empty() {
            return Err(error::Error::EmptyEntityList);
        }
        info!(cafes = cafe_data.cafe_names.len(), "cafe list populated");
        return Ok(cafe_data);
    }

    fn load_cafe_names(&self) -> Result<Vec<String>, error::Error> {
        let names = self.cafe_table.try_select(&["NAME"], &["NAME"], &["ORDER BY ID"])?;
        return Ok(names.column("NAME").map(|n| n.to_vec()).unwrap_or_default());
    }

    pub fn cafe_names(&self) -> &[String] {
        return &self.cafe_names;
    }

    pub fn visit_table(&self) -> &Arc<Table> {
        return &self.visit_table;
    }

    /// Creates a generator that writes visits for every cafe into the visit table.
    pub fn generator(&self, settings: GeneratorSettings, start_date: Date) -> Result<VisitGenerator, error::Error> {
        return VisitGenerator::new(self.visit_table.clone(), self.cafe_names.clone(), settings, start_date);
    }

    /// Average visit count per cafe, ordered by cafe name.
    /// Returns an empty result when the query fails.
    pub fn average_visits(&self) -> ResultSet {
        return self.visit_table.select(
            &[CAFE_COLUMN, "AVG(VISIT_COUNT) AS AVERAGE"],
            &[CAFE_COLUMN, AVERAGE_COLUMN],
            &["GROUP BY CAFE", "ORDER BY CAFE"],
        );
    }
}
