use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Serialize, Deserialize};
use time::Date;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use crate::backend::data::Row;
use crate::backend::table::{Table, TableSchema};
use crate::util::error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
/// How the cafe for the next visit is chosen.
pub enum Selection {
    /// Cafes are visited in list order, wrapping around, so every cafe gets the same number of rows.
    #[default]
    RoundRobin,
    /// A cafe is picked uniformly at random on every tick.
    Random,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorSettings {
    generations_per_day: NonZeroU64,
    visit_limit: u32,
    selection: Selection,
}

impl GeneratorSettings {
    /// `generations_per_day` ticks make up one simulated day; each visit count is below `visit_limit`.
    pub fn new(generations_per_day: u64, visit_limit: u32, selection: Selection) -> Result<Self, error::Error> {
        let generations_per_day = match NonZeroU64::new(generations_per_day) {
            Some(n) => n,
            None => { return Err(error::Error::InvalidConfig(String::from("generations per day must be at least 1"))); }
        };
        if visit_limit == 0 {
            return Err(error::Error::InvalidConfig(String::from("visit limit must be at least 1")));
        }
        return Ok(GeneratorSettings { generations_per_day, visit_limit, selection });
    }

    pub fn generations_per_day(&self) -> u64 {
        return self.generations_per_day.get();
    }

    pub fn visit_limit(&self) -> u32 {
        return self.visit_limit;
    }

    pub fn selection(&self) -> Selection {
        return self.selection;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorState {
    pub simulated_date: Date,
    pub generation_counter: u64,
    pub cafe_cursor: usize,
}

impl GeneratorState {
    pub fn new(start_date: Date) -> Self {
        return GeneratorState {
            simulated_date: start_date,
            generation_counter: 0,
            cafe_cursor: 0,
        };
    }
}

/// One generated visit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub id: u64,
    pub cafe: String,
    pub date: Date,
    pub visit_count: u32,
}

impl Visit {
    /// Builds the VISIT_DATA row for this visit.
    pub fn to_row(&self, schema: &TableSchema) -> Result<Row, error::Error> {
        let id = match i64::try_from(self.id) {
            Ok(id) => id,
            Err(_) => { return Err(error::Error::AdhocError("The generation counter no longer fits in a row ID.")); }
        };
        return schema.row()
            .set("ID", id)
            .set("CAFE", self.cafe.as_str())
            .set("DATE", self.date)
            .set("VISIT_COUNT", i64::from(self.visit_count))
            .build();
    }
}

/// Computes one tick: the visit it produces and the state after it.
/// The date moves forward a day whenever the new generation counter is a multiple of `generations_per_day`.
pub fn next_state<R: Rng>(state: &GeneratorState, cafes: &[String], settings: &GeneratorSettings, rng: &mut R) -> Result<(GeneratorState, Visit), error::Error> {
    if cafes.is_empty() {
        return Err(error::Error::EmptyEntityList);
    }

    // Pick the cafe
    let cafe_idx = match settings.selection {
        Selection::RoundRobin => state.cafe_cursor % cafes.len(),
        Selection::Random => rng.gen_range(0..cafes.len()),
    };
    let visit = Visit {
        id: state.generation_counter,
        cafe: cafes[cafe_idx].clone(),
        date: state.simulated_date,
        visit_count: rng.gen_range(0..settings.visit_limit),
    };

    // Advance the clock
    let generation_counter = state.generation_counter + 1;
    let simulated_date = if generation_counter % settings.generations_per_day.get() == 0 {
        match state.simulated_date.next_day() {
            Some(d) => d,
            None => { return Err(error::Error::AdhocError("The simulated date ran past the last representable day.")); }
        }
    } else {
        state.simulated_date
    };

    let cafe_cursor = match settings.selection {
        Selection::RoundRobin => (cafe_idx + 1) % cafes.len(),
        Selection::Random => state.cafe_cursor,
    };

    return Ok((GeneratorState { simulated_date, generation_counter, cafe_cursor }, visit));
}

/// Produces one VISIT_DATA row per tick.
pub struct VisitGenerator {
    state: GeneratorState,
    cafes: Vec<String>,
    settings: GeneratorSettings,
    visit_table: Arc<Table>,
    rng: StdRng,
}

impl VisitGenerator {
    pub fn new(visit_table: Arc<Table>, cafes: Vec<String>, settings: GeneratorSettings, start_date: Date) -> Result<Self, error::Error> {
        return Self::with_rng(visit_table, cafes, settings, start_date, StdRng::from_entropy());
    }

    /// Creates a generator with a caller-supplied random source, e.g. a seeded one.
    pub fn with_rng(visit_table: Arc<Table>, cafes: Vec<String>, settings: GeneratorSettings, start_date: Date, rng: StdRng) -> Result<Self, error::Error> {
        if cafes.is_empty() {
            return Err(error::Error::EmptyEntityList);
        }
        return Ok(VisitGenerator {
            state: GeneratorState::new(start_date),
            cafes,
            settings,
            visit_table,
            rng,
        });
    }

    pub fn state(&self) -> &GeneratorState {
        return &self.state;
    }

    /// Generates and inserts one visit.
    /// The state advances even when the insert fails, so a failed tick is never retried.
    pub fn tick(&mut self) -> Result<Visit, error::Error> {
        let (next, visit) = next_state(&self.state, &self.cafes, &self.settings, &mut self.rng)?;
        self.state = next;

        let inserted = visit.to_row(self.visit_table.schema())
            .and_then(|row| self.visit_table.try_insert(&row));
        if let Err(e) = inserted {
            warn!(id = visit.id, cafe = %visit.cafe, error = %e, "visit was not inserted");
        }
        debug!(id = visit.id, cafe = %visit.cafe, date = %visit.date, visits = visit.visit_count, "visit generated");
        return Ok(visit);
    }
}

/// Ticks the generator at a fixed rate until `shutdown` turns true or its sender is dropped, then hands the generator back.
/// Ticks that fall due while a previous one is still running are skipped rather than queued.
pub async fn run_generator(mut generator: VisitGenerator, initial_delay: Duration, period: Duration, mut shutdown: watch::Receiver<bool>) -> Result<VisitGenerator, error::Error> {
    let mut interval = interval_at(Instant::now() + initial_delay, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(initial_delay_ms = initial_delay.as_millis() as u64, period_ms = period.as_millis() as u64, "data generator started");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let (g, result) = tokio::task::spawn_blocking(move || {
                    let result = generator.tick();
                    (generator, result)
                }).await?;
                generator = g;
                if let Err(e) = result {
                    warn!(error = %e, "data generator stopped");
                    return Err(e);
                }
            }
            _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => {
                debug!("data generator shutting down");
                return Ok(generator);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;
    use crate::backend::db::Executor;

    fn cafes(n: usize) -> Vec<String> {
        return (1..=n).map(|i| format!("Cafe_{i}")).collect();
    }

    fn start() -> Date {
        return Date::from_calendar_date(2024, Month::February, 28).unwrap();
    }

    #[test]
    fn date_rolls_over_after_a_day_of_ticks() {
        let settings = GeneratorSettings::new(20, 11, Selection::RoundRobin).unwrap();
        let names = cafes(5);
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = GeneratorState::new(start());

        for tick in 1..=20 {
            let (next, visit) = next_state(&state, &names, &settings, &mut rng).unwrap();
            assert_eq!(visit.date, start());
            assert_eq!(visit.id, tick - 1);
            state = next;
            if tick < 20 {
                assert_eq!(state.simulated_date, start());
            }
        }
        assert_eq!(state.simulated_date, Date::from_calendar_date(2024, Month::February, 29).unwrap());
        assert_eq!(state.generation_counter, 20);

        // The counter keeps counting across the day boundary
        for _ in 0..20 {
            state = next_state(&state, &names, &settings, &mut rng).unwrap().0;
        }
        assert_eq!(state.generation_counter, 40);
        assert_eq!(state.simulated_date, Date::from_calendar_date(2024, Month::March, 1).unwrap());
    }

    #[test]
    fn round_robin_visits_each_cafe_once_per_cycle() {
        let settings = GeneratorSettings::new(20, 11, Selection::RoundRobin).unwrap();
        let names = cafes(5);
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = GeneratorState::new(start());
        let initial_cursor = state.cafe_cursor;

        let mut visited: Vec<String> = Vec::new();
        for _ in 0..5 {
            let (next, visit) = next_state(&state, &names, &settings, &mut rng).unwrap();
            visited.push(visit.cafe);
            state = next;
        }
        assert_eq!(state.cafe_cursor, initial_cursor);
        assert_eq!(visited, names);
    }

    #[test]
    fn visit_counts_stay_below_the_limit() {
        let settings = GeneratorSettings::new(3, 4, Selection::RoundRobin).unwrap();
        let names = cafes(2);
        let mut rng = StdRng::seed_from_u64(99);
        let mut state = GeneratorState::new(start());
        for _ in 0..200 {
            let (next, visit) = next_state(&state, &names, &settings, &mut rng).unwrap();
            assert!(visit.visit_count < 4);
            state = next;
        }
    }

    #[test]
    fn random_selection_leaves_the_cursor_alone() {
        let settings = GeneratorSettings::new(20, 11, Selection::Random).unwrap();
        let names = cafes(3);
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = GeneratorState::new(start());
        for _ in 0..30 {
            let (next, visit) = next_state(&state, &names, &settings, &mut rng).unwrap();
            assert!(names.contains(&visit.cafe));
            assert_eq!(next.cafe_cursor, 0);
            state = next;
        }
        assert_eq!(state.generation_counter, 30);
    }

    #[test]
    fn empty_cafe_list_is_rejected() {
        let settings = GeneratorSettings::new(20, 11, Selection::RoundRobin).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let result = next_state(&GeneratorState::new(start()), &[], &settings, &mut rng);
        assert!(matches!(result, Err(error::Error::EmptyEntityList)));
    }

    #[test]
    fn settings_must_be_positive() {
        assert!(GeneratorSettings::new(0, 11, Selection::RoundRobin).is_err());
        assert!(GeneratorSettings::new(20, 0, Selection::RoundRobin).is_err());
    }

    #[test]
    fn tick_advances_even_when_the_insert_fails() {
        let executor = Arc::new(Executor::open_in_memory().unwrap());
        let visit_table = Arc::new(Table::new(crate::cafe::visit_data_schema().unwrap(), executor));
        // The table is never created, so every insert fails
        let settings = GeneratorSettings::new(2, 11, Selection::RoundRobin).unwrap();
        let mut generator = VisitGenerator::with_rng(visit_table, cafes(3), settings, start(), StdRng::seed_from_u64(3)).unwrap();

        generator.tick().unwrap();
        generator.tick().unwrap();
        let state = generator.state();
        assert_eq!(state.generation_counter, 2);
        assert_eq!(state.cafe_cursor, 2);
        assert_eq!(state.simulated_date, Date::from_calendar_date(2024, Month::February, 29).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_until_shutdown() {
        let executor = Arc::new(Executor::open_in_memory().unwrap());
        let visit_table = Arc::new(Table::new(crate::cafe::visit_data_schema().unwrap(), executor));
        visit_table.create();
        let settings = GeneratorSettings::new(20, 11, Selection::RoundRobin).unwrap();
        let generator = VisitGenerator::with_rng(visit_table.clone(), cafes(5), settings, start(), StdRng::seed_from_u64(3)).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_generator(generator, Duration::from_millis(50), Duration::from_millis(10), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(95)).await;
        shutdown_tx.send(true).unwrap();
        let generator = handle.await.unwrap().unwrap();

        let ticks = generator.state().generation_counter;
        assert!(ticks >= 1);
        let rows = visit_table.select(&["ID"], &["ID"], &["ORDER BY ID"]);
        assert_eq!(rows.row_count() as u64, ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_stops_when_shutdown_was_flagged_before_it_started() {
        let executor = Arc::new(Executor::open_in_memory().unwrap());
        let visit_table = Arc::new(Table::new(crate::cafe::visit_data_schema().unwrap(), executor));
        visit_table.create();
        let settings = GeneratorSettings::new(20, 11, Selection::RoundRobin).unwrap();
        let generator = VisitGenerator::with_rng(visit_table, cafes(2), settings, start(), StdRng::seed_from_u64(3)).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        let generator = run_generator(generator, Duration::from_millis(50), Duration::from_millis(10), shutdown_rx).await.unwrap();
        assert_eq!(generator.state().generation_counter, 0);
    }
}
