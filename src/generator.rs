//! Mock report data synthesis.
//!
//! Rows are built by threading an accumulating [`Row`] through one step per
//! requested metric, in request order. A step may read columns written by
//! earlier steps of the same row (`Completion Date` reads `Completion Status`,
//! `Last Login Date` reads `Login Status`); rows never share state.

use crate::models::{CellValue, Metric, Row};
use chrono::{Days, NaiveDate};
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::debug;

pub const MASTER_O_ID_BASE: usize = 100_000;
pub const MAX_SCORE: i64 = 100;
pub const MICROSKILLS: [&str; 5] = [
    "JavaScript",
    "Python",
    "Machine Learning",
    "Data Visualization",
    "API Integration",
];

const COMPLETED: &str = "Completed";
const IN_PROGRESS: &str = "In Progress";
const INCOMPLETE: &str = "Incomplete";
const ACTIVE: &str = "Active";
const INACTIVE: &str = "Inactive";

/// Generates `row_count` rows for `metrics` as of `today`.
///
/// Unrecognized metric names contribute no column.
pub fn generate_rows<S, R>(metrics: &[S], row_count: usize, today: NaiveDate, rng: &mut R) -> Vec<Row>
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    let plan = resolve_metrics(metrics);
    (0..row_count)
        .map(|index| {
            plan.iter()
                .fold(RowBuilder::new(index, today), |builder, metric| builder.apply(*metric, rng))
                .finish()
        })
        .collect()
}

fn resolve_metrics<S: AsRef<str>>(metrics: &[S]) -> Vec<Metric> {
    metrics
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let metric = Metric::from_name(name);
            if metric.is_none() {
                debug!(metric = name, "ignoring unrecognized metric");
            }
            metric
        })
        .collect()
}

struct RowBuilder {
    index: usize,
    today: NaiveDate,
    row: Row,
}

impl RowBuilder {
    fn new(index: usize, today: NaiveDate) -> Self {
        Self {
            index,
            today,
            row: Row::new(),
        }
    }

    fn apply<R: Rng + ?Sized>(mut self, metric: Metric, rng: &mut R) -> Self {
        let value = self.field_value(metric, rng);
        self.row.set(metric, value);
        self
    }

    fn finish(self) -> Row {
        self.row
    }

    fn field_value<R: Rng + ?Sized>(&self, metric: Metric, rng: &mut R) -> CellValue {
        match metric {
            Metric::MasterOId => CellValue::Text(format!("MO-{}", MASTER_O_ID_BASE + self.index)),
            Metric::ContentLaunchDate => self.date_days_ago(rng.random_range(0..365)),
            Metric::Challenges => CellValue::text(if rng.random_bool(0.5) { COMPLETED } else { IN_PROGRESS }),
            Metric::CompletionStatus => CellValue::text(if rng.random_bool(0.7) { COMPLETED } else { INCOMPLETE }),
            Metric::CompletionDate => {
                if self.is_completed() {
                    self.date_days_ago(rng.random_range(0..30))
                } else {
                    CellValue::Empty
                }
            }
            Metric::CompletedInDays => {
                if self.is_completed() {
                    CellValue::Integer(rng.random_range(1..=30))
                } else {
                    CellValue::Empty
                }
            }
            Metric::Attempts => CellValue::Integer(rng.random_range(1..=5)),
            Metric::Score => CellValue::Integer(rng.random_range(0..100)),
            Metric::MaxScore => CellValue::Integer(MAX_SCORE),
            Metric::TimeSpent => CellValue::Text(format!("{} minutes", rng.random_range(10..130u32))),
            Metric::MicroskillName => {
                let skill = MICROSKILLS.choose(rng).copied().unwrap_or(MICROSKILLS[0]);
                CellValue::text(skill)
            }
            Metric::LoginStatus => CellValue::text(if rng.random_bool(0.8) { ACTIVE } else { INACTIVE }),
            Metric::LastLoginDate => {
                if self.is_active() {
                    self.date_days_ago(rng.random_range(0..7))
                } else {
                    self.date_days_ago(rng.random_range(10..40))
                }
            }
        }
    }

    // An absent dependency reads as "not completed" / "not active".
    fn is_completed(&self) -> bool {
        self.text_equals(Metric::CompletionStatus, COMPLETED)
    }

    fn is_active(&self) -> bool {
        self.text_equals(Metric::LoginStatus, ACTIVE)
    }

    fn text_equals(&self, metric: Metric, expected: &str) -> bool {
        self.row
            .get(metric)
            .and_then(CellValue::as_text)
            .map(|value| value == expected)
            .unwrap_or(false)
    }

    fn date_days_ago(&self, days: u64) -> CellValue {
        let date = self.today.checked_sub_days(Days::new(days)).unwrap_or(self.today);
        CellValue::Text(date.format("%Y-%m-%d").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{generate_rows, MAX_SCORE, MICROSKILLS};
    use crate::models::{CellValue, Metric, Row};
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn days_before_today(cell: &CellValue) -> i64 {
        let raw = cell.as_text().expect("date cell is text");
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("iso date");
        (today() - date).num_days()
    }

    fn keys(row: &Row) -> Vec<&'static str> {
        row.metrics().map(Metric::as_str).collect()
    }

    #[test]
    fn returns_requested_number_of_rows() {
        let mut rng = rng();
        for count in [0usize, 1, 17, 100] {
            let rows = generate_rows(&["Score"], count, today(), &mut rng);
            assert_eq!(rows.len(), count);
        }
    }

    #[test]
    fn keys_follow_input_order_and_skip_unknown_names() {
        let metrics = ["Score", "Nope", "Master-O ID", "Login Status", "score"];
        let rows = generate_rows(&metrics, 4, today(), &mut rng());
        for row in &rows {
            assert_eq!(keys(row), vec!["Score", "Master-O ID", "Login Status"]);
        }
    }

    #[test]
    fn master_o_id_is_deterministic_by_row_index() {
        let rows = generate_rows(&["Master-O ID"], 3, today(), &mut rng());
        let ids: Vec<_> = rows
            .iter()
            .map(|row| row.get(Metric::MasterOId).and_then(CellValue::as_text).expect("id"))
            .collect();
        assert_eq!(ids, vec!["MO-100000", "MO-100001", "MO-100002"]);
    }

    #[test]
    fn completion_fields_follow_completion_status() {
        let metrics = ["Master-O ID", "Completion Status", "Completion Date", "Completed In Days"];
        let rows = generate_rows(&metrics, 200, today(), &mut rng());
        let mut saw_completed = false;
        let mut saw_incomplete = false;

        for row in &rows {
            let status = row.get(Metric::CompletionStatus).and_then(CellValue::as_text).expect("status");
            let date = row.get(Metric::CompletionDate).expect("date cell");
            let days = row.get(Metric::CompletedInDays).expect("days cell");
            match status {
                "Completed" => {
                    saw_completed = true;
                    let ago = days_before_today(date);
                    assert!((0..30).contains(&ago), "completion {ago} days ago");
                    let value = days.as_integer().expect("integer days");
                    assert!((1..=30).contains(&value));
                }
                "Incomplete" => {
                    saw_incomplete = true;
                    assert!(date.is_empty());
                    assert!(days.is_empty());
                }
                other => panic!("unexpected status {other}"),
            }
        }
        assert!(saw_completed && saw_incomplete);
    }

    #[test]
    fn completion_date_is_empty_without_completion_status() {
        let rows = generate_rows(&["Completion Date", "Completed In Days"], 25, today(), &mut rng());
        for row in &rows {
            assert!(row.get(Metric::CompletionDate).expect("date").is_empty());
            assert!(row.get(Metric::CompletedInDays).expect("days").is_empty());
        }
    }

    #[test]
    fn completion_status_listed_after_its_dependent_is_not_seen() {
        let rows = generate_rows(&["Completion Date", "Completion Status"], 25, today(), &mut rng());
        for row in &rows {
            assert!(row.get(Metric::CompletionDate).expect("date").is_empty());
            assert_eq!(keys(row), vec!["Completion Date", "Completion Status"]);
        }
    }

    #[test]
    fn last_login_date_window_depends_on_login_status() {
        let rows = generate_rows(&["Login Status", "Last Login Date"], 300, today(), &mut rng());
        for row in &rows {
            let status = row.get(Metric::LoginStatus).and_then(CellValue::as_text).expect("status");
            let ago = days_before_today(row.get(Metric::LastLoginDate).expect("login date"));
            match status {
                "Active" => assert!((0..7).contains(&ago), "active login {ago} days ago"),
                "Inactive" => assert!((10..40).contains(&ago), "inactive login {ago} days ago"),
                other => panic!("unexpected login status {other}"),
            }
        }
    }

    #[test]
    fn last_login_date_without_login_status_uses_inactive_window() {
        let rows = generate_rows(&["Last Login Date"], 50, today(), &mut rng());
        for row in &rows {
            let ago = days_before_today(row.get(Metric::LastLoginDate).expect("login date"));
            assert!((10..40).contains(&ago));
        }
    }

    #[test]
    fn scalar_metrics_stay_in_range() {
        let metrics = [
            "Content launch date",
            "Challenges",
            "Attempts",
            "Score",
            "Max Score",
            "Time Spent",
            "Microskill Name",
        ];
        let rows = generate_rows(&metrics, 300, today(), &mut rng());
        for row in &rows {
            let launch = days_before_today(row.get(Metric::ContentLaunchDate).expect("launch"));
            assert!((0..365).contains(&launch));

            let challenge = row.get(Metric::Challenges).and_then(CellValue::as_text).expect("challenges");
            assert!(challenge == "Completed" || challenge == "In Progress");

            let attempts = row.get(Metric::Attempts).and_then(CellValue::as_integer).expect("attempts");
            assert!((1..=5).contains(&attempts));

            let score = row.get(Metric::Score).and_then(CellValue::as_integer).expect("score");
            assert!((0..100).contains(&score));

            assert_eq!(row.get(Metric::MaxScore), Some(&CellValue::Integer(MAX_SCORE)));

            let spent = row.get(Metric::TimeSpent).and_then(CellValue::as_text).expect("time spent");
            let minutes: i64 = spent
                .strip_suffix(" minutes")
                .expect("minutes suffix")
                .parse()
                .expect("numeric minutes");
            assert!((10..130).contains(&minutes));

            let skill = row.get(Metric::MicroskillName).and_then(CellValue::as_text).expect("skill");
            assert!(MICROSKILLS.contains(&skill));
        }
    }

    #[test]
    fn empty_and_unknown_metric_lists_yield_empty_rows() {
        let rows = generate_rows::<&str, _>(&[], 5, today(), &mut rng());
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(Row::is_empty));

        let rows = generate_rows(&["UnknownMetric"], 2, today(), &mut rng());
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(Row::is_empty));
    }

    #[test]
    fn repeated_calls_share_shape_and_seeded_calls_match_exactly() {
        let metrics = ["Master-O ID", "Score", "Login Status", "Last Login Date"];
        let first = generate_rows(&metrics, 10, today(), &mut rand::rng());
        let second = generate_rows(&metrics, 10, today(), &mut rand::rng());
        for (left, right) in first.iter().zip(&second) {
            assert_eq!(keys(left), keys(right));
        }

        let seeded_a = generate_rows(&metrics, 10, today(), &mut StdRng::seed_from_u64(99));
        let seeded_b = generate_rows(&metrics, 10, today(), &mut StdRng::seed_from_u64(99));
        assert_eq!(seeded_a, seeded_b);
    }

    #[test]
    fn duplicated_metric_keeps_single_column() {
        let rows = generate_rows(&["Score", "Attempts", "Score"], 3, today(), &mut rng());
        for row in &rows {
            assert_eq!(keys(row), vec!["Score", "Attempts"]);
        }
    }
}
