use crate::types::{Dataset, FilterSummary, FilteredView, Record};
use chrono::NaiveDate;
use log::debug;

/// Select-box value meaning "no constraint on this column".
pub const ALL_SENTINEL: &str = "All";

/// Equality filter on a categorical column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Selection::All => ALL_SENTINEL,
            Selection::Only(v) => v,
        }
    }
}

/// Inclusive date range. Only constrains when both ends are set; a lone
/// endpoint lets every date through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match self.bounds() {
            Some((s, e)) => s <= date && date <= e,
            None => true,
        }
    }
}

/// Active filter state as driven by the console controls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub date_range: DateRange,
    pub model: Selection,
    pub vehicle: Selection,
}

impl Filters {
    /// Fresh state for a dataset: full date span, everything selected.
    pub fn for_dataset(dataset: &Dataset) -> Self {
        let date_range = dataset
            .date_bounds()
            .map(|(min, max)| DateRange::between(min, max))
            .unwrap_or_default();
        Self {
            date_range,
            ..Self::default()
        }
    }

    pub fn apply<'a>(&self, dataset: &'a Dataset) -> FilteredView<'a> {
        apply_filters(dataset, &self.date_range, &self.model, &self.vehicle)
    }

    pub fn summary(&self) -> FilterSummary {
        FilterSummary {
            start_date: self.date_range.start,
            end_date: self.date_range.end,
            model: self.model.label().to_string(),
            vehicle: self.vehicle.label().to_string(),
        }
    }
}

fn keep(record: &Record, date_range: &DateRange, model: &Selection, vehicle: &Selection) -> bool {
    date_range.contains(record.date)
        && model.matches(&record.model)
        && vehicle.matches(&record.vehicle_id)
}

/// Logical AND of the date range and both categorical filters. The source
/// dataset is only borrowed.
pub fn apply_filters<'a>(
    dataset: &'a Dataset,
    date_range: &DateRange,
    model: &Selection,
    vehicle: &Selection,
) -> FilteredView<'a> {
    let view = FilteredView::new(
        dataset
            .records()
            .iter()
            .filter(|r| keep(r, date_range, model, vehicle))
            .collect(),
    );
    debug!(
        "filters kept {} of {} rows (model={}, vehicle={})",
        view.len(),
        dataset.len(),
        model.label(),
        vehicle.label()
    );
    view
}

/// Choices offered by the model/vehicle controls plus the selectable date
/// bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    pub models: Vec<String>,
    pub vehicles: Vec<String>,
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let with_sentinel = |values: Vec<String>| {
            std::iter::once(ALL_SENTINEL.to_string())
                .chain(values)
                .collect::<Vec<_>>()
        };
        Self {
            models: with_sentinel(dataset.models()),
            vehicles: with_sentinel(dataset.vehicle_ids()),
            date_bounds: dataset.date_bounds(),
        }
    }

    /// Map console input onto one of `choices`, either by its 1-based
    /// position or by exact value. Blank input and the first entry (the
    /// sentinel) mean all; every other entry is taken literally, so a model
    /// named `ALL` stays selectable.
    pub fn resolve(input: &str, choices: &[String]) -> Option<Selection> {
        let s = input.trim();
        if s.is_empty() {
            return Some(Selection::All);
        }
        let idx = match s.parse::<usize>() {
            Ok(n) if n >= 1 && n <= choices.len() => n - 1,
            _ => choices.iter().position(|c| c.as_str() == s)?,
        };
        if idx == 0 {
            Some(Selection::All)
        } else {
            Some(Selection::Only(choices[idx].clone()))
        }
    }
}
