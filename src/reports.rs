// KPI aggregation over a filtered view.
//
// Every function here is pure: it reads the view and returns plain rows.
// Cost, maintenance and safety figures use the whole view; consumption and
// utilization use only the operational subview (days with km driven).
use crate::filter::Filters;
use crate::types::{
    AccidentRateRow, AvailabilityRow, CostCategoryRow, CostReport, Dashboard, DailyCostRow,
    DailyOperationRow, FilteredView, HeadlineMetrics, MaintenanceReport, ModelAccidentsRow,
    ModelConsumptionRow, ModelFinesRow, ModelMaintenanceRow, OperationsReport, Record,
    SafetyReport, VehicleCostRow, VehicleDowntimeRow, VehicleKmRow,
};
use crate::util::{mean, ratio_or_zero, sort_asc_by, sort_desc_by, sum_by, OrderedGroups};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

/// Length of every "top"/"bottom" ranking.
pub const TOP_N: usize = 10;
pub const HOURS_PER_DAY: f64 = 24.0;
pub const KM_PER_MILLION: f64 = 1_000_000.0;

#[derive(Default)]
struct CostAcc {
    fuel: f64,
    maintenance: f64,
    fines: f64,
}

impl CostAcc {
    fn add(&mut self, r: &Record) {
        self.fuel += r.fuel_cost;
        self.maintenance += r.maintenance_cost;
        self.fines += r.fine_cost;
    }

    fn total(&self) -> f64 {
        self.fuel + self.maintenance + self.fines
    }
}

// ---------------------------------------------------------------------------
// Headline
// ---------------------------------------------------------------------------

pub fn headline_metrics(view: &FilteredView) -> HeadlineMetrics {
    let operational = view.operational();
    let total_km: f64 = operational.iter().map(|r| r.km_driven).sum();
    let avg_consumption = mean(operational.iter().map(|r| r.avg_consumption_km_per_l));
    let total_cost: f64 = view.iter().map(Record::total_cost).sum();
    HeadlineMetrics {
        total_km,
        avg_consumption,
        total_cost,
        cost_per_km: ratio_or_zero(total_cost, total_km),
        total_accidents: view.iter().map(|r| u64::from(r.accidents)).sum(),
    }
}

// ---------------------------------------------------------------------------
// Costs
// ---------------------------------------------------------------------------

pub fn cost_by_category(view: &FilteredView) -> Vec<CostCategoryRow> {
    let mut acc = CostAcc::default();
    for r in view.iter() {
        acc.add(r);
    }
    [
        ("Fuel", acc.fuel),
        ("Maintenance", acc.maintenance),
        ("Fines", acc.fines),
    ]
    .into_iter()
    .map(|(category, amount)| CostCategoryRow {
        category: category.to_string(),
        amount,
    })
    .collect()
}

/// One row per date present in the view, oldest first. Dates without
/// records are skipped rather than zero-filled.
pub fn cost_over_time(view: &FilteredView) -> Vec<DailyCostRow> {
    let mut by_date: BTreeMap<NaiveDate, CostAcc> = BTreeMap::new();
    for r in view.iter() {
        by_date.entry(r.date).or_default().add(r);
    }
    by_date
        .into_iter()
        .map(|(date, acc)| DailyCostRow {
            date,
            fuel_cost: acc.fuel,
            maintenance_cost: acc.maintenance,
            fine_cost: acc.fines,
        })
        .collect()
}

pub fn cost_ranking_by_vehicle(view: &FilteredView) -> Vec<VehicleCostRow> {
    let mut by_vehicle: BTreeMap<&str, CostAcc> = BTreeMap::new();
    for r in view.iter() {
        by_vehicle.entry(r.vehicle_id.as_str()).or_default().add(r);
    }
    let mut rows: Vec<VehicleCostRow> = by_vehicle
        .into_iter()
        .map(|(vehicle, acc)| VehicleCostRow {
            vehicle_id: vehicle.to_string(),
            fuel_cost: acc.fuel,
            maintenance_cost: acc.maintenance,
            fine_cost: acc.fines,
            total_cost: acc.total(),
        })
        .collect();
    sort_desc_by(&mut rows, |r| r.total_cost);
    rows.truncate(TOP_N);
    rows
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Mean of the per-record consumption figure for each model, best first.
pub fn consumption_by_model(view: &FilteredView) -> Vec<ModelConsumptionRow> {
    let mut by_model: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in view.operational().iter() {
        by_model
            .entry(r.model.as_str())
            .or_default()
            .push(r.avg_consumption_km_per_l);
    }
    let mut rows: Vec<ModelConsumptionRow> = by_model
        .into_iter()
        .filter_map(|(model, values)| {
            mean(values).map(|avg| ModelConsumptionRow {
                model: model.to_string(),
                avg_consumption_km_per_l: avg,
            })
        })
        .collect();
    sort_desc_by(&mut rows, |r| r.avg_consumption_km_per_l);
    rows
}

pub fn km_by_vehicle(view: &FilteredView) -> Vec<VehicleKmRow> {
    let mut rows: Vec<VehicleKmRow> = sum_by(
        view.operational().iter(),
        |r| r.vehicle_id.clone(),
        |r| r.km_driven,
    )
    .into_iter()
    .map(|(vehicle_id, km_driven)| VehicleKmRow {
        vehicle_id,
        km_driven,
    })
    .collect();
    sort_desc_by(&mut rows, |r| r.km_driven);
    rows.truncate(TOP_N);
    rows
}

pub fn daily_operations(view: &FilteredView) -> Vec<DailyOperationRow> {
    let mut by_date: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for r in view.operational().iter() {
        let e = by_date.entry(r.date).or_insert((0.0, 0.0));
        e.0 += r.km_driven;
        e.1 += r.liters_consumed;
    }
    by_date
        .into_iter()
        .map(|(date, (km, liters))| DailyOperationRow {
            date,
            km_driven: km,
            liters_consumed: liters,
            daily_consumption: (liters > 0.0).then(|| km / liters),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

pub fn maintenance_cost_by_model(view: &FilteredView) -> Vec<ModelMaintenanceRow> {
    let mut rows: Vec<ModelMaintenanceRow> =
        sum_by(view.iter(), |r| r.model.clone(), |r| r.maintenance_cost)
            .into_iter()
            .map(|(model, maintenance_cost)| ModelMaintenanceRow {
                model,
                maintenance_cost,
            })
            .collect();
    sort_desc_by(&mut rows, |r| r.maintenance_cost);
    rows
}

pub fn downtime_by_vehicle(view: &FilteredView) -> Vec<VehicleDowntimeRow> {
    let mut rows: Vec<VehicleDowntimeRow> = sum_by(
        view.iter(),
        |r| r.vehicle_id.clone(),
        |r| r.maintenance_downtime_hours,
    )
    .into_iter()
    .map(|(vehicle_id, downtime_hours)| VehicleDowntimeRow {
        vehicle_id,
        downtime_hours,
    })
    .collect();
    sort_desc_by(&mut rows, |r| r.downtime_hours);
    rows.truncate(TOP_N);
    rows
}

/// Share of the possible hours (24 per recorded day) each vehicle was not
/// down for maintenance; the ten worst vehicles. Not clamped, so a record
/// with more than 24 h of downtime can push a vehicle below zero.
pub fn availability_by_vehicle(view: &FilteredView) -> Vec<AvailabilityRow> {
    let mut groups: OrderedGroups<&str, (usize, f64)> = OrderedGroups::new();
    for r in view.iter() {
        let acc = groups.entry(r.vehicle_id.as_str());
        acc.0 += 1;
        acc.1 += r.maintenance_downtime_hours;
    }
    let mut rows: Vec<AvailabilityRow> = groups
        .into_vec()
        .into_iter()
        .map(|(vehicle, (days, downtime))| {
            // days >= 1 for every group, so the division is safe.
            let possible = days as f64 * HOURS_PER_DAY;
            AvailabilityRow {
                vehicle_id: vehicle.to_string(),
                days,
                total_possible_hours: possible,
                downtime_hours: downtime,
                availability_pct: (possible - downtime) / possible * 100.0,
            }
        })
        .collect();
    sort_asc_by(&mut rows, |r| r.availability_pct);
    rows.truncate(TOP_N);
    rows
}

// ---------------------------------------------------------------------------
// Safety
// ---------------------------------------------------------------------------

pub fn accidents_by_model(view: &FilteredView) -> Vec<ModelAccidentsRow> {
    let mut by_model: BTreeMap<&str, u64> = BTreeMap::new();
    for r in view.iter() {
        *by_model.entry(r.model.as_str()).or_insert(0) += u64::from(r.accidents);
    }
    let mut rows: Vec<ModelAccidentsRow> = by_model
        .into_iter()
        .map(|(model, accidents)| ModelAccidentsRow {
            model: model.to_string(),
            accidents,
        })
        .collect();
    sort_desc_by(&mut rows, |r| r.accidents as f64);
    rows
}

pub fn fines_by_model(view: &FilteredView) -> Vec<ModelFinesRow> {
    let mut rows: Vec<ModelFinesRow> = sum_by(view.iter(), |r| r.model.clone(), |r| r.fine_cost)
        .into_iter()
        .map(|(model, fine_cost)| ModelFinesRow { model, fine_cost })
        .collect();
    sort_desc_by(&mut rows, |r| r.fine_cost);
    rows
}

/// Accidents per million km for each model, worst first. Models that drove
/// nothing in the view get a rate of 0.
pub fn accident_rate_by_model(view: &FilteredView) -> Vec<AccidentRateRow> {
    let mut groups: OrderedGroups<&str, (u64, f64)> = OrderedGroups::new();
    for r in view.iter() {
        let acc = groups.entry(r.model.as_str());
        acc.0 += u64::from(r.accidents);
        acc.1 += r.km_driven;
    }
    let mut rows: Vec<AccidentRateRow> = groups
        .into_vec()
        .into_iter()
        .map(|(model, (accidents, km))| AccidentRateRow {
            model: model.to_string(),
            accidents,
            km_driven: km,
            rate_per_million_km: ratio_or_zero(accidents as f64, km) * KM_PER_MILLION,
        })
        .collect();
    sort_desc_by(&mut rows, |r| r.rate_per_million_km);
    rows
}

// ---------------------------------------------------------------------------
// Thematic views
// ---------------------------------------------------------------------------

pub fn cost_report(view: &FilteredView) -> CostReport {
    CostReport {
        by_category: cost_by_category(view),
        over_time: cost_over_time(view),
        top_vehicles: cost_ranking_by_vehicle(view),
    }
}

pub fn operations_report(view: &FilteredView) -> OperationsReport {
    OperationsReport {
        consumption_by_model: consumption_by_model(view),
        top_vehicles_by_km: km_by_vehicle(view),
        daily: daily_operations(view),
    }
}

pub fn maintenance_report(view: &FilteredView) -> MaintenanceReport {
    MaintenanceReport {
        cost_by_model: maintenance_cost_by_model(view),
        top_vehicles_by_downtime: downtime_by_vehicle(view),
        lowest_availability: availability_by_vehicle(view),
    }
}

pub fn safety_report(view: &FilteredView) -> SafetyReport {
    SafetyReport {
        accidents_by_model: accidents_by_model(view),
        fines_by_model: fines_by_model(view),
        accident_rate_by_model: accident_rate_by_model(view),
    }
}

/// Full recomputation for one filter state.
pub fn build_dashboard(view: &FilteredView, filters: &Filters) -> Dashboard {
    let operational_rows = view.operational().len();
    debug!(
        "building dashboard over {} rows ({} operational)",
        view.len(),
        operational_rows
    );
    Dashboard {
        filters: filters.summary(),
        rows_in_view: view.len(),
        operational_rows,
        headline: headline_metrics(view),
        costs: cost_report(view),
        operations: operations_report(view),
        maintenance: maintenance_report(view),
        safety: safety_report(view),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{apply_filters, DateRange, Selection};
    use crate::fixtures::{day, rec, SAMPLE_CSV};
    use crate::loader::load_from_reader;
    use crate::types::Dataset;

    fn sample() -> Dataset {
        load_from_reader(SAMPLE_CSV.as_bytes()).unwrap().0
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn filter_combinations() -> Vec<Filters> {
        let mut out = Vec::new();
        let ranges = [
            DateRange::default(),
            DateRange::between(day(1), day(2)),
            DateRange::between(day(3), day(3)),
            DateRange::between(day(5), day(9)),
        ];
        let models = ["", "Actros", "Axor", "Nope"];
        let vehicles = ["", "V1", "V3"];
        let pick = |s: &str| {
            if s.is_empty() {
                Selection::All
            } else {
                Selection::Only(s.to_string())
            }
        };
        for date_range in ranges {
            for m in models {
                for v in vehicles {
                    out.push(Filters {
                        date_range,
                        model: pick(m),
                        vehicle: pick(v),
                    });
                }
            }
        }
        out
    }

    #[test]
    fn headline_on_sample() {
        let ds = sample();
        let h = headline_metrics(&ds.view());
        assert_eq!(h.total_km, 650.0);
        assert_eq!(h.avg_consumption, Some(8.5));
        assert_eq!(h.total_cost, 795.0);
        assert!(close(h.cost_per_km, 795.0 / 650.0));
        assert_eq!(h.total_accidents, 1);
    }

    #[test]
    fn operational_subview_drops_idle_days() {
        let ds = sample();
        let v1 = apply_filters(
            &ds,
            &DateRange::default(),
            &Selection::All,
            &Selection::Only("V1".into()),
        );
        assert_eq!(v1.len(), 3);
        assert_eq!(v1.operational().len(), 2);
        let h = headline_metrics(&v1);
        assert_eq!(h.total_km, 150.0);
        assert_eq!(h.avg_consumption, Some(10.0));
    }

    #[test]
    fn total_cost_matches_column_sums_for_every_filter() {
        let ds = sample();
        for filters in filter_combinations() {
            let view = filters.apply(&ds);
            let h = headline_metrics(&view);
            let fuel: f64 = view.iter().map(|r| r.fuel_cost).sum();
            let maint: f64 = view.iter().map(|r| r.maintenance_cost).sum();
            let fines: f64 = view.iter().map(|r| r.fine_cost).sum();
            assert!(close(h.total_cost, fuel + maint + fines), "{filters:?}");
            if h.total_km > 0.0 {
                assert!(close(h.cost_per_km * h.total_km, h.total_cost), "{filters:?}");
            } else {
                assert_eq!(h.cost_per_km, 0.0);
            }
        }
    }

    #[test]
    fn empty_view_degrades_gracefully() {
        let ds = sample();
        let view = apply_filters(
            &ds,
            &DateRange::between(day(20), day(21)),
            &Selection::All,
            &Selection::All,
        );
        let h = headline_metrics(&view);
        assert_eq!(h.total_km, 0.0);
        assert_eq!(h.avg_consumption, None);
        assert_eq!(h.total_cost, 0.0);
        assert_eq!(h.cost_per_km, 0.0);
        assert_eq!(h.total_accidents, 0);

        let cats = cost_by_category(&view);
        assert!(cats.iter().all(|c| c.amount == 0.0));
        assert!(cost_over_time(&view).is_empty());
        assert!(cost_ranking_by_vehicle(&view).is_empty());
        assert!(availability_by_vehicle(&view).is_empty());
        assert!(accident_rate_by_model(&view).is_empty());

        let json = serde_json::to_value(build_dashboard(&view, &Filters::default())).unwrap();
        assert!(json["headline"]["avg_consumption"].is_null());
    }

    #[test]
    fn zero_costs_give_zero_cost_per_km() {
        let ds = Dataset::new(vec![rec(1, "V1", "Actros", 100.0), rec(2, "V2", "Axor", 40.0)]);
        let view = ds.view();
        let h = headline_metrics(&view);
        assert_eq!(h.total_cost, 0.0);
        assert_eq!(h.cost_per_km, 0.0);
        assert!(accident_rate_by_model(&view)
            .iter()
            .all(|r| r.rate_per_million_km == 0.0));
    }

    #[test]
    fn cost_breakdowns() {
        let ds = sample();
        let view = ds.view();
        let cats: Vec<(String, f64)> = cost_by_category(&view)
            .into_iter()
            .map(|c| (c.category, c.amount))
            .collect();
        assert_eq!(
            cats,
            vec![
                ("Fuel".to_string(), 445.0),
                ("Maintenance".to_string(), 250.0),
                ("Fines".to_string(), 100.0)
            ]
        );

        let series = cost_over_time(&view);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, day(1));
        assert_eq!(series[0].fuel_cost, 170.0);
        assert_eq!(series[1].maintenance_cost, 250.0);
        assert_eq!(series[2].fine_cost, 100.0);

        let ranking: Vec<(String, f64)> = cost_ranking_by_vehicle(&view)
            .into_iter()
            .map(|r| (r.vehicle_id, r.total_cost))
            .collect();
        assert_eq!(
            ranking,
            vec![
                ("V1".to_string(), 375.0),
                ("V3".to_string(), 300.0),
                ("V2".to_string(), 120.0)
            ]
        );
    }

    #[test]
    fn cost_series_skips_missing_dates() {
        let mut a = rec(1, "V1", "Actros", 10.0);
        a.fuel_cost = 5.0;
        let mut b = rec(5, "V1", "Actros", 10.0);
        b.fuel_cost = 7.0;
        let ds = Dataset::new(vec![b, a]);
        let dates: Vec<NaiveDate> = cost_over_time(&ds.view()).into_iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(1), day(5)]);
    }

    #[test]
    fn operations_breakdowns() {
        let ds = sample();
        let view = ds.view();

        let consumption = consumption_by_model(&view);
        assert_eq!(consumption[0].model, "Actros");
        assert!(close(consumption[0].avg_consumption_km_per_l, 28.0 / 3.0));
        assert_eq!(consumption[1].model, "Axor");
        assert_eq!(consumption[1].avg_consumption_km_per_l, 6.0);

        let km: Vec<String> = km_by_vehicle(&view).into_iter().map(|r| r.vehicle_id).collect();
        assert_eq!(km, vec!["V3", "V2", "V1"]);

        let daily = daily_operations(&view);
        assert_eq!(daily.len(), 3);
        assert_eq!(daily[1].km_driven, 300.0);
        assert_eq!(daily[1].daily_consumption, Some(6.0));
        assert_eq!(daily[2].daily_consumption, Some(10.0));
    }

    #[test]
    fn daily_consumption_is_undefined_without_fuel() {
        let ds = Dataset::new(vec![rec(1, "V1", "Actros", 100.0)]);
        let daily = daily_operations(&ds.view());
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].daily_consumption, None);
    }

    #[test]
    fn maintenance_breakdowns() {
        let ds = sample();
        let view = ds.view();

        let by_model = maintenance_cost_by_model(&view);
        assert_eq!(by_model[0].model, "Actros");
        assert_eq!(by_model[0].maintenance_cost, 200.0);

        let downtime: Vec<(String, f64)> = downtime_by_vehicle(&view)
            .into_iter()
            .map(|r| (r.vehicle_id, r.downtime_hours))
            .collect();
        assert_eq!(
            downtime,
            vec![
                ("V3".to_string(), 26.0),
                ("V1".to_string(), 8.0),
                ("V2".to_string(), 0.0)
            ]
        );

        let availability = availability_by_vehicle(&view);
        let order: Vec<&str> = availability.iter().map(|r| r.vehicle_id.as_str()).collect();
        assert_eq!(order, vec!["V3", "V1", "V2"]);
        assert!(close(availability[0].availability_pct, 22.0 / 48.0 * 100.0));
        assert_eq!(availability[0].days, 2);
        assert!(close(availability[1].availability_pct, 64.0 / 72.0 * 100.0));
        assert_eq!(availability[2].availability_pct, 100.0);
    }

    #[test]
    fn availability_goes_negative_past_24h_downtime() {
        let mut r = rec(1, "V1", "Actros", 0.0);
        r.maintenance_downtime_hours = 30.0;
        let ds = Dataset::new(vec![r]);
        let availability = availability_by_vehicle(&ds.view());
        assert!(close(availability[0].availability_pct, -25.0));
    }

    #[test]
    fn safety_breakdowns() {
        let ds = sample();
        let view = ds.view();

        let accidents = accidents_by_model(&view);
        assert_eq!(accidents[0].model, "Actros");
        assert_eq!(accidents[0].accidents, 1);

        let fines = fines_by_model(&view);
        assert_eq!(fines[0].fine_cost, 100.0);
        assert_eq!(fines[1].fine_cost, 0.0);

        let rates = accident_rate_by_model(&view);
        assert_eq!(rates[0].model, "Actros");
        assert!(close(rates[0].rate_per_million_km, 1.0 / 350.0 * KM_PER_MILLION));
        assert_eq!(rates[1].rate_per_million_km, 0.0);
    }

    #[test]
    fn idle_model_has_zero_accident_rate() {
        let mut r = rec(1, "V1", "Actros", 0.0);
        r.accidents = 2;
        let ds = Dataset::new(vec![r]);
        let rates = accident_rate_by_model(&ds.view());
        assert_eq!(rates[0].accidents, 2);
        assert_eq!(rates[0].rate_per_million_km, 0.0);
    }

    fn large_fleet() -> Dataset {
        let mut records = Vec::new();
        for i in 0..12u32 {
            let vehicle = format!("V{:02}", i);
            for d in 1..=2 {
                let mut r = rec(d, &vehicle, "Actros", 10.0 * (i + 1) as f64);
                r.fuel_cost = (i % 4) as f64 * 10.0;
                r.maintenance_downtime_hours = (i % 5) as f64;
                r.avg_consumption_km_per_l = 5.0;
                r.liters_consumed = 2.0;
                records.push(r);
            }
        }
        Dataset::new(records)
    }

    #[test]
    fn rankings_are_capped_and_ordered() {
        let ds = large_fleet();
        let view = ds.view();

        let costs = cost_ranking_by_vehicle(&view);
        assert_eq!(costs.len(), TOP_N);
        assert!(costs.windows(2).all(|w| w[0].total_cost >= w[1].total_cost));

        let km = km_by_vehicle(&view);
        assert_eq!(km.len(), TOP_N);
        assert!(km.windows(2).all(|w| w[0].km_driven >= w[1].km_driven));

        let downtime = downtime_by_vehicle(&view);
        assert_eq!(downtime.len(), TOP_N);
        assert!(downtime
            .windows(2)
            .all(|w| w[0].downtime_hours >= w[1].downtime_hours));

        let availability = availability_by_vehicle(&view);
        assert_eq!(availability.len(), TOP_N);
        assert!(availability
            .windows(2)
            .all(|w| w[0].availability_pct <= w[1].availability_pct));
        assert!(availability
            .iter()
            .all(|r| (0.0..=100.0).contains(&r.availability_pct)));
    }

    #[test]
    fn ties_keep_group_order() {
        let ds = large_fleet();
        let costs = cost_ranking_by_vehicle(&ds.view());
        // fuel 30 per day for V03, V07, V11: sorted key order survives the sort.
        let top: Vec<&str> = costs.iter().take(3).map(|r| r.vehicle_id.as_str()).collect();
        assert_eq!(top, vec!["V03", "V07", "V11"]);

        let availability = availability_by_vehicle(&ds.view());
        // downtime 4h per day for V04 and V09, first seen in that order.
        assert_eq!(availability[0].vehicle_id, "V04");
        assert_eq!(availability[1].vehicle_id, "V09");
    }

    #[test]
    fn dashboard_bundles_all_views() {
        let ds = sample();
        let filters = Filters::for_dataset(&ds);
        let view = filters.apply(&ds);
        let dash = build_dashboard(&view, &filters);
        assert_eq!(dash.rows_in_view, 6);
        assert_eq!(dash.operational_rows, 4);
        assert_eq!(dash.filters.start_date, Some(day(1)));
        assert_eq!(dash.costs.top_vehicles.len(), 3);
        assert_eq!(dash.operations.daily.len(), 3);
        assert_eq!(dash.maintenance.lowest_availability.len(), 3);
        assert_eq!(dash.safety.accident_rate_by_model.len(), 2);
    }
}
