// Shared test data.
use crate::types::Record;
use chrono::NaiveDate;
use std::path::PathBuf;

pub const SAMPLE_CSV: &str = "\
Data,ID_Veiculo,Modelo,KM_Rodado,Media_Consumo_KML,Custo_Combustivel,Custo_Manutencao,Custo_Multas,Tempo_Parada_Manutencao_Horas,Acidentes,Litros_Consumidos
2024-01-01,V1,Actros,100,10,50,0,0,0,0,10
2024-01-02,V1,Actros,0,0,0,200,0,8,0,0
2024-01-03,V1,Actros,50,10,25,0,100,0,1,5
2024-01-01,V2,Actros,200,8,120,0,0,0,0,25
2024-01-02,V3,Axor,300,6,250,50,0,2,0,50
2024-01-03,V3,Axor,0,0,0,0,0,24,0,0
";

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

/// A record with zeroed costs; tests override what they care about.
pub fn rec(d: u32, vehicle: &str, model: &str, km: f64) -> Record {
    Record {
        date: day(d),
        vehicle_id: vehicle.to_string(),
        model: model.to_string(),
        km_driven: km,
        avg_consumption_km_per_l: 0.0,
        fuel_cost: 0.0,
        maintenance_cost: 0.0,
        fine_cost: 0.0,
        maintenance_downtime_hours: 0.0,
        accidents: 0,
        liters_consumed: 0.0,
    }
}

/// Unique path under the system temp dir for this test process.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fleet_kpi_{}_{}.csv", std::process::id(), name))
}
