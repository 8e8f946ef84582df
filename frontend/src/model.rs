//! Wire types for the budget report endpoints.
//!
//! The backend serialises decimals as strings and is loose about indices and
//! codes, so decoding here accepts numbers, numeric strings and nulls.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Subrubro {
    #[serde(default, deserialize_with = "lenient_text")]
    pub codigo: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub nombre: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Rubro {
    #[serde(default, deserialize_with = "lenient_text")]
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub subrubros: Vec<Option<Subrubro>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Cuenta {
    #[serde(default, deserialize_with = "lenient_text")]
    pub codigo: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub regional: Option<String>,
}

/// One budget line as returned by `InformeDetalladoPresupuesto`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Presupuesto {
    #[serde(default, deserialize_with = "lenient_string")]
    pub fecha: String,
    #[serde(default, deserialize_with = "lenient_index")]
    pub rubro: Option<i64>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub subrubro: Option<i64>,
    #[serde(default)]
    pub presupuestomes: Value,
    /// Catalog entries that fail to decode (e.g. `null`) stay in place as
    /// `None` so the indices of the others are preserved.
    #[serde(default, rename = "updatedRubros", deserialize_with = "lenient_items")]
    pub updated_rubros: Vec<Option<Rubro>>,
    #[serde(default, deserialize_with = "lenient_item")]
    pub cuenta: Option<Cuenta>,
}

impl Presupuesto {
    /// Calendar year of `fecha`, as written (no timezone shifting).
    pub fn year(&self) -> Option<i32> {
        parse_year(&self.fecha)
    }

    /// Monthly budget amount. Anything that is not a number reads as zero.
    pub fn amount(&self) -> Decimal {
        decimal_from_value(&self.presupuestomes)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TotalKind {
    Rubro,
    Subrubro,
    Cuenta,
}

impl TotalKind {
    pub fn label(self) -> &'static str {
        match self {
            TotalKind::Rubro => "rubros",
            TotalKind::Subrubro => "subrubros",
            TotalKind::Cuenta => "cuentas",
        }
    }
}

/// Body of `POST save-presupuesto-total/`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TotalPayload {
    #[serde(skip)]
    pub kind: TotalKind,
    pub nombre: String,
    #[serde(rename = "totalpresupuestoProyectado", with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub fecha: String,
}

fn parse_year(raw: &str) -> Option<i32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().year());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.year());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.year());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .map(|d| d.year())
        .ok()
}

pub(crate) fn decimal_from_value(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.trim().parse().unwrap_or(Decimal::ZERO),
        Value::Number(n) => n
            .to_string()
            .parse()
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain))
            .unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

fn lenient_index<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn lenient_item<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn decodes_backend_record() {
        let record: Presupuesto = serde_json::from_value(json!({
            "fecha": "2024-03-15",
            "rubro": 1,
            "subrubro": "0",
            "presupuestomes": "1500.25",
            "updatedRubros": [
                { "nombre": "Personal", "subrubros": [] },
                { "nombre": "Operación", "subrubros": [{ "codigo": 5101, "nombre": "Arriendos" }] }
            ],
            "cuenta": { "codigo": "110505", "nombre": "Caja", "regional": "Bogotá" }
        }))
        .unwrap();

        assert_eq!(record.year(), Some(2024));
        assert_eq!(record.rubro, Some(1));
        assert_eq!(record.subrubro, Some(0));
        assert_eq!(record.amount(), Decimal::from_str("1500.25").unwrap());
        let operacion = record.updated_rubros[1].as_ref().unwrap();
        assert_eq!(operacion.subrubros[0].as_ref().unwrap().codigo.as_deref(), Some("5101"));
        assert_eq!(record.cuenta.unwrap().regional.as_deref(), Some("Bogotá"));
    }

    #[test]
    fn tolerates_nulls_and_missing_fields() {
        let record: Presupuesto = serde_json::from_value(json!({
            "fecha": "2023-12-31T23:00:00-05:00",
            "rubro": null,
            "updatedRubros": null,
            "presupuestomes": "n/a"
        }))
        .unwrap();

        assert_eq!(record.year(), Some(2023));
        assert_eq!(record.rubro, None);
        assert_eq!(record.subrubro, None);
        assert!(record.updated_rubros.is_empty());
        assert!(record.cuenta.is_none());
        assert_eq!(record.amount(), Decimal::ZERO);
    }

    #[test]
    fn null_entries_keep_their_slot() {
        let record: Presupuesto = serde_json::from_value(json!({
            "fecha": null,
            "updatedRubros": [null, { "nombre": "Operación", "subrubros": [null, "x", { "codigo": "5120" }] }],
            "cuenta": "1105"
        }))
        .unwrap();

        assert_eq!(record.fecha, "");
        assert_eq!(record.year(), None);
        assert_eq!(record.updated_rubros.len(), 2);
        assert!(record.updated_rubros[0].is_none());
        let subrubros = &record.updated_rubros[1].as_ref().unwrap().subrubros;
        assert_eq!(subrubros.len(), 3);
        assert!(subrubros[0].is_none());
        assert!(subrubros[1].is_none());
        assert_eq!(subrubros[2].as_ref().unwrap().codigo.as_deref(), Some("5120"));
        assert!(record.cuenta.is_none());
    }

    #[test]
    fn numeric_amounts_stay_exact() {
        assert_eq!(decimal_from_value(&json!(0.1)), Decimal::from_str("0.1").unwrap());
        assert_eq!(decimal_from_value(&json!(250)), Decimal::from(250));
        assert_eq!(decimal_from_value(&json!(null)), Decimal::ZERO);
    }

    #[test]
    fn year_formats() {
        assert_eq!(parse_year("2022/07/01"), Some(2022));
        assert_eq!(parse_year("2021-01-01T00:00:00"), Some(2021));
        assert_eq!(parse_year("2021-01-01T00:00:00.250"), Some(2021));
        assert_eq!(parse_year("2024-01-01 00:00:00"), Some(2024));
        assert_eq!(parse_year("2019-12-31 08:30:00.5"), Some(2019));
        assert_eq!(parse_year("2020-01-01T00:00:00Z"), Some(2020));
        assert_eq!(parse_year("enero"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn payload_uses_backend_field_names() {
        let payload = TotalPayload {
            kind: TotalKind::Rubro,
            nombre: "Rubro: Personal".to_string(),
            total: Decimal::from_str("1200.5").unwrap(),
            fecha: "2025-01-01".to_string(),
        };
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            body,
            json!({
                "nombre": "Rubro: Personal",
                "totalpresupuestoProyectado": 1200.5,
                "fecha": "2025-01-01"
            })
        );
    }
}
