//! Reduction of budget lines into yearly totals per rubro, subrubro and cuenta.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::model::{Presupuesto, Rubro, TotalKind, TotalPayload};

pub const RUBRO_NO_ENCONTRADO: &str = "Rubro no encontrado";
pub const SUBRUBRO_NO_ENCONTRADO: &str = "Subrubro no encontrado";
pub const EMPTY_MESSAGE: &str = "No existe información.";

#[derive(Clone, Debug, PartialEq)]
pub struct SubrubroTotal {
    pub nombre: String,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CuentaTotal {
    pub nombre: String,
    pub regional: String,
    pub total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// Catalog snapshot carried by the first record.
    pub catalog: Vec<Option<Rubro>>,
    pub por_rubro: BTreeMap<i32, BTreeMap<String, Decimal>>,
    pub por_subrubro: BTreeMap<i32, BTreeMap<String, SubrubroTotal>>,
    pub por_cuenta: BTreeMap<i32, BTreeMap<String, CuentaTotal>>,
    /// Records dropped because their date had no readable year.
    pub skipped: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RubroRow {
    pub year: i32,
    pub nombre: String,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubrubroRow {
    pub year: i32,
    pub codigo: String,
    pub nombre: String,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CuentaRow {
    pub year: i32,
    pub codigo: String,
    pub nombre: String,
    pub regional: String,
    pub total: Decimal,
}

impl Report {
    /// Builds the report for a fetched payload; an empty payload yields the
    /// message shown instead of the tables.
    pub fn from_response(records: &[Presupuesto]) -> Result<Self, &'static str> {
        if records.is_empty() {
            return Err(EMPTY_MESSAGE);
        }
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: &[Presupuesto]) -> Self {
        let fallback: &[Option<Rubro>] = records
            .first()
            .map(|p| p.updated_rubros.as_slice())
            .unwrap_or(&[]);

        if !records.is_empty() && fallback.is_empty() {
            log::error!("updatedRubros is missing or empty in the first record");
        }

        let mut report = Report {
            catalog: fallback.to_vec(),
            ..Report::default()
        };

        for presupuesto in records {
            let Some(year) = presupuesto.year() else {
                log::warn!("skipping budget line with unreadable date {:?}", presupuesto.fecha);
                report.skipped += 1;
                continue;
            };
            let valor = presupuesto.amount();
            let catalog: &[Option<Rubro>] = if presupuesto.updated_rubros.is_empty() {
                fallback
            } else {
                &presupuesto.updated_rubros
            };

            match presupuesto.rubro.and_then(|i| lookup(catalog, i)) {
                Some(slot) => {
                    let rubro = slot.as_ref();
                    let nombre = non_empty(rubro.and_then(|r| r.nombre.as_deref()))
                        .unwrap_or(RUBRO_NO_ENCONTRADO);
                    accumulate(
                        report
                            .por_rubro
                            .entry(year)
                            .or_default()
                            .entry(nombre.to_string())
                            .or_insert(Decimal::ZERO),
                        valor,
                    );

                    let subrubros = rubro.map(|r| r.subrubros.as_slice()).unwrap_or(&[]);
                    if let Some(slot) = presupuesto.subrubro.and_then(|i| lookup(subrubros, i)) {
                        let sub = slot.as_ref();
                        let nombre = non_empty(sub.and_then(|s| s.nombre.as_deref()))
                            .unwrap_or(SUBRUBRO_NO_ENCONTRADO);
                        let entry = report
                            .por_subrubro
                            .entry(year)
                            .or_default()
                            .entry(sub.and_then(|s| s.codigo.clone()).unwrap_or_default())
                            .or_insert_with(|| SubrubroTotal {
                                nombre: nombre.to_string(),
                                total: Decimal::ZERO,
                            });
                        accumulate(&mut entry.total, valor);
                    }
                }
                None => log::debug!(
                    "rubro index {:?} not in catalog of {} entries",
                    presupuesto.rubro,
                    catalog.len()
                ),
            }

            if let Some(cuenta) = &presupuesto.cuenta {
                let entry = report
                    .por_cuenta
                    .entry(year)
                    .or_default()
                    .entry(cuenta.codigo.clone().unwrap_or_default())
                    .or_insert_with(|| CuentaTotal {
                        nombre: cuenta.nombre.clone().unwrap_or_default(),
                        regional: cuenta.regional.clone().unwrap_or_default(),
                        total: Decimal::ZERO,
                    });
                accumulate(&mut entry.total, valor);
            }
        }

        report
    }

    pub fn is_empty(&self) -> bool {
        self.por_rubro.is_empty() && self.por_subrubro.is_empty() && self.por_cuenta.is_empty()
    }

    pub fn rubro_rows(&self, query: &str) -> Vec<RubroRow> {
        let mut rows = Vec::new();
        for (year, rubros) in &self.por_rubro {
            for (nombre, total) in rubros {
                if matches_query(query, &[year.to_string().as_str(), nombre.as_str()]) {
                    rows.push(RubroRow {
                        year: *year,
                        nombre: nombre.clone(),
                        total: *total,
                    });
                }
            }
        }
        rows
    }

    pub fn subrubro_rows(&self, query: &str) -> Vec<SubrubroRow> {
        let mut rows = Vec::new();
        for (year, subrubros) in &self.por_subrubro {
            for (codigo, t) in subrubros {
                if matches_query(query, &[year.to_string().as_str(), codigo.as_str(), t.nombre.as_str()]) {
                    rows.push(SubrubroRow {
                        year: *year,
                        codigo: codigo.clone(),
                        nombre: t.nombre.clone(),
                        total: t.total,
                    });
                }
            }
        }
        rows
    }

    pub fn cuenta_rows(&self, query: &str) -> Vec<CuentaRow> {
        let mut rows = Vec::new();
        for (year, cuentas) in &self.por_cuenta {
            for (codigo, t) in cuentas {
                if matches_query(
                    query,
                    &[year.to_string().as_str(), codigo.as_str(), t.nombre.as_str(), t.regional.as_str()],
                ) {
                    rows.push(CuentaRow {
                        year: *year,
                        codigo: codigo.clone(),
                        nombre: t.nombre.clone(),
                        regional: t.regional.clone(),
                        total: t.total,
                    });
                }
            }
        }
        rows
    }

    /// Yearly budget across all accounts.
    pub fn totals_by_year(&self) -> BTreeMap<i32, Decimal> {
        self.por_cuenta
            .iter()
            .map(|(year, cuentas)| {
                let mut total = Decimal::ZERO;
                for c in cuentas.values() {
                    accumulate(&mut total, c.total);
                }
                (*year, total)
            })
            .collect()
    }

    /// Every aggregated total in submission order: rubros, subrubros, cuentas.
    pub fn payloads(&self) -> Vec<TotalPayload> {
        let mut out = Vec::new();
        for (year, rubros) in &self.por_rubro {
            for (nombre, total) in rubros {
                out.push(TotalPayload {
                    kind: TotalKind::Rubro,
                    nombre: format!("Rubro: {}", nombre),
                    total: *total,
                    fecha: closing_date(*year),
                });
            }
        }
        for (year, subrubros) in &self.por_subrubro {
            for (codigo, t) in subrubros {
                out.push(TotalPayload {
                    kind: TotalKind::Subrubro,
                    nombre: format!("SubRubro: {} {}", codigo, t.nombre),
                    total: t.total,
                    fecha: closing_date(*year),
                });
            }
        }
        for (year, cuentas) in &self.por_cuenta {
            for (codigo, t) in cuentas {
                out.push(TotalPayload {
                    kind: TotalKind::Cuenta,
                    nombre: format!("Cuenta: {} {} {}", codigo, t.nombre, t.regional),
                    total: t.total,
                    fecha: closing_date(*year),
                });
            }
        }
        out
    }
}

/// Totals for a budget year are filed on January 1st of the next one.
fn closing_date(year: i32) -> String {
    format!("{:04}-01-01", year + 1)
}

/// Adds `valor` to a running total, saturating instead of overflowing.
fn accumulate(total: &mut Decimal, valor: Decimal) {
    *total = match total.checked_add(valor) {
        Some(sum) => sum,
        None => {
            log::warn!("budget total overflowed adding {}; saturating", valor);
            if valor.is_sign_negative() {
                Decimal::MIN
            } else {
                Decimal::MAX
            }
        }
    };
}

fn lookup<T>(items: &[T], index: i64) -> Option<&T> {
    usize::try_from(index).ok().and_then(|i| items.get(i))
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn matches_query(query: &str, fields: &[&str]) -> bool {
    let needle = query.trim().to_lowercase();
    needle.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::str::FromStr;

    fn catalog() -> Value {
        json!([
            { "nombre": "Personal", "subrubros": [
                { "codigo": "5105", "nombre": "Salarios" },
                { "codigo": "5110", "nombre": "Honorarios" }
            ]},
            { "nombre": "Operación", "subrubros": [
                { "codigo": "5120", "nombre": "Arriendos" }
            ]},
            { "nombre": "", "subrubros": [ { "codigo": "5199" } ] }
        ])
    }

    fn record(fecha: &str, rubro: Value, subrubro: Value, monto: Value, cuenta: &str) -> Presupuesto {
        serde_json::from_value(json!({
            "fecha": fecha,
            "rubro": rubro,
            "subrubro": subrubro,
            "presupuestomes": monto,
            "updatedRubros": catalog(),
            "cuenta": { "codigo": cuenta, "nombre": format!("Cuenta {}", cuenta), "regional": "Centro" }
        }))
        .unwrap()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn sums_match_inputs_per_key() {
        let records = vec![
            record("2024-01-10", json!(0), json!(0), json!("100.10"), "1105"),
            record("2024-02-10", json!(0), json!(1), json!("50.20"), "1105"),
            record("2024-03-10", json!(1), json!(0), json!(30), "1110"),
            record("2025-01-10", json!(0), json!(0), json!("7"), "1105"),
        ];
        let report = Report::from_records(&records);

        assert_eq!(report.por_rubro[&2024]["Personal"], d("150.30"));
        assert_eq!(report.por_rubro[&2024]["Operación"], d("30"));
        assert_eq!(report.por_rubro[&2025]["Personal"], d("7"));

        assert_eq!(report.por_subrubro[&2024]["5105"].total, d("100.10"));
        assert_eq!(report.por_subrubro[&2024]["5105"].nombre, "Salarios");
        assert_eq!(report.por_subrubro[&2024]["5110"].total, d("50.20"));
        assert_eq!(report.por_subrubro[&2024]["5120"].total, d("30"));

        assert_eq!(report.por_cuenta[&2024]["1105"].total, d("150.30"));
        assert_eq!(report.por_cuenta[&2024]["1110"].total, d("30"));
        assert_eq!(report.por_cuenta[&2025]["1105"].regional, "Centro");

        assert_eq!(report.totals_by_year()[&2024], d("180.30"));
        assert_eq!(report.skipped, 0);
        assert_eq!(report.catalog.len(), 3);
    }

    #[test]
    fn empty_input_gives_empty_report() {
        assert_eq!(Report::from_response(&[]), Err(EMPTY_MESSAGE));

        let report = Report::from_records(&[]);
        assert!(report.is_empty());
        assert!(report.payloads().is_empty());
        assert!(report.catalog.is_empty());
    }

    #[test]
    fn bad_indices_do_not_panic() {
        let records = vec![
            record("2024-01-01", json!(9), json!(0), json!(10), "1105"),
            record("2024-01-01", json!(-1), json!(0), json!(10), "1105"),
            record("2024-01-01", json!(null), json!(null), json!(10), "1105"),
            record("2024-01-01", json!(0), json!(42), json!(10), "1105"),
            record("2024-01-01", json!(2), json!(0), json!(10), "1105"),
        ];
        let report = Report::from_records(&records);

        let rubros = &report.por_rubro[&2024];
        assert_eq!(rubros["Personal"], d("10"));
        assert_eq!(rubros[RUBRO_NO_ENCONTRADO], d("10"));
        assert_eq!(rubros.len(), 2);

        let subrubros = &report.por_subrubro[&2024];
        assert_eq!(subrubros["5199"].nombre, SUBRUBRO_NO_ENCONTRADO);
        assert_eq!(subrubros.len(), 1);

        // accounts are counted regardless of the catalog
        assert_eq!(report.por_cuenta[&2024]["1105"].total, d("50"));
    }

    #[test]
    fn null_catalog_entries_use_placeholders() {
        let records: Vec<Presupuesto> = serde_json::from_value(json!([
            {
                "fecha": "2024-02-01",
                "rubro": 0,
                "subrubro": 0,
                "presupuestomes": "40",
                "updatedRubros": [
                    { "nombre": "Personal", "subrubros": [null, { "codigo": "5110", "nombre": "Honorarios" }] },
                    null
                ],
                "cuenta": { "codigo": "1105", "nombre": "Caja", "regional": "Centro" }
            },
            {
                "fecha": "2024-02-01",
                "rubro": 1,
                "subrubro": 0,
                "presupuestomes": "15",
                "updatedRubros": [
                    { "nombre": "Personal", "subrubros": [] },
                    null
                ],
                "cuenta": { "codigo": "1105", "nombre": "Caja", "regional": "Centro" }
            }
        ]))
        .unwrap();

        let report = Report::from_records(&records);
        assert_eq!(report.por_rubro[&2024]["Personal"], d("40"));
        assert_eq!(report.por_rubro[&2024][RUBRO_NO_ENCONTRADO], d("15"));

        let subrubros = &report.por_subrubro[&2024];
        assert_eq!(subrubros.len(), 1);
        assert_eq!(subrubros[""].nombre, SUBRUBRO_NO_ENCONTRADO);
        assert_eq!(subrubros[""].total, d("40"));
        assert_eq!(report.por_cuenta[&2024]["1105"].total, d("55"));
    }

    #[test]
    fn null_date_skips_only_that_record() {
        let records: Vec<Presupuesto> = serde_json::from_value(json!([
            { "fecha": "2024-01-01", "rubro": 0, "presupuestomes": 10, "updatedRubros": catalog(),
              "cuenta": { "codigo": "1105" } },
            { "fecha": null, "rubro": 0, "presupuestomes": 99, "updatedRubros": catalog(),
              "cuenta": { "codigo": "1105" } }
        ]))
        .unwrap();

        let report = Report::from_response(&records).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.por_rubro[&2024]["Personal"], d("10"));
        assert_eq!(report.por_cuenta[&2024]["1105"].total, d("10"));
    }

    #[test]
    fn huge_amounts_saturate() {
        let max = Decimal::MAX.to_string();
        let records = vec![
            record("2024-01-01", json!(0), json!(0), json!(max.clone()), "1105"),
            record("2024-01-01", json!(0), json!(0), json!(max), "1105"),
        ];
        let report = Report::from_records(&records);
        assert_eq!(report.por_rubro[&2024]["Personal"], Decimal::MAX);
        assert_eq!(report.por_subrubro[&2024]["5105"].total, Decimal::MAX);
        assert_eq!(report.por_cuenta[&2024]["1105"].total, Decimal::MAX);
        assert_eq!(report.totals_by_year()[&2024], Decimal::MAX);
    }

    #[test]
    fn records_without_catalog_borrow_the_first_one() {
        let mut second = record("2024-05-01", json!(1), json!(0), json!(20), "1110");
        second.updated_rubros.clear();
        let records = vec![record("2024-01-01", json!(0), json!(0), json!(5), "1105"), second];

        let report = Report::from_records(&records);
        assert_eq!(report.por_rubro[&2024]["Operación"], d("20"));
        assert_eq!(report.por_subrubro[&2024]["5120"].total, d("20"));
    }

    #[test]
    fn unreadable_dates_are_skipped() {
        let records = vec![
            record("sin fecha", json!(0), json!(0), json!(10), "1105"),
            record("2024-01-01", json!(0), json!(0), json!(10), "1105"),
        ];
        let report = Report::from_records(&records);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.por_cuenta[&2024]["1105"].total, d("10"));
    }

    #[test]
    fn payload_names_and_dates() {
        let records = vec![record("2024-06-30", json!(0), json!(1), json!("12.5"), "1105")];
        let payloads = Report::from_records(&records).payloads();

        let summary: Vec<(TotalKind, &str, &str)> = payloads
            .iter()
            .map(|p| (p.kind, p.nombre.as_str(), p.fecha.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (TotalKind::Rubro, "Rubro: Personal", "2025-01-01"),
                (TotalKind::Subrubro, "SubRubro: 5110 Honorarios", "2025-01-01"),
                (TotalKind::Cuenta, "Cuenta: 1105 Cuenta 1105 Centro", "2025-01-01"),
            ]
        );
        assert!(payloads.iter().all(|p| p.total == d("12.5")));
    }

    #[test]
    fn rows_filter_by_query() {
        let records = vec![
            record("2024-01-01", json!(0), json!(0), json!(1), "1105"),
            record("2024-01-01", json!(1), json!(0), json!(2), "1110"),
            record("2025-01-01", json!(1), json!(0), json!(3), "1110"),
        ];
        let report = Report::from_records(&records);

        assert_eq!(report.rubro_rows("").len(), 3);
        let ops = report.rubro_rows("operación");
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].year, 2024);
        assert_eq!(ops[1].year, 2025);

        assert_eq!(report.subrubro_rows("arriendos").len(), 2);
        assert_eq!(report.cuenta_rows("2025").len(), 1);
        assert_eq!(report.cuenta_rows("centro").len(), 3);
        assert!(report.cuenta_rows("norte").is_empty());
    }
}
