// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Derived-metrics rows.
//!
//! Column layout of the derived sheet:
//!
//! | column | content |
//! |---|---|
//! | A | timestamp (epoch ms) |
//! | B | local time |
//! | per power channel | power (W), accumulated energy (Wh) |
//! | then | total irradiance, theoretical power (W), theoretical energy (Wh) |
//!
//! Energy columns are spreadsheet formulas integrating power over time with
//! the trapezoidal rule, so the sheet stays correct when edited by hand.
//! Row 2 is the first data row of the day and starts every integral at zero.

use crate::reconciler::ReadyRow;
use crate::settings::{PanelGeometry, PowerChannel};
use crate::types::{CellValue, Row};

/// Spreadsheet row of the first data row (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

const MS_PER_HOUR: u32 = 3_600_000;

/// Spreadsheet column letter for a zero-based column index (`0` → `A`, `26` → `AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[derive(Debug, Clone)]
pub struct DerivedLayout {
    channels: Vec<PowerChannel>,
    panel: PanelGeometry,
}

impl DerivedLayout {
    pub fn new(channels: Vec<PowerChannel>, panel: PanelGeometry) -> Self {
        Self { channels, panel }
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["Timestamp".to_owned(), "Local Time".to_owned()];
        for channel in &self.channels {
            header.push(format!("{} Power (W)", channel.name));
            header.push(format!("{} Energy Accumulated (Wh)", channel.name));
        }
        header.push("Total Irradiance (W/m^2)".to_owned());
        header.push("Theoretical Power (W)".to_owned());
        header.push("Theoretical Energy Accumulated (Wh)".to_owned());
        header
    }

    fn irradiance_column(&self) -> usize {
        2 + 2 * self.channels.len()
    }

    /// Build derived rows for `ready`, the first of which lands on sheet row
    /// `first_row`.
    pub fn rows(&self, ready: &[ReadyRow], first_row: usize, total_irradiance: f64) -> Vec<Row> {
        ready
            .iter()
            .enumerate()
            .map(|(offset, row)| self.row(row, first_row + offset, total_irradiance))
            .collect()
    }

    fn row(&self, ready: &ReadyRow, sheet_row: usize, total_irradiance: f64) -> Row {
        let mut cells = Vec::with_capacity(self.irradiance_column() + 3);
        cells.push(CellValue::Number(ready.timestamp as f64));
        cells.push(CellValue::Text(ready.local_time.clone()));

        for (i, channel) in self.channels.iter().enumerate() {
            let power_col = 2 + 2 * i;
            let power = match (
                ready.values.get(channel.voltage_index),
                ready.values.get(channel.current_index),
            ) {
                (Some(voltage), Some(current)) => CellValue::Number(current * voltage),
                _ => CellValue::Empty,
            };
            cells.push(power);
            cells.push(energy_cell(power_col, power_col + 1, sheet_row));
        }

        let irr_col = self.irradiance_column();
        if total_irradiance.is_nan() {
            cells.push(CellValue::Number(0.0));
            cells.push(CellValue::Empty);
        } else {
            cells.push(CellValue::Number(total_irradiance));
            cells.push(CellValue::Number(total_irradiance * self.panel.area_m2));
        }
        cells.push(energy_cell(irr_col + 1, irr_col + 2, sheet_row));

        cells
    }
}

/// Accumulated energy at `sheet_row` for a power column.
fn energy_cell(power_col: usize, energy_col: usize, sheet_row: usize) -> CellValue {
    if sheet_row <= FIRST_DATA_ROW {
        return CellValue::Number(0.0);
    }
    let p = column_letter(power_col);
    let e = column_letter(energy_col);
    let (j, k) = (sheet_row - 1, sheet_row);
    CellValue::formula(format!(
        "={e}{j}+({p}{j}+{p}{k})/2*(A{k}-A{j})/{MS_PER_HOUR}"
    ))
}
