//! Medical report CSV rendering.
//!
//! UTF-8 with a byte order mark and `;` as delimiter, which spreadsheet
//! tools on the site machines open without an import dialog.

use chrono::FixedOffset;
use minectl_core::types::MedicalCheckView;

pub const REPORT_FILENAME: &str = "medical_report.csv";

const HEADER: [&str; 15] = [
    "Date",
    "Shift",
    "Direction",
    "Result",
    "Full name",
    "Code",
    "Department",
    "Organization",
    "Blood pressure",
    "Pulse",
    "Alcohol",
    "Temperature",
    "Doctor",
    "Notes",
    "Checked at",
];

const BOM: &[u8] = "\u{feff}".as_bytes();

/// Render checks in the order given. `offset` is the site zone used for
/// the "Checked at" column.
pub fn checks_csv(checks: &[MedicalCheckView], offset: FixedOffset) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(BOM.to_vec());
    writer.write_record(HEADER)?;

    for check in checks {
        writer.write_record([
            check.shift_date.format("%Y-%m-%d").to_string(),
            check.shift_label.clone(),
            check.direction_label.clone(),
            check.status.csv_label().to_string(),
            check.person_name.clone(),
            check.person_code.clone(),
            check.department.clone(),
            check.organization.clone(),
            check.blood_pressure.clone(),
            check.pulse.to_string(),
            check.alcohol_level.to_string(),
            check.temperature.to_string(),
            check.doctor_name.clone(),
            check.notes.clone(),
            check
                .checked_at
                .with_timezone(&offset)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
