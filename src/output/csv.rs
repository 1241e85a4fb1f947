//! CSV output of the utilization snapshot.

use crate::models::{UtilizationRecord, RECORD_COLUMNS};
use std::io::{self, Write};

/// Quote a field when it holds a comma, a double quote or a line break.
pub fn escape_csv_field(input: &str) -> String {
    if input.contains([',', '"', '\n', '\r']) {
        // excel does not like spaces after comma between fields, so no padding either
        let escaped = input.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        input.to_string()
    }
}

fn write_row<W: Write>(out: &mut W, fields: &[String]) -> io::Result<()> {
    let line = fields
        .iter()
        .map(|f| escape_csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "{line}")
}

/// Write the header and one row per record.
pub fn write_records<W: Write>(out: &mut W, records: &[UtilizationRecord]) -> io::Result<()> {
    let header: Vec<String> = RECORD_COLUMNS.iter().map(|c| c.to_string()).collect();
    write_row(out, &header)?;
    for record in records {
        write_row(out, &record.columns())?;
    }
    Ok(())
}

/// Print the snapshot as CSV to stdout.
pub fn print_records(records: &[UtilizationRecord]) -> io::Result<()> {
    log::info!("# Print {} address space record(s) as CSV", records.len());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_records(&mut out, records)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cidr;

    #[test]
    fn test_escape_csv_field() {
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_write_records() {
        let record = UtilizationRecord {
            management_group: "-".to_string(),
            subscription_id: "sub-1".to_string(),
            subscription_name: "Prod, EU".to_string(),
            vnet_name: "hub".to_string(),
            region: "westeurope".to_string(),
            address_space: Cidr::new("10.0.0.0/24").unwrap(),
            subnet_count: 2,
            used: 15,
            available: 231,
        };
        let mut buf = Vec::new();
        write_records(&mut buf, &[record]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "management_group,subscription_id,subscription_name,vnet_name,region,address_space,subnet_count,ips_used,ips_available"
        );
        assert_eq!(lines[1], "-,sub-1,\"Prod, EU\",hub,westeurope,10.0.0.0/24,2,15,231");
        assert_eq!(lines.len(), 2);
    }
}
