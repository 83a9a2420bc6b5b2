//! CSV output formatting.

use crate::aggregator::ExposureReport;
use std::io;

/// Render the exposure table as CSV with a header row.
pub fn to_csv(report: &ExposureReport) -> io::Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    wtr.write_record(["address", "open_ports", "resource_id", "account_id"])?;

    for record in &report.records {
        wtr.write_record([
            &record.public_address.to_string(),
            &record.ports_label(),
            &record.resource_id,
            &record.account,
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ExposureRecord;
    use crate::types::Port;
    use std::collections::BTreeSet;

    #[test]
    fn test_ports_are_quoted() {
        let report = ExposureReport {
            records: vec![ExposureRecord {
                resource_id: "eni-1".to_string(),
                account: "111".to_string(),
                public_address: "203.0.113.5".parse().unwrap(),
                open_ports: [22, 443].into_iter().filter_map(Port::new).collect(),
                hostnames: BTreeSet::new(),
                instance_id: None,
            }],
            anomalies: Vec::new(),
        };

        assert_eq!(
            to_csv(&report).unwrap(),
            "address,open_ports,resource_id,account_id\n203.0.113.5,\"22,443\",eni-1,111\n"
        );
    }

    #[test]
    fn test_empty_report_has_header() {
        assert_eq!(
            to_csv(&ExposureReport::default()).unwrap(),
            "address,open_ports,resource_id,account_id\n"
        );
    }
}
