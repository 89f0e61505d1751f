//! Mapping decoded blocks onto typed results.
//!
//! Register presence doubles as meter-type detection: export and reactive
//! registers only exist on bidirectional and Kombi meters, so their absence
//! yields `None` fields rather than warnings.

use crate::constants::*;
use crate::records::{
    BatteryState, EventRecord, FaultFlags, GridFields, LoadProfileEntry, MonthlyData,
    OutageRecord, RelayState, ShortReadData,
};

use super::decoder::{DecodedBlock, RegisterMap};

fn opt_f64(map: &RegisterMap<'_>, base: &str) -> Option<f64> {
    map.f64_value(base)
}

fn str_or_empty(map: &RegisterMap<'_>, base: &str) -> String {
    map.str_value(base).unwrap_or("").to_string()
}

/// Builds the short-read snapshot from a decoded packet-6 block.
///
/// `read_at_ms` is the host clock captured when the meter clock registers
/// arrived, carried through for drift calculation.
pub fn build_short_read(block: &DecodedBlock, read_at_ms: Option<u64>) -> ShortReadData {
    let map = RegisterMap::new(block);

    let serial_number = {
        let sn = str_or_empty(&map, OBIS_SERIAL_NUMBER);
        if sn.is_empty() {
            str_or_empty(&map, OBIS_SERIAL_NUMBER_ALT)
        } else {
            sn
        }
    };

    let ff_code = str_or_empty(&map, OBIS_FF_CODE);
    let gf_code = str_or_empty(&map, OBIS_GF_CODE);

    let battery = match map.str_value(OBIS_BATTERY_STATUS) {
        None => BatteryState::Unknown,
        Some(v) if v.contains('0') => BatteryState::Low,
        Some(_) => BatteryState::Full,
    };
    let relay = match map.str_value(OBIS_RELAY_STATUS) {
        None => RelayState::Unknown,
        Some(v) if v.contains('0') => RelayState::Connected,
        Some(_) => RelayState::Disconnected,
    };

    let max_demand = map.find("1.6.0");
    let max_demand_export = map.find("2.6.0");

    ShortReadData {
        serial_number,
        program_version: str_or_empty(&map, OBIS_PROGRAM_VERSION),
        production_date: str_or_empty(&map, OBIS_PRODUCTION_DATE),
        calibration_date: str_or_empty(&map, OBIS_CALIBRATION_DATE),
        meter_date: str_or_empty(&map, OBIS_DATE),
        meter_time: str_or_empty(&map, OBIS_TIME),
        day_of_week: map
            .str_value(OBIS_DAY_OF_WEEK)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
        read_at_ms,
        active_energy_import_total: opt_f64(&map, "1.8.0").unwrap_or(0.0),
        active_energy_import_t1: opt_f64(&map, "1.8.1").unwrap_or(0.0),
        active_energy_import_t2: opt_f64(&map, "1.8.2").unwrap_or(0.0),
        active_energy_import_t3: opt_f64(&map, "1.8.3").unwrap_or(0.0),
        active_energy_import_t4: opt_f64(&map, "1.8.4").unwrap_or(0.0),
        active_energy_export_total: opt_f64(&map, "2.8.0"),
        active_energy_export_t1: opt_f64(&map, "2.8.1"),
        active_energy_export_t2: opt_f64(&map, "2.8.2"),
        active_energy_export_t3: opt_f64(&map, "2.8.3"),
        active_energy_export_t4: opt_f64(&map, "2.8.4"),
        reactive_inductive_import: opt_f64(&map, "5.8.0"),
        reactive_capacitive_import: opt_f64(&map, "8.8.0"),
        reactive_inductive_export: opt_f64(&map, "6.8.0"),
        reactive_capacitive_export: opt_f64(&map, "7.8.0"),
        max_demand_import: max_demand
            .and_then(|r| r.values.first()?.as_f64())
            .unwrap_or(0.0),
        max_demand_import_timestamp: max_demand
            .and_then(|r| r.value_at(1))
            .unwrap_or("")
            .to_string(),
        max_demand_export: max_demand_export.and_then(|r| r.values.first()?.as_f64()),
        max_demand_export_timestamp: max_demand_export
            .and_then(|r| r.value_at(1))
            .map(str::to_string),
        voltage_l1: opt_f64(&map, "32.7.0").unwrap_or(0.0),
        voltage_l2: opt_f64(&map, "52.7.0"),
        voltage_l3: opt_f64(&map, "72.7.0"),
        current_l1: opt_f64(&map, "31.7.0").unwrap_or(0.0),
        current_l2: opt_f64(&map, "51.7.0"),
        current_l3: opt_f64(&map, "71.7.0"),
        frequency: opt_f64(&map, "14.7.0").unwrap_or(0.0),
        power_factor_l1: opt_f64(&map, "33.7.0").unwrap_or(0.0),
        power_factor_l2: opt_f64(&map, "53.7.0"),
        power_factor_l3: opt_f64(&map, "73.7.0"),
        fault_flags: FaultFlags::from_register(&ff_code),
        grid_fields: GridFields::from_register(&gf_code),
        ff_code,
        gf_code,
        battery,
        relay,
    }
}

/// Builds the billing-history months from a decoded packet-7 block.
///
/// Months are probed in order starting at `*01`; the first period without
/// an energy total ends the list, so a meter holding fewer than 12 closed
/// months yields a shorter vector.
pub fn build_months(block: &DecodedBlock) -> Vec<MonthlyData> {
    let map = RegisterMap::new(block);
    let mut months = Vec::new();

    for period in 1u8..=12 {
        let total = match map.find_billing("1.8.0", period) {
            Some(rec) => rec.values.first().and_then(|v| v.as_f64()).unwrap_or(0.0),
            None => break,
        };
        let tariff = |base: &str| {
            map.find_billing(base, period)
                .and_then(|r| r.values.first()?.as_f64())
                .unwrap_or(0.0)
        };
        let demand = map.find_billing("1.6.0", period);

        months.push(MonthlyData {
            month: period,
            energy_import_total: total,
            energy_import_t1: tariff("1.8.1"),
            energy_import_t2: tariff("1.8.2"),
            energy_import_t3: tariff("1.8.3"),
            energy_import_t4: tariff("1.8.4"),
            max_demand: demand
                .and_then(|r| r.values.first()?.as_f64())
                .unwrap_or(0.0),
            max_demand_timestamp: demand
                .and_then(|r| r.value_at(1))
                .unwrap_or("")
                .to_string(),
            demand_reset_date: map
                .find_billing(OBIS_DEMAND_RESET_DATE, period)
                .map(|r| r.value().to_string())
                .unwrap_or_default(),
            cover_open_count: map
                .find_billing(OBIS_COVER_COUNT, period)
                .and_then(|r| r.value().trim().parse().ok())
                .unwrap_or(0),
        });
    }

    months
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Extracts the warning events of one packet-8 category block. Rows are
/// `99.98.n(start)(end)(duration)(detail)`; end and duration stay empty for
/// an event still in progress.
pub fn build_events(block: &DecodedBlock) -> Vec<EventRecord> {
    block
        .records
        .iter()
        .filter(|r| r.code.groups().first().map(String::as_str) == Some("99")
            && r.code.groups().get(1).map(String::as_str) == Some("98"))
        .map(|r| EventRecord {
            start: r.value().to_string(),
            end: non_empty(r.value_at(1)),
            duration: non_empty(r.value_at(2)),
            detail: r.value_at(3).unwrap_or("").to_string(),
        })
        .collect()
}

/// Extracts the outages of one packet-9 category block, rows
/// `99.97.n(start)(end)(duration)`.
pub fn build_outages(block: &DecodedBlock) -> Vec<OutageRecord> {
    block
        .records
        .iter()
        .filter(|r| r.code.groups().first().map(String::as_str) == Some("99")
            && r.code.groups().get(1).map(String::as_str) == Some("97"))
        .map(|r| OutageRecord {
            start: r.value().to_string(),
            end: non_empty(r.value_at(1)),
            duration: non_empty(r.value_at(2)),
        })
        .collect()
}

/// Parses a raw load-profile payload into column labels and entries.
///
/// Two row shapes exist in the field:
///   `P.01(yy-mm-dd,hh:mm)(value)(value)...(status)` and the header-plus-rows
///   form `LPCH:1.8.0*kWh` followed by bare `(yy-mm-dd,hh:mm)(value)` lines.
/// Values may be comma-packed inside a single group; a short hex token that
/// does not parse as a number is the row status word.
pub fn parse_load_profile(raw: &str) -> (Vec<String>, Vec<LoadProfileEntry>) {
    let mut columns: Vec<String> = Vec::new();
    let mut entries: Vec<LoadProfileEntry> = Vec::new();

    for raw_line in raw.lines() {
        let clean: String = raw_line.chars().filter(|c| !c.is_ascii_control()).collect();
        let line = clean.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("LPCH:").or_else(|| line.strip_prefix("LPC:")) {
            columns.extend(
                rest.split([',', ' '])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
            continue;
        }

        let data_part = if line.starts_with("P.") {
            match line.find('(') {
                Some(pos) => &line[pos..],
                None => continue,
            }
        } else if line.starts_with('(') {
            line
        } else {
            continue;
        };

        let mut groups: Vec<&str> = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        for (i, c) in data_part.char_indices() {
            if c == '(' {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            } else if c == ')' && depth > 0 {
                depth -= 1;
                if depth == 0 {
                    groups.push(&data_part[start..i]);
                }
            }
        }

        if groups.len() < 2 {
            continue;
        }

        let timestamp = groups[0].to_string();
        let mut values: Vec<f64> = Vec::new();
        let mut status: Option<String> = None;

        for group in &groups[1..] {
            for part in group.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let num_str = part.split('*').next().unwrap_or(part);
                if let Ok(num) = num_str.parse::<f64>() {
                    values.push(num);
                } else if part.len() <= 16 && part.chars().all(|c| c.is_ascii_hexdigit()) {
                    status = Some(part.to_string());
                }
            }
        }

        if !values.is_empty() || status.is_some() {
            entries.push(LoadProfileEntry {
                timestamp,
                values,
                status,
            });
        }
    }

    (columns, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obis::decoder::decode_block;

    const SHORT_READ: &str = "\
0.0.0(12345678)\r\n\
0.2.0(10.3)\r\n\
0.9.1(21:30:15)\r\n\
0.9.2(25-03-01)\r\n\
0.9.5(6)\r\n\
1.8.0(123456.789*kWh)\r\n\
1.8.1(050000.000*kWh)\r\n\
1.6.0(004.122*kW)(25-03-01,10:15)\r\n\
32.7.0(231.4*V)\r\n\
31.7.0(002.51*A)\r\n\
14.7.0(50.01*Hz)\r\n\
33.7.0(0.982)\r\n\
F.F.0(00000000)\r\n\
96.6.1(1)\r\n\
!\r\n";

    #[test]
    fn short_read_snapshot_from_block() {
        let block = decode_block(SHORT_READ);
        let data = build_short_read(&block, Some(1_700_000_000_000));
        assert_eq!(data.serial_number, "12345678");
        assert_eq!(data.active_energy_import_total, 123456.789);
        assert_eq!(data.max_demand_import, 4.122);
        assert_eq!(data.max_demand_import_timestamp, "25-03-01,10:15");
        assert_eq!(data.day_of_week, 6);
        assert_eq!(data.battery, BatteryState::Full);
        // No export or reactive registers: unidirectional active meter.
        assert!(data.active_energy_export_total.is_none());
        assert!(data.reactive_inductive_import.is_none());
        // No relay register at all.
        assert_eq!(data.relay, RelayState::Unknown);
    }

    #[test]
    fn serial_number_falls_back_to_96_1_0() {
        let block = decode_block("96.1.0(87654321)\r\n");
        let data = build_short_read(&block, None);
        assert_eq!(data.serial_number, "87654321");
    }

    #[test]
    fn months_stop_at_first_missing_period() {
        let text = "\
1.8.0*01(100.0*kWh)\r\n1.6.0*01(3.5*kW)(25-02-15,09:30)\r\n0.1.2*01(25-03-01)\r\n\
1.8.0*02(90.0*kWh)\r\n96.15.0*02(3)\r\n";
        let months = build_months(&decode_block(text));
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, 1);
        assert_eq!(months[0].max_demand, 3.5);
        assert_eq!(months[0].demand_reset_date, "25-03-01");
        assert_eq!(months[1].energy_import_total, 90.0);
        assert_eq!(months[1].cover_open_count, 3);
    }

    #[test]
    fn events_with_open_end() {
        let text = "99.98.3(25-02-10,14:00)(25-02-10,14:05)(00:05)(magnetic field)\r\n\
99.98.3(25-03-01,08:00)()()(magnetic field)\r\n";
        let events = build_events(&decode_block(text));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].duration.as_deref(), Some("00:05"));
        assert!(events[1].end.is_none());
        assert!(events[1].duration.is_none());
    }

    #[test]
    fn load_profile_type_a_rows() {
        let raw = "P.01(25-03-01,10:00)(000.512*kWh)(000.120*kvarh)(0A)\r\n\
P.01(25-03-01,10:15)(000.498*kWh)(000.115*kvarh)(0A)\r\n";
        let (columns, entries) = parse_load_profile(raw);
        assert!(columns.is_empty());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "25-03-01,10:00");
        assert_eq!(entries[0].values, vec![0.512, 0.120]);
        assert_eq!(entries[0].status.as_deref(), Some("0A"));
    }

    #[test]
    fn load_profile_type_b_with_header() {
        let raw = "LPCH:1.8.0*kWh\r\n(25-03-01,10:00)(000000.512)\r\n(25-03-01,10:15)(000000.498)\r\n";
        let (columns, entries) = parse_load_profile(raw);
        assert_eq!(columns, vec!["1.8.0*kWh"]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].values, vec![0.498]);
    }

    #[test]
    fn load_profile_comma_packed_values() {
        let raw = "P.01(25-03-01,10:00)(220.61,000.52,003.02)\r\n";
        let (_, entries) = parse_load_profile(raw);
        assert_eq!(entries[0].values, vec![220.61, 0.52, 3.02]);
    }
}
