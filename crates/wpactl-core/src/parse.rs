//! Parsers for the daemon's tabular and `key=value` responses.
//!
//! Tabular responses (`SCAN_RESULTS`, `LIST_NETWORKS`) start with a header
//! such as `bssid / frequency / signal level / flags / ssid`. The column
//! order is not stable across daemon versions, so every response is parsed
//! against the order its own header declares. Unknown columns are ignored.
//!
//! Both tabular parsers return every row that parsed together with one
//! [`ParseError`] per row that did not.
//!
//! Responses are split on raw bytes: SSIDs may hold any byte, so only the
//! numeric, address and flag fields are ever read as text.

use std::collections::HashMap;
use std::str::FromStr;

use crate::codec::decode_byte_literal;
use crate::error::{BoxError, ParseError};
use crate::hwaddr::HardwareAddr;
use crate::types::{ConfiguredNetwork, ScanResult, Ssid, StatusResult};

const HEADER_SEPARATOR: &str = " / ";
const FIELD_SEPARATOR: u8 = b'\t';

/// Column positions recovered from a header row.
struct Columns<K> {
    index: HashMap<K, usize>,
    /// Number of fields a row needs to reach every known column.
    required: usize,
}

impl<K: Copy + Eq + std::hash::Hash> Columns<K> {
    fn from_header(header: &[u8], classify: impl Fn(&str) -> Option<K>) -> Self {
        let header = String::from_utf8_lossy(header);
        let mut index = HashMap::new();
        let mut required = 0;
        for (n, name) in header.split(HEADER_SEPARATOR).enumerate() {
            if let Some(kind) = classify(name.trim()) {
                index.insert(kind, n);
                required = required.max(n + 1);
            }
        }
        Self { index, required }
    }

    fn field<'a>(&self, fields: &[&'a [u8]], kind: K) -> Option<&'a [u8]> {
        self.index
            .get(&kind)
            .and_then(|&n| fields.get(n))
            .copied()
    }
}

/// Split a response into lines, dropping a trailing `\r` from each.
fn lines(resp: &[u8]) -> impl Iterator<Item = &[u8]> {
    resp.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Split a tabular response into its header and data rows.
fn split_table(resp: &[u8]) -> Result<(&[u8], impl Iterator<Item = &[u8]>), ParseError> {
    let mut lines = lines(resp);
    let header = lines
        .next()
        .filter(|header| !header.trim_ascii().is_empty())
        .ok_or_else(ParseError::empty)?;
    Ok((header, lines.filter(|line| !line.is_empty())))
}

/// Split a row, failing if it is too short to hold every known column.
fn split_row<'a, K>(line: &'a [u8], columns: &Columns<K>) -> Result<Vec<&'a [u8]>, ParseError> {
    let fields: Vec<&[u8]> = line.split(|&b| b == FIELD_SEPARATOR).collect();
    if fields.len() < columns.required {
        return Err(ParseError::new(String::from_utf8_lossy(line)));
    }
    Ok(fields)
}

/// Parse a text field of `line`, reporting failures against the whole line.
fn parse_field<T>(field: &[u8], line: &[u8]) -> Result<T, ParseError>
where
    T: FromStr,
    T::Err: Into<BoxError>,
{
    let fail = |cause: BoxError| ParseError::with_source(String::from_utf8_lossy(line), cause);
    let text = std::str::from_utf8(field).map_err(|e| fail(e.into()))?;
    text.parse().map_err(|e: T::Err| fail(e.into()))
}

/// Parse a `[FLAG1][FLAG2]` list. Anything not wrapped in brackets has no flags.
pub fn parse_flags(field: &str) -> Vec<String> {
    match field
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
    {
        Some("") | None => Vec::new(),
        Some(inner) => inner.split("][").map(str::to_string).collect(),
    }
}

fn parse_ssid(field: &[u8]) -> Ssid {
    Ssid::from(decode_byte_literal(field))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ScanColumn {
    Bssid,
    Frequency,
    SignalLevel,
    Flags,
    Ssid,
}

impl ScanColumn {
    fn classify(name: &str) -> Option<Self> {
        match name {
            "bssid" => Some(Self::Bssid),
            "frequency" => Some(Self::Frequency),
            "signal level" => Some(Self::SignalLevel),
            "flags" => Some(Self::Flags),
            "ssid" => Some(Self::Ssid),
            _ => None,
        }
    }
}

/// Parse a `SCAN_RESULTS` response.
///
/// A missing header yields no results and a single error with an empty line.
pub fn parse_scan_results(resp: &[u8]) -> (Vec<ScanResult>, Vec<ParseError>) {
    let (header, rows) = match split_table(resp) {
        Ok(table) => table,
        Err(err) => return (Vec::new(), vec![err]),
    };
    let columns = Columns::from_header(header, ScanColumn::classify);

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for line in rows {
        match parse_scan_row(line, &columns) {
            Ok(result) => results.push(result),
            Err(err) => errors.push(err),
        }
    }
    (results, errors)
}

fn parse_scan_row(line: &[u8], columns: &Columns<ScanColumn>) -> Result<ScanResult, ParseError> {
    let fields = split_row(line, columns)?;
    let field = |kind| columns.field(&fields, kind);
    let mut result = ScanResult::default();

    if let Some(bssid) = field(ScanColumn::Bssid) {
        result.bssid = Some(parse_field::<HardwareAddr>(bssid, line)?);
    }
    if let Some(frequency) = field(ScanColumn::Frequency) {
        result.frequency = parse_field(frequency, line)?;
    }
    if let Some(level) = field(ScanColumn::SignalLevel) {
        result.signal_level = parse_field(level, line)?;
    }
    if let Some(flags) = field(ScanColumn::Flags) {
        result.flags = parse_flags(&String::from_utf8_lossy(flags));
    }
    if let Some(ssid) = field(ScanColumn::Ssid) {
        result.ssid = parse_ssid(ssid);
    }

    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NetworkColumn {
    Id,
    Ssid,
    Bssid,
    Flags,
}

impl NetworkColumn {
    fn classify(name: &str) -> Option<Self> {
        match name {
            "network id" => Some(Self::Id),
            "ssid" => Some(Self::Ssid),
            "bssid" => Some(Self::Bssid),
            "flags" => Some(Self::Flags),
            _ => None,
        }
    }
}

/// Parse a `LIST_NETWORKS` response.
///
/// Malformed rows are reported alongside the rows that parsed, matching
/// [`parse_scan_results`].
pub fn parse_list_networks(resp: &[u8]) -> (Vec<ConfiguredNetwork>, Vec<ParseError>) {
    let (header, rows) = match split_table(resp) {
        Ok(table) => table,
        Err(err) => return (Vec::new(), vec![err]),
    };
    let columns = Columns::from_header(header, NetworkColumn::classify);

    let mut networks = Vec::new();
    let mut errors = Vec::new();
    for line in rows {
        match parse_network_row(line, &columns) {
            Ok(network) => networks.push(network),
            Err(err) => errors.push(err),
        }
    }
    (networks, errors)
}

fn parse_network_row(
    line: &[u8],
    columns: &Columns<NetworkColumn>,
) -> Result<ConfiguredNetwork, ParseError> {
    let fields = split_row(line, columns)?;
    let field = |kind| columns.field(&fields, kind);
    let mut network = ConfiguredNetwork::default();

    if let Some(id) = field(NetworkColumn::Id) {
        network.id = parse_field(id, line)?;
    }
    if let Some(ssid) = field(NetworkColumn::Ssid) {
        network.ssid = parse_ssid(ssid);
    }
    // Profiles not pinned to an access point report `any` (older daemons
    // leave the column empty).
    match field(NetworkColumn::Bssid) {
        None | Some(b"") | Some(b"any") => {}
        Some(bssid) => network.bssid = Some(parse_field::<HardwareAddr>(bssid, line)?),
    }
    if let Some(flags) = field(NetworkColumn::Flags) {
        network.flags = parse_flags(&String::from_utf8_lossy(flags));
    }

    Ok(network)
}

/// Parse a `STATUS` response of `key=value` lines.
///
/// Lines without `=` and unknown keys are skipped. A known key whose value
/// does not parse (a bad address or frequency) fails the whole response.
pub fn parse_status(resp: &[u8]) -> Result<StatusResult, ParseError> {
    let mut status = StatusResult::default();
    let text = |value: &[u8]| Some(String::from_utf8_lossy(value).into_owned());

    for line in lines(resp) {
        let Some(eq) = line.iter().position(|&b| b == b'=') else {
            continue;
        };
        let (key, value) = (&line[..eq], &line[eq + 1..]);
        match key {
            b"wpa_state" => status.wpa_state = text(value),
            b"key_mgmt" => status.key_mgmt = text(value),
            b"ip_address" => status.ip_address = text(value),
            b"ssid" => status.ssid = Some(parse_ssid(value)),
            b"address" => status.address = Some(parse_field(value, line)?),
            b"bssid" => status.bssid = Some(parse_field(value, line)?),
            b"freq" => status.frequency = Some(parse_field(value, line)?),
            b"id_str" => status.id_str = text(value),
            _ => {}
        }
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCAN_HEADER: &str = "bssid / frequency / signal level / flags / ssid";

    fn addr(s: &str) -> Option<HardwareAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_scan_results_single_row() {
        let resp = format!(
            "{SCAN_HEADER}\n00:11:22:33:44:55\t2412\t-40\t[WPA2-PSK-CCMP][ESS]\tMyNetwork\n"
        );
        let (results, errors) = parse_scan_results(resp.as_bytes());
        assert!(errors.is_empty());
        assert_eq!(
            results,
            vec![ScanResult {
                bssid: addr("00:11:22:33:44:55"),
                frequency: 2412,
                signal_level: -40,
                flags: vec!["WPA2-PSK-CCMP".to_string(), "ESS".to_string()],
                ssid: Ssid::from("MyNetwork"),
            }]
        );
    }

    #[test]
    fn test_scan_results_column_order_from_header() {
        let canonical = format!(
            "{SCAN_HEADER}\n00:11:22:33:44:55\t5180\t-71\t[ESS]\tOffice\n\
             66:77:88:99:aa:bb\t2437\t-55\t[WPA-PSK-TKIP]\tHome\n"
        );
        let permuted = "ssid / flags / signal level / bssid / frequency\n\
             Office\t[ESS]\t-71\t00:11:22:33:44:55\t5180\n\
             Home\t[WPA-PSK-TKIP]\t-55\t66:77:88:99:aa:bb\t2437\n";

        let (expected, errors) = parse_scan_results(canonical.as_bytes());
        assert!(errors.is_empty());
        let (actual, errors) = parse_scan_results(permuted.as_bytes());
        assert!(errors.is_empty());
        assert_eq!(actual, expected);
        assert_eq!(actual.len(), 2);
    }

    #[test]
    fn test_scan_results_ignore_unknown_columns() {
        let resp = "bssid / age / frequency / signal level / flags / ssid\n\
             00:11:22:33:44:55\t12\t2412\t-40\t[ESS]\tCafe\n";
        let (results, errors) = parse_scan_results(resp.as_bytes());
        assert!(errors.is_empty());
        assert_eq!(results[0].frequency, 2412);
        assert_eq!(results[0].ssid, "Cafe");
    }

    #[test]
    fn test_scan_results_collect_row_errors() {
        let resp = format!(
            "{SCAN_HEADER}\n\
             00:11:22:33:44:55\t2412\t-40\t[ESS]\tGood\n\
             00:11:22:33:44:55\t2412\n\
             not-a-mac\t2412\t-40\t[ESS]\tBadMac\n\
             00:11:22:33:44:66\tfast\t-40\t[ESS]\tBadFreq\n\
             00:11:22:33:44:77\t2462\t-62\t[ESS]\tAlsoGood\n"
        );
        let (results, errors) = parse_scan_results(resp.as_bytes());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].ssid, "Good");
        assert_eq!(results[1].ssid, "AlsoGood");
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].line(), "00:11:22:33:44:55\t2412");
        assert!(std::error::Error::source(&errors[0]).is_none());
        assert!(errors[1].line().starts_with("not-a-mac"));
        assert!(std::error::Error::source(&errors[1]).is_some());
        assert!(std::error::Error::source(&errors[2]).is_some());
    }

    #[test]
    fn test_scan_results_hidden_and_escaped_ssids() {
        let resp = format!(
            "{SCAN_HEADER}\n\
             00:11:22:33:44:55\t2412\t-40\t[ESS]\t\n\
             00:11:22:33:44:66\t2412\t-40\t[ESS]\tcaf\\xc3\\xa9\\x00\n"
        );
        let (results, errors) = parse_scan_results(resp.as_bytes());
        assert!(errors.is_empty());
        assert!(results[0].ssid.is_empty());
        assert_eq!(results[1].ssid.as_bytes(), b"caf\xc3\xa9\x00");
    }

    #[test]
    fn test_ssid_bytes_survive_outside_utf8() {
        let mut resp = format!("{SCAN_HEADER}\n00:11:22:33:44:55\t2412\t-40\t[ESS]\t").into_bytes();
        resp.extend_from_slice(b"a\xffb\\xfe\n");
        let (results, errors) = parse_scan_results(&resp);
        assert!(errors.is_empty());
        assert_eq!(results[0].ssid.as_bytes(), b"a\xffb\xfe");

        let (networks, errors) =
            parse_list_networks(b"network id / ssid / bssid / flags\n0\t\xff\xfe\tany\t[CURRENT]\n");
        assert!(errors.is_empty());
        assert_eq!(networks[0].ssid.as_bytes(), b"\xff\xfe");
        assert!(networks[0].is_current());

        let status = parse_status(b"wpa_state=COMPLETED\nssid=\xffNet\n").unwrap();
        assert_eq!(status.ssid.unwrap().as_bytes(), b"\xffNet");
    }

    #[test]
    fn test_non_utf8_numeric_field_is_a_row_error() {
        let mut resp = format!("{SCAN_HEADER}\n00:11:22:33:44:55\t24").into_bytes();
        resp.extend_from_slice(b"\xff12\t-40\t[ESS]\tX\n");
        let (results, errors) = parse_scan_results(&resp);
        assert!(results.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(std::error::Error::source(&errors[0]).is_some());
    }

    #[test]
    fn test_crlf_line_endings() {
        let resp = format!("{SCAN_HEADER}\r\n00:11:22:33:44:55\t2412\t-40\t[ESS]\tHome\r\n");
        let (results, errors) = parse_scan_results(resp.as_bytes());
        assert!(errors.is_empty());
        assert_eq!(results[0].ssid, "Home");
    }

    #[test]
    fn test_scan_results_missing_header() {
        let (results, errors) = parse_scan_results(b"");
        assert!(results.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line(), "");
    }

    #[test]
    fn test_scan_results_header_only() {
        let (results, errors) = parse_scan_results(format!("{SCAN_HEADER}\n").as_bytes());
        assert!(results.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_flags() {
        assert_eq!(parse_flags("[WPA2-PSK-CCMP][ESS]"), vec!["WPA2-PSK-CCMP", "ESS"]);
        assert_eq!(parse_flags("[ESS]"), vec!["ESS"]);
        assert!(parse_flags("[]").is_empty());
        assert!(parse_flags("").is_empty());
        assert!(parse_flags("ESS").is_empty());
        assert!(parse_flags("[ESS").is_empty());
    }

    #[test]
    fn test_list_networks() {
        let resp = "network id / ssid / bssid / flags\n\
             0\tHome\tany\t[CURRENT]\n\
             3\tPinned\t00:11:22:33:44:55\t[DISABLED]\n\
             7\tOpen\t\t\n";
        let (networks, errors) = parse_list_networks(resp.as_bytes());
        assert!(errors.is_empty());
        assert_eq!(
            networks,
            vec![
                ConfiguredNetwork {
                    id: 0,
                    ssid: Ssid::from("Home"),
                    bssid: None,
                    flags: vec!["CURRENT".to_string()],
                },
                ConfiguredNetwork {
                    id: 3,
                    ssid: Ssid::from("Pinned"),
                    bssid: addr("00:11:22:33:44:55"),
                    flags: vec!["DISABLED".to_string()],
                },
                ConfiguredNetwork {
                    id: 7,
                    ssid: Ssid::from("Open"),
                    bssid: None,
                    flags: Vec::new(),
                },
            ]
        );
        assert!(networks[0].is_current());
    }

    #[test]
    fn test_list_networks_column_order_from_header() {
        let resp = "flags / bssid / ssid / network id\n[CURRENT]\tany\tHome\t2\n";
        let (networks, errors) = parse_list_networks(resp.as_bytes());
        assert!(errors.is_empty());
        assert_eq!(networks[0].id, 2);
        assert_eq!(networks[0].ssid, "Home");
        assert!(networks[0].is_current());
    }

    #[test]
    fn test_list_networks_partial_results() {
        let resp = "network id / ssid / bssid / flags\n\
             0\tHome\tany\t[CURRENT]\n\
             x\tBadId\tany\t\n\
             1\tShort\n\
             2\tWork\tany\t\n";
        let (networks, errors) = parse_list_networks(resp.as_bytes());
        assert_eq!(networks.len(), 2);
        assert_eq!(networks[1].id, 2);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].line(), "1\tShort");
    }

    #[test]
    fn test_list_networks_missing_header() {
        let (networks, errors) = parse_list_networks(b"\n");
        assert!(networks.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_status() {
        let status = parse_status(b"wpa_state=COMPLETED\nssid=MyNetwork\nfoo=bar").unwrap();
        assert_eq!(
            status,
            StatusResult {
                wpa_state: Some("COMPLETED".to_string()),
                ssid: Some(Ssid::from("MyNetwork")),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_status_all_fields() {
        let resp = "bssid=00:11:22:33:44:55\n\
             freq=2412\n\
             ssid=Home\\\\Net\n\
             id=0\n\
             id_str=home\n\
             mode=station\n\
             key_mgmt=WPA2-PSK\n\
             wpa_state=COMPLETED\n\
             ip_address=192.168.1.20\n\
             address=66:77:88:99:aa:bb\n\
             uuid=0a1b2c3d\n";
        let status = parse_status(resp.as_bytes()).unwrap();
        assert_eq!(
            status,
            StatusResult {
                wpa_state: Some("COMPLETED".to_string()),
                key_mgmt: Some("WPA2-PSK".to_string()),
                ip_address: Some("192.168.1.20".to_string()),
                ssid: Some(Ssid::from("Home\\Net")),
                address: addr("66:77:88:99:aa:bb"),
                bssid: addr("00:11:22:33:44:55"),
                frequency: Some(2412),
                id_str: Some("home".to_string()),
            }
        );
    }

    #[test]
    fn test_status_splits_on_first_equals() {
        let status = parse_status(b"id_str=a=b\nno equals here\n").unwrap();
        assert_eq!(status.id_str.as_deref(), Some("a=b"));
    }

    #[test]
    fn test_status_rejects_bad_frequency() {
        let err = parse_status(b"wpa_state=COMPLETED\nfreq=soon\n").unwrap_err();
        assert_eq!(err.line(), "freq=soon");
    }

    #[test]
    fn test_status_empty_response() {
        assert_eq!(parse_status(b"").unwrap(), StatusResult::default());
    }
}
