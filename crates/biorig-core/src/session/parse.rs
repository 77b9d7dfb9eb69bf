//! Device line classification

use crate::buffer::Sample;
use crate::command::DELIMITER;

/// What a line from the device turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind<'a> {
    /// A data row, with the parsed sample and the raw field text
    Sample(Sample, [&'a str; 2]),
    /// Status or debug text from the firmware (no delimiter)
    Diagnostic,
    /// Looked like data but did not parse
    Malformed,
}

/// Classify one line with its terminator already stripped.
///
/// Data rows are exactly two numbers separated by the delimiter; whitespace
/// around either field is ignored. `nan` and `inf` count as numbers, since
/// the firmware prints them for bad or overflowing readings.
pub fn classify_line(line: &str) -> LineKind<'_> {
    if !line.contains(DELIMITER) {
        return LineKind::Diagnostic;
    }

    let mut fields = line.split(DELIMITER).map(str::trim);
    let (Some(t), Some(v), None) = (fields.next(), fields.next(), fields.next()) else {
        return LineKind::Malformed;
    };

    match (t.parse::<f64>(), v.parse::<f64>()) {
        (Ok(timestamp), Ok(value)) => LineKind::Sample(Sample::new(timestamp, value), [t, v]),
        _ => LineKind::Malformed,
    }
}
