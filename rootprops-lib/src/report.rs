//! Human-readable formatting of root store statistics.

use crate::stats::RootStats;
use std::fmt::Display;

/// Width of the key column in distribution tables.
const KEY_WIDTH: usize = 7;

/// Format the statistics report.
///
/// `source` names the input in the heading line (e.g. `certdata.json`).
/// Table rows are sorted by key.
pub fn display_report(stats: &RootStats, source: &str) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} entries in {}\n", stats.processed, source));
    out.push_str(&format!("{} ... trusted for serverAuth\n", stats.good));

    out.push('\n');
    push_table(&mut out, "Algorithm distribution:", &stats.algorithms);
    out.push('\n');
    push_table(&mut out, "ECDSA curve distribution:", &stats.curves);
    out.push('\n');
    push_table(&mut out, "RSA key size distribution:", &stats.rsa_key_sizes);

    out
}

fn push_table<'a, K, I>(out: &mut String, heading: &str, rows: I)
where
    K: Display + 'a,
    I: IntoIterator<Item = (&'a K, &'a usize)>,
{
    out.push_str(heading);
    out.push('\n');
    for (key, count) in rows {
        out.push_str(&format!("  {:<width$}{}\n", key, count, width = KEY_WIDTH));
    }
}
