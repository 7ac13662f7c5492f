//! Normalized probability tables and their fixed-width text layout.

use std::io::{self, Write};
use std::ops::Range;

use crate::counts::CountTable;

/// Columns per block in the tabulated output.
const BLOCK: usize = 4;

/// One state or topic with its marginal and top words.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub label: String,
    pub probability: f64,
    pub words: Vec<(String, f64)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    pub states: Vec<Column>,
    /// Empty for the plain HMM.
    pub topics: Vec<Column>,
}

/// Smooth every row `r` in `rows` of `table` with `pseudo(r)` per column.
///
/// The marginal of a row is `total + pseudo(r) * width` normalized over `rows`.
/// Words are ranked by smoothed probability, ties by ascending id, and cut
/// to `top_n`.
pub fn normalize_rows(
    table: &CountTable,
    rows: Range<usize>,
    pseudo: impl Fn(usize) -> f64,
    top_n: usize,
    prefix: &str,
    vocabulary: &[String],
) -> Vec<Column> {
    let width = table.cols();
    let masses: Vec<f64> = rows
        .clone()
        .map(|r| table.row_total(r) as f64 + pseudo(r) * width as f64)
        .collect();
    let sum: f64 = masses.iter().sum();

    rows.zip(masses)
        .map(|(r, mass)| {
            let counts = table.row(r);
            let smoothing = pseudo(r);
            let mut ids: Vec<usize> = (0..width).collect();
            // probability is monotone in the count within a row
            ids.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));
            let words = ids
                .into_iter()
                .take(top_n)
                .map(|id| {
                    let word = vocabulary.get(id).cloned().unwrap_or_default();
                    (word, (counts[id] as f64 + smoothing) / mass)
                })
                .collect();
            Column {
                label: format!("{prefix}_{r}"),
                probability: if sum > 0.0 { mass / sum } else { 0.0 },
                words,
            }
        })
        .collect()
}

impl Report {
    /// States block, then for HMM-LDA four blank lines and the topics block.
    pub fn write_tabulated<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_section(out, "State", &self.states)?;
        if !self.topics.is_empty() {
            write!(out, "\n\n\n\n")?;
            write_section(out, "Topic", &self.topics)?;
        }
        Ok(())
    }

    pub fn to_tabulated_string(&self) -> String {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_tabulated(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn write_section<W: Write>(out: &mut W, name: &str, columns: &[Column]) -> io::Result<()> {
    write!(out, "***** Word Probabilities by {name} *****\n\n")?;
    for block in columns.chunks(BLOCK) {
        for c in block {
            write!(out, "{:>25}\t{:6.5}\t", c.label, c.probability)?;
        }
        write!(out, "\n\n")?;

        let depth = block.iter().map(|c| c.words.len()).max().unwrap_or(0);
        for i in 0..depth {
            for c in block {
                match c.words.get(i) {
                    Some((word, p)) => write!(out, "{:>25}\t{:6.5}\t", word, p)?,
                    None => write!(out, "{:>25}\t{:>7}\t", "", "")?,
                }
            }
            writeln!(out)?;
        }
        write!(out, "\n\n")?;
    }
    Ok(())
}
