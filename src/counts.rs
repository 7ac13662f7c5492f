//! Sufficient statistics for the samplers.
//!
//! Every table is a dense row-major `rows x cols` array of counts with its
//! row totals kept next to it, so the conditional distributions never have
//! to rescan a row.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which count table a [`CountTable`] holds; used in error reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// [from state][to state]
    Transitions,
    /// [state][word]
    StateWord,
    /// [topic][word]
    TopicWord,
    /// [document][topic]
    DocumentTopic,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableKind::Transitions => "transition",
            TableKind::StateWord => "state-word",
            TableKind::TopicWord => "topic-word",
            TableKind::DocumentTopic => "document-topic",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTable {
    kind: TableKind,
    rows: usize,
    cols: usize,
    cells: Vec<u32>,
    row_totals: Vec<u32>,
}

impl CountTable {
    /// Zeroed table. Dimensions are fixed for the table's lifetime.
    pub fn new(kind: TableKind, rows: usize, cols: usize) -> Self {
        Self {
            kind,
            rows,
            cols,
            cells: vec![0; rows * cols],
            row_totals: vec![0; rows],
        }
    }

    /// Copy with `cols` columns; cells past the old width start at zero.
    pub fn widened(&self, cols: usize) -> Self {
        debug_assert!(cols >= self.cols, "tables only widen");
        let mut table = Self::new(self.kind, self.rows, cols);
        for r in 0..self.rows {
            let start = r * cols;
            table.cells[start..start + self.cols].copy_from_slice(self.row(r));
        }
        table.row_totals.copy_from_slice(&self.row_totals);
        table
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols, "cell out of range");
        row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.cells[self.offset(row, col)]
    }

    #[inline]
    pub fn row_total(&self, row: usize) -> u32 {
        self.row_totals[row]
    }

    pub fn row(&self, row: usize) -> &[u32] {
        let start = row * self.cols;
        &self.cells[start..start + self.cols]
    }

    #[inline]
    pub fn increment(&mut self, row: usize, col: usize) {
        self.add(row, col, 1);
    }

    pub fn add(&mut self, row: usize, col: usize, n: u32) {
        let i = self.offset(row, col);
        self.cells[i] += n;
        self.row_totals[row] += n;
    }

    /// Fails with [`Error::NegativeCount`] rather than wrap below zero.
    #[inline]
    pub fn decrement(&mut self, row: usize, col: usize) -> Result<()> {
        let i = self.offset(row, col);
        if self.cells[i] == 0 {
            return Err(Error::NegativeCount {
                table: self.kind,
                row,
                col,
            });
        }
        self.cells[i] -= 1;
        self.row_totals[row] -= 1;
        Ok(())
    }

    /// Sum of all cells.
    pub fn total(&self) -> u64 {
        self.row_totals.iter().map(|&t| u64::from(t)).sum()
    }

    /// True when every row total equals the sum of its cells.
    pub fn is_consistent(&self) -> bool {
        (0..self.rows).all(|r| {
            let sum: u64 = self.row(r).iter().map(|&c| u64::from(c)).sum();
            sum == u64::from(self.row_totals[r])
        })
    }
}

/// All count tables of a model. The topic tables only exist for HMM-LDA.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    pub transitions: CountTable,
    pub state_word: CountTable,
    pub topic_word: Option<CountTable>,
    pub document_topic: Option<CountTable>,
}

impl Tables {
    pub fn iter(&self) -> impl Iterator<Item = &CountTable> {
        [Some(&self.transitions), Some(&self.state_word)]
            .into_iter()
            .chain([self.topic_word.as_ref(), self.document_topic.as_ref()])
            .flatten()
    }

    pub fn is_consistent(&self) -> bool {
        self.iter().all(CountTable::is_consistent)
    }

    /// Number of word tokens counted in the emission tables.
    pub fn emission_total(&self) -> u64 {
        self.state_word.total() + self.topic_word.as_ref().map_or(0, CountTable::total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_totals_track_cells() {
        let mut t = CountTable::new(TableKind::StateWord, 2, 3);
        t.increment(0, 1);
        t.increment(0, 2);
        t.increment(1, 2);
        t.decrement(0, 1).unwrap();
        assert_eq!(t.get(0, 2), 1);
        assert_eq!(t.row_total(0), 1);
        assert_eq!(t.row_total(1), 1);
        assert_eq!(t.total(), 2);
        assert!(t.is_consistent());
    }

    #[test]
    fn decrement_below_zero_fails() {
        let mut t = CountTable::new(TableKind::Transitions, 2, 2);
        let err = t.decrement(1, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::NegativeCount {
                table: TableKind::Transitions,
                row: 1,
                col: 0
            }
        ));
        assert_eq!(t.get(1, 0), 0);
        assert_eq!(t.row_total(1), 0);
    }

    #[test]
    fn widening_keeps_counts_and_zeroes_new_columns() {
        let mut t = CountTable::new(TableKind::StateWord, 2, 2);
        t.add(0, 1, 3);
        t.increment(1, 0);
        let wide = t.widened(4);
        assert_eq!(wide.cols(), 4);
        assert_eq!(wide.row(0), &[0, 3, 0, 0]);
        assert_eq!(wide.row(1), &[1, 0, 0, 0]);
        assert_eq!(wide.total(), t.total());
        assert!(wide.is_consistent());
    }

    #[test]
    fn row_major_layout() {
        let mut t = CountTable::new(TableKind::TopicWord, 2, 4);
        t.add(1, 3, 5);
        assert_eq!(t.row(1), &[0, 0, 0, 5]);
        assert_eq!(t.row(0), &[0, 0, 0, 0]);
    }

    #[test]
    fn tables_without_topics_iterate_two() {
        let mut state_word = CountTable::new(TableKind::StateWord, 3, 10);
        state_word.increment(1, 4);
        let tables = Tables {
            transitions: CountTable::new(TableKind::Transitions, 3, 3),
            state_word,
            topic_word: None,
            document_topic: None,
        };
        assert_eq!(tables.iter().count(), 2);
        assert_eq!(tables.emission_total(), 1);
        assert!(tables.is_consistent());
    }
}
