use std::path::Path;

use anyhow::Context;

use crate::error::SourceError;
use crate::ir::{is_blank, Entry};
use crate::textio::{read_text_file, write_text_file};

/// An in-memory CSV sheet: one header row plus string cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path, encoding: Option<&str>) -> anyhow::Result<Self> {
        let text = read_text_file(path, encoding)?;
        Self::parse(&text).with_context(|| format!("parse csv: {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = rdr
            .headers()
            .context("read csv header")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let width = headers.len();
        let mut rows = Vec::new();
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("read csv row {}", i + 2))?;
            let mut row: Vec<String> = rec.iter().map(str::to_string).collect();
            row.resize(width.max(row.len()), String::new());
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Result<usize, SourceError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| {
                self.headers
                    .iter()
                    .position(|h| h.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| SourceError::MissingColumn {
                column: name.to_string(),
                available: self.headers.join(", "),
            })
    }

    /// Cell values of one column, one per row.
    pub fn column(&self, name: &str) -> Result<Vec<String>, SourceError> {
        let idx = self.column_index(name)?;
        Ok(self
            .rows
            .iter()
            .map(|r| r.get(idx).cloned().unwrap_or_default())
            .collect())
    }

    /// One entry per non-blank cell, keyed by the cell text. Repeated values stay repeated.
    pub fn column_entries(&self, name: &str) -> Result<Vec<Entry>, SourceError> {
        Ok(self
            .column(name)?
            .into_iter()
            .filter(|v| !is_blank(v))
            .map(Entry::keyed_by_text)
            .collect())
    }

    /// Replaces the column with exactly this header, or appends it when the header is new.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> anyhow::Result<()> {
        let idx = match self.headers.iter().position(|h| h == name) {
            Some(i) => i,
            None => {
                self.check_len(name, &values)?;
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        };
        self.set_column_at(idx, values)
    }

    /// Replaces the cells of an existing column, e.g. one found through [`Table::column_index`].
    pub fn set_column_at(&mut self, idx: usize, values: Vec<String>) -> anyhow::Result<()> {
        let Some(name) = self.headers.get(idx) else {
            anyhow::bail!("column index {idx} out of range ({} columns)", self.headers.len());
        };
        self.check_len(name, &values)?;
        for (row, v) in self.rows.iter_mut().zip(values) {
            if row.len() <= idx {
                row.resize(idx + 1, String::new());
            }
            row[idx] = v;
        }
        Ok(())
    }

    fn check_len(&self, name: &str, values: &[String]) -> anyhow::Result<()> {
        if values.len() != self.rows.len() {
            anyhow::bail!(
                "column `{name}` has {} values for {} rows",
                values.len(),
                self.rows.len()
            );
        }
        Ok(())
    }

    pub fn to_csv_string(&self) -> anyhow::Result<String> {
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
        wtr.write_record(&self.headers).context("write csv header")?;
        for row in &self.rows {
            wtr.write_record(row).context("write csv row")?;
        }
        let bytes = wtr.into_inner().context("flush csv")?;
        String::from_utf8(bytes).context("csv output is not utf-8")
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        write_text_file(path, &self.to_csv_string()?)
    }
}
