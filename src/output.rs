use std::borrow::Cow;
use std::io::Write;
use std::str::FromStr;

use crate::err::OutputError;
use crate::report::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Fixed width columns.
    #[default]
    Table,
    Csv,
    /// Tab separated.
    CsvTab,
    /// One JSON object per row.
    JsonLines,
}

impl OutputFormat {
    pub const NAMES: [&'static str; 4] = ["table", "csv", "csv_tab", "jsonl"];
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "csv_tab" => Ok(OutputFormat::CsvTab),
            "jsonl" => Ok(OutputFormat::JsonLines),
            other => Err(format!("unknown output format `{}`", other)),
        }
    }
}

const HEADER: [&str; 6] = ["User", "Login", "Logoff", "Duration", "Type", "Src"];

pub struct RowWriter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> RowWriter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        RowWriter { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes the header (if the format has one), every row, then flushes.
    pub fn write_all(&mut self, rows: &[Row]) -> Result<(), OutputError> {
        self.write_header()?;
        for row in rows {
            self.write_row(row)?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn write_header(&mut self) -> Result<(), OutputError> {
        if self.format == OutputFormat::JsonLines {
            return Ok(());
        }
        self.write_columns(HEADER)
    }

    pub fn write_row(&mut self, row: &Row) -> Result<(), OutputError> {
        if self.format == OutputFormat::JsonLines {
            serde_json::to_writer(&mut self.out, row)?;
            writeln!(self.out)?;
            return Ok(());
        }

        self.write_columns([
            row.user.as_str(),
            row.login.as_str(),
            row.logoff.as_str(),
            row.duration.as_str(),
            row.logon_type.as_str(),
            row.src.as_str(),
        ])
    }

    fn write_columns(&mut self, c: [&str; 6]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Table => writeln!(
                self.out,
                "{:30} {:20} {:20} {:>14} {:>23} {:21}",
                c[0], c[1], c[2], c[3], c[4], c[5]
            )?,
            OutputFormat::Csv => {
                let quoted: Vec<Cow<'_, str>> = c.iter().map(|v| csv_quote(v)).collect();
                writeln!(self.out, "{}", quoted.join(","))?
            }
            OutputFormat::CsvTab => writeln!(self.out, "{}", c.join("\t"))?,
            OutputFormat::JsonLines => {}
        }
        Ok(())
    }
}

fn csv_quote(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
