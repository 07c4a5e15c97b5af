// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./json_lines_test.rs"]
mod tests;

use anyhow::Context;
use rdb_profiler::{DecodedObject, ReportEntry, ReportSink};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Read, Write};
use std::path::Path;

/// Open `input` for reading, where "-" means stdin.
pub fn open_input(input: &str) -> anyhow::Result<BufReader<Box<dyn Read + Send>>> {
  let reader: Box<dyn Read + Send> = if input == "-" {
    Box::new(std::io::stdin())
  } else {
    Box::new(File::open(Path::new(input)).with_context(|| format!("unable to open {input}"))?)
  };
  Ok(BufReader::new(reader))
}

//
// ObjectReader
//

/// Decoded objects, one JSON document per line. Blank lines are ignored.
pub struct ObjectReader<R> {
  lines: Lines<R>,
  line_number: usize,
}

impl<R: BufRead> ObjectReader<R> {
  pub fn new(reader: R) -> Self {
    Self {
      lines: reader.lines(),
      line_number: 0,
    }
  }
}

impl<R: BufRead> Iterator for ObjectReader<R> {
  type Item = anyhow::Result<DecodedObject>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let line = match self.lines.next()? {
        Ok(line) => line,
        Err(e) => return Some(Err(e.into())),
      };
      self.line_number += 1;
      if line.trim().is_empty() {
        continue;
      }

      let line_number = self.line_number;
      return Some(
        serde_json::from_str(&line)
          .with_context(|| format!("invalid decoded object on line {line_number}")),
      );
    }
  }
}

//
// EntryWriter
//

/// Writes each report entry as one line of JSON.
pub struct EntryWriter<W: Write> {
  writer: BufWriter<W>,
}

impl<W: Write> EntryWriter<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer: BufWriter::new(writer),
    }
  }

  /// Flush buffered entries and hand back the underlying writer.
  pub fn into_inner(self) -> anyhow::Result<W> {
    self
      .writer
      .into_inner()
      .map_err(|e| anyhow::anyhow!("unable to flush report output: {}", e.error()))
  }
}

impl<W: Write> ReportSink for EntryWriter<W> {
  fn accept(&mut self, entry: ReportEntry) -> anyhow::Result<()> {
    serde_json::to_writer(&mut self.writer, &entry)?;
    self.writer.write_all(b"\n")?;
    Ok(())
  }
}
