//! 结果汇 (Result Sink)
//!
//! 两个追加式输出：结果表 CSV 与活跃链接清单，运行开始时一并截断。
//! 写入以批次为粒度；收尾时读回 CSV 按延迟升序重写。

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::core::config::FilesConfig;
use crate::core::error::Result;
use crate::core::model::ProbeResult;

const CSV_HEADER: [&str; 4] = ["config", "latency", "status", "msg"];

pub struct ResultSink {
    csv_path: PathBuf,
    links_path: PathBuf,
    active_count: usize,
}

impl ResultSink {
    /// 截断输出文件并写入表头
    pub fn create(files: &FilesConfig) -> Result<Self> {
        let sink = Self {
            csv_path: PathBuf::from(&files.results_csv),
            links_path: PathBuf::from(&files.active_links),
            active_count: 0,
        };

        let mut writer = csv::Writer::from_writer(File::create(&sink.csv_path)?);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;
        File::create(&sink.links_path)?;

        Ok(sink)
    }

    /// 追加一个批次的成功结果
    ///
    /// 行内容由调用方筛选；链接按原文落盘，CSV 引号转义交给写入器。
    pub fn append(&mut self, rows: &[&ProbeResult]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new().append(true).open(&self.csv_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        let mut links = OpenOptions::new().append(true).open(&self.links_path)?;
        for row in rows {
            writeln!(links, "{}", row.config.trim())?;
        }

        self.active_count += rows.len();
        Ok(())
    }

    /// 读回结果表并按整数延迟升序重写
    pub fn finalize(&self) -> Result<usize> {
        let mut reader = csv::Reader::from_path(&self.csv_path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize::<ProbeResult>() {
            rows.push(row?);
        }
        rows.sort_by_key(|r| r.latency);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(File::create(&self.csv_path)?);
        writer.write_record(CSV_HEADER)?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        debug!("Sorted {} result rows by latency", rows.len());
        Ok(rows.len())
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }
}
